//! Integer-coded value tables and their human-readable labels.
//!
//! Category samples and characteristics carry small integer codes natively. The host needs both
//! the code (stable, comparable) and a label (readable), so every table here maps in both
//! directions. Labels are the camel-case names used on the wire and in JSON.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $code:literal => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> i64 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn from_code(code: i64) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn from_label(label: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.label() == label)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let label = String::deserialize(deserializer)?;
                Self::from_label(&label).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        label
                    ))
                })
            }
        }
    };
}

// ============================================================================
// Category values
// ============================================================================

coded_enum!(
    SleepAnalysis {
        InBed = 0 => "inBed",
        Asleep = 1 => "asleep",
        Awake = 2 => "awake",
        AsleepCore = 3 => "asleepCore",
        AsleepDeep = 4 => "asleepDeep",
        AsleepRem = 5 => "asleepREM",
    }
);

coded_enum!(
    AppleStandHour {
        Stood = 0 => "stood",
        Idle = 1 => "idle",
    }
);

coded_enum!(
    CervicalMucusQuality {
        Dry = 1 => "dry",
        Sticky = 2 => "sticky",
        Creamy = 3 => "creamy",
        Watery = 4 => "watery",
        EggWhite = 5 => "eggWhite",
    }
);

coded_enum!(
    OvulationTestResult {
        Negative = 1 => "negative",
        LuteinizingHormoneSurge = 2 => "luteinizingHormoneSurge",
        Indeterminate = 3 => "indeterminate",
        EstrogenSurge = 4 => "estrogenSurge",
    }
);

coded_enum!(
    MenstrualFlow {
        Unspecified = 0 => "unspecified",
        Light = 1 => "light",
        Medium = 2 => "medium",
        Heavy = 3 => "heavy",
    }
);

coded_enum!(
    Contraceptive {
        Unspecified = 1 => "unspecified",
        Implant = 2 => "implant",
        Injection = 3 => "injection",
        IntrauterineDevice = 4 => "intrauterineDevice",
        IntravaginalRing = 5 => "intravaginalRing",
        Oral = 6 => "oral",
        Patch = 7 => "patch",
    }
);

coded_enum!(
    /// Symptom severity, shared by every symptom category type.
    Severity {
        Unspecified = 0 => "unspecified",
        NotPresent = 1 => "notPresent",
        Mild = 2 => "mild",
        Moderate = 3 => "moderate",
        Severe = 4 => "severe",
    }
);

coded_enum!(
    AppetiteChanges {
        Unspecified = 0 => "unspecified",
        NoChange = 1 => "noChange",
        Decreased = 2 => "decreased",
        Increased = 3 => "increased",
    }
);

coded_enum!(
    AudioExposureEvent {
        MomentaryLimit = 1 => "momentaryLimit",
    }
);

coded_enum!(
    WalkingSteadinessEvent {
        InitialLow = 1 => "initialLow",
        InitialVeryLow = 2 => "initialVeryLow",
        RepeatLow = 3 => "repeatLow",
        RepeatVeryLow = 4 => "repeatVeryLow",
    }
);

coded_enum!(
    LowCardioFitnessEvent {
        LowFitness = 1 => "lowFitness",
    }
);

coded_enum!(
    /// Value for category types that only record that something happened.
    NotApplicable {
        NotApplicable = 0 => "notApplicable",
    }
);

/// Which value table labels a category type's integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTable {
    /// Not a category type.
    None,
    SleepAnalysis,
    AppleStandHour,
    CervicalMucusQuality,
    OvulationTestResult,
    MenstrualFlow,
    Contraceptive,
    Severity,
    AppetiteChanges,
    AudioExposureEvent,
    WalkingSteadinessEvent,
    LowCardioFitnessEvent,
    NotApplicable,
}

impl ValueTable {
    /// Label for `code`, or `None` when the code is outside the table.
    pub fn label(self, code: i64) -> Option<&'static str> {
        match self {
            ValueTable::None => None,
            ValueTable::SleepAnalysis => SleepAnalysis::from_code(code).map(SleepAnalysis::label),
            ValueTable::AppleStandHour => {
                AppleStandHour::from_code(code).map(AppleStandHour::label)
            }
            ValueTable::CervicalMucusQuality => {
                CervicalMucusQuality::from_code(code).map(CervicalMucusQuality::label)
            }
            ValueTable::OvulationTestResult => {
                OvulationTestResult::from_code(code).map(OvulationTestResult::label)
            }
            ValueTable::MenstrualFlow => MenstrualFlow::from_code(code).map(MenstrualFlow::label),
            ValueTable::Contraceptive => Contraceptive::from_code(code).map(Contraceptive::label),
            ValueTable::Severity => Severity::from_code(code).map(Severity::label),
            ValueTable::AppetiteChanges => {
                AppetiteChanges::from_code(code).map(AppetiteChanges::label)
            }
            ValueTable::AudioExposureEvent => {
                AudioExposureEvent::from_code(code).map(AudioExposureEvent::label)
            }
            ValueTable::WalkingSteadinessEvent => {
                WalkingSteadinessEvent::from_code(code).map(WalkingSteadinessEvent::label)
            }
            ValueTable::LowCardioFitnessEvent => {
                LowCardioFitnessEvent::from_code(code).map(LowCardioFitnessEvent::label)
            }
            ValueTable::NotApplicable => NotApplicable::from_code(code).map(NotApplicable::label),
        }
    }
}

// ============================================================================
// Characteristic values
// ============================================================================

coded_enum!(
    BiologicalSex {
        NotSet = 0 => "notSet",
        Female = 1 => "female",
        Male = 2 => "male",
        Other = 3 => "other",
    }
);

coded_enum!(
    BloodType {
        NotSet = 0 => "notSet",
        APositive = 1 => "A+",
        ANegative = 2 => "A-",
        BPositive = 3 => "B+",
        BNegative = 4 => "B-",
        AbPositive = 5 => "AB+",
        AbNegative = 6 => "AB-",
        OPositive = 7 => "O+",
        ONegative = 8 => "O-",
    }
);

coded_enum!(
    FitzpatrickSkinType {
        NotSet = 0 => "notSet",
        TypeI = 1 => "I",
        TypeII = 2 => "II",
        TypeIII = 3 => "III",
        TypeIV = 4 => "IV",
        TypeV = 5 => "V",
        TypeVI = 6 => "VI",
    }
);

coded_enum!(
    WheelchairUse {
        NotSet = 0 => "notSet",
        No = 1 => "no",
        Yes = 2 => "yes",
    }
);

coded_enum!(
    ActivityMoveMode {
        ActiveEnergy = 1 => "activeEnergy",
        AppleMoveTime = 2 => "appleMoveTime",
    }
);

// ============================================================================
// Workouts
// ============================================================================

coded_enum!(
    WorkoutActivityType {
        AmericanFootball = 1 => "americanFootball",
        Archery = 2 => "archery",
        AustralianFootball = 3 => "australianFootball",
        Badminton = 4 => "badminton",
        Baseball = 5 => "baseball",
        Basketball = 6 => "basketball",
        Bowling = 7 => "bowling",
        Boxing = 8 => "boxing",
        Climbing = 9 => "climbing",
        Cricket = 10 => "cricket",
        CrossTraining = 11 => "crossTraining",
        Curling = 12 => "curling",
        Cycling = 13 => "cycling",
        Dance = 14 => "dance",
        DanceInspiredTraining = 15 => "danceInspiredTraining",
        Elliptical = 16 => "elliptical",
        EquestrianSports = 17 => "equestrianSports",
        Fencing = 18 => "fencing",
        Fishing = 19 => "fishing",
        FunctionalStrengthTraining = 20 => "functionalStrengthTraining",
        Golf = 21 => "golf",
        Gymnastics = 22 => "gymnastics",
        Handball = 23 => "handball",
        Hiking = 24 => "hiking",
        Hockey = 25 => "hockey",
        Hunting = 26 => "hunting",
        Lacrosse = 27 => "lacrosse",
        MartialArts = 28 => "martialArts",
        MindAndBody = 29 => "mindAndBody",
        MixedMetabolicCardioTraining = 30 => "mixedMetabolicCardioTraining",
        PaddleSports = 31 => "paddleSports",
        Play = 32 => "play",
        PreparationAndRecovery = 33 => "preparationAndRecovery",
        Racquetball = 34 => "racquetball",
        Rowing = 35 => "rowing",
        Rugby = 36 => "rugby",
        Running = 37 => "running",
        Sailing = 38 => "sailing",
        SkatingSports = 39 => "skatingSports",
        SnowSports = 40 => "snowSports",
        Soccer = 41 => "soccer",
        Softball = 42 => "softball",
        Squash = 43 => "squash",
        StairClimbing = 44 => "stairClimbing",
        SurfingSports = 45 => "surfingSports",
        Swimming = 46 => "swimming",
        TableTennis = 47 => "tableTennis",
        Tennis = 48 => "tennis",
        TrackAndField = 49 => "trackAndField",
        TraditionalStrengthTraining = 50 => "traditionalStrengthTraining",
        Volleyball = 51 => "volleyball",
        Walking = 52 => "walking",
        WaterFitness = 53 => "waterFitness",
        WaterPolo = 54 => "waterPolo",
        WaterSports = 55 => "waterSports",
        Wrestling = 56 => "wrestling",
        Yoga = 57 => "yoga",
        Barre = 58 => "barre",
        CoreTraining = 59 => "coreTraining",
        CrossCountrySkiing = 60 => "crossCountrySkiing",
        DownhillSkiing = 61 => "downhillSkiing",
        Flexibility = 62 => "flexibility",
        HighIntensityIntervalTraining = 63 => "highIntensityIntervalTraining",
        JumpRope = 64 => "jumpRope",
        Kickboxing = 65 => "kickboxing",
        Pilates = 66 => "pilates",
        Snowboarding = 67 => "snowboarding",
        Stairs = 68 => "stairs",
        StepTraining = 69 => "stepTraining",
        WheelchairWalkPace = 70 => "wheelchairWalkPace",
        WheelchairRunPace = 71 => "wheelchairRunPace",
        TaiChi = 72 => "taiChi",
        MixedCardio = 73 => "mixedCardio",
        HandCycling = 74 => "handCycling",
        DiscSports = 75 => "discSports",
        FitnessGaming = 76 => "fitnessGaming",
        Other = 3000 => "other",
    }
);

coded_enum!(
    WorkoutEventType {
        Pause = 1 => "pause",
        Resume = 2 => "resume",
        Lap = 3 => "lap",
        Marker = 4 => "marker",
        MotionPaused = 5 => "motionPaused",
        MotionResumed = 6 => "motionResumed",
        Segment = 7 => "segment",
        PauseOrResumeRequest = 8 => "pauseOrResumeRequest",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_labels_are_inverse() {
        for sex in BiologicalSex::ALL {
            assert_eq!(BiologicalSex::from_code(sex.code()), Some(*sex));
            assert_eq!(BiologicalSex::from_label(sex.label()), Some(*sex));
        }
        assert_eq!(WorkoutActivityType::from_code(3000), Some(WorkoutActivityType::Other));
        assert_eq!(WorkoutActivityType::from_code(77), None);
    }

    #[test]
    fn value_table_labels_known_codes_only() {
        assert_eq!(ValueTable::SleepAnalysis.label(5), Some("asleepREM"));
        assert_eq!(ValueTable::CervicalMucusQuality.label(0), None);
        assert_eq!(ValueTable::Severity.label(4), Some("severe"));
        assert_eq!(ValueTable::None.label(0), None);
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&BloodType::AbNegative).expect("serialize");
        assert_eq!(json, "\"AB-\"");
        let parsed: BloodType = serde_json::from_str("\"O+\"").expect("deserialize");
        assert_eq!(parsed, BloodType::OPositive);

        let err = serde_json::from_str::<BloodType>("\"Z\"").expect_err("unknown label");
        assert!(err.to_string().contains("unknown BloodType"));
    }
}
