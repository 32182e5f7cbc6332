//! Catalogue of supported health data type identifiers.
//!
//! A [`DataType`] is a validated handle into a static catalogue. Host strings are checked for
//! membership once at the boundary; everything past that point dispatches on the typed handle.
//!
//! # Identifier forms
//!
//! Each type has a canonical identifier (`HKQuantityTypeIdentifierStepCount`) and a short alias
//! derived from it (`stepCount`). Both parse; the canonical form is always what gets rendered.

use crate::labels::ValueTable;
use crate::{RecordsError, RecordsResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Broad family a data type belongs to; selects the record shape used for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataKind {
    Quantity,
    Category,
    Characteristic,
    Correlation,
    Document,
    Workout,
    Pedometer,
}

/// How samples of a quantity type combine over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationStyle {
    Cumulative,
    DiscreteArithmetic,
    DiscreteTemporallyWeighted,
    DiscreteEquivalentContinuousLevel,
}

impl AggregationStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationStyle::Cumulative => "cumulative",
            AggregationStyle::DiscreteArithmetic => "discreteArithmetic",
            AggregationStyle::DiscreteTemporallyWeighted => "discreteTemporallyWeighted",
            AggregationStyle::DiscreteEquivalentContinuousLevel => {
                "discreteEquivalentContinuousLevel"
            }
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        [
            AggregationStyle::Cumulative,
            AggregationStyle::DiscreteArithmetic,
            AggregationStyle::DiscreteTemporallyWeighted,
            AggregationStyle::DiscreteEquivalentContinuousLevel,
        ]
        .into_iter()
        .find(|style| style.as_str() == text)
    }

    pub fn is_cumulative(self) -> bool {
        self == AggregationStyle::Cumulative
    }
}

/// Rule for resolving a type's default unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitRule {
    /// Always this unit symbol.
    Fixed(&'static str),
    /// The temperature unit conventional for the configured locale.
    Temperature,
    /// The type carries no quantity.
    Unitless,
}

/// Static description of one catalogue entry.
#[derive(Debug)]
pub struct DataTypeInfo {
    pub identifier: &'static str,
    pub kind: DataKind,
    pub unit_rule: UnitRule,
    pub aggregation_style: Option<AggregationStyle>,
    pub values: ValueTable,
}

const fn quantity(
    identifier: &'static str,
    unit_rule: UnitRule,
    style: AggregationStyle,
) -> DataTypeInfo {
    DataTypeInfo {
        identifier,
        kind: DataKind::Quantity,
        unit_rule,
        aggregation_style: Some(style),
        values: ValueTable::None,
    }
}

const fn cumulative(identifier: &'static str, unit: &'static str) -> DataTypeInfo {
    quantity(identifier, UnitRule::Fixed(unit), AggregationStyle::Cumulative)
}

const fn discrete(identifier: &'static str, unit: &'static str) -> DataTypeInfo {
    quantity(
        identifier,
        UnitRule::Fixed(unit),
        AggregationStyle::DiscreteArithmetic,
    )
}

const fn weighted(identifier: &'static str, unit: &'static str) -> DataTypeInfo {
    quantity(
        identifier,
        UnitRule::Fixed(unit),
        AggregationStyle::DiscreteTemporallyWeighted,
    )
}

const fn temperature(identifier: &'static str) -> DataTypeInfo {
    quantity(
        identifier,
        UnitRule::Temperature,
        AggregationStyle::DiscreteArithmetic,
    )
}

const fn category(identifier: &'static str, values: ValueTable) -> DataTypeInfo {
    DataTypeInfo {
        identifier,
        kind: DataKind::Category,
        unit_rule: UnitRule::Unitless,
        aggregation_style: None,
        values,
    }
}

const fn symptom(identifier: &'static str) -> DataTypeInfo {
    category(identifier, ValueTable::Severity)
}

const fn unitless(identifier: &'static str, kind: DataKind) -> DataTypeInfo {
    DataTypeInfo {
        identifier,
        kind,
        unit_rule: UnitRule::Unitless,
        aggregation_style: None,
        values: ValueTable::None,
    }
}

pub const WORKOUT_IDENTIFIER: &str = "HKWorkoutTypeIdentifier";
pub const PEDOMETER_IDENTIFIER: &str = "pedometer";

static CATALOGUE: &[DataTypeInfo] = &[
    // Body measurements
    discrete("HKQuantityTypeIdentifierBodyMassIndex", "count"),
    discrete("HKQuantityTypeIdentifierBodyFatPercentage", "%"),
    discrete("HKQuantityTypeIdentifierHeight", "m"),
    discrete("HKQuantityTypeIdentifierBodyMass", "kg"),
    discrete("HKQuantityTypeIdentifierLeanBodyMass", "kg"),
    discrete("HKQuantityTypeIdentifierWaistCircumference", "m"),
    temperature("HKQuantityTypeIdentifierAppleSleepingWristTemperature"),
    // Fitness
    cumulative("HKQuantityTypeIdentifierStepCount", "count"),
    cumulative("HKQuantityTypeIdentifierDistanceWalkingRunning", "m"),
    cumulative("HKQuantityTypeIdentifierDistanceCycling", "m"),
    cumulative("HKQuantityTypeIdentifierDistanceWheelchair", "m"),
    cumulative("HKQuantityTypeIdentifierBasalEnergyBurned", "kcal"),
    cumulative("HKQuantityTypeIdentifierActiveEnergyBurned", "kcal"),
    cumulative("HKQuantityTypeIdentifierFlightsClimbed", "count"),
    cumulative("HKQuantityTypeIdentifierNikeFuel", "count"),
    cumulative("HKQuantityTypeIdentifierAppleExerciseTime", "min"),
    cumulative("HKQuantityTypeIdentifierPushCount", "count"),
    cumulative("HKQuantityTypeIdentifierDistanceSwimming", "m"),
    cumulative("HKQuantityTypeIdentifierSwimmingStrokeCount", "count"),
    discrete("HKQuantityTypeIdentifierVO2Max", "mL/(kg*min)"),
    cumulative("HKQuantityTypeIdentifierDistanceDownhillSnowSports", "m"),
    cumulative("HKQuantityTypeIdentifierAppleStandTime", "min"),
    cumulative("HKQuantityTypeIdentifierAppleMoveTime", "min"),
    discrete("HKQuantityTypeIdentifierAppleWalkingSteadiness", "%"),
    discrete("HKQuantityTypeIdentifierRunningStrideLength", "m"),
    discrete("HKQuantityTypeIdentifierRunningVerticalOscillation", "cm"),
    discrete("HKQuantityTypeIdentifierRunningGroundContactTime", "ms"),
    weighted("HKQuantityTypeIdentifierRunningPower", "W"),
    weighted("HKQuantityTypeIdentifierRunningSpeed", "m/s"),
    // Vitals
    weighted("HKQuantityTypeIdentifierHeartRate", "count/min"),
    temperature("HKQuantityTypeIdentifierBodyTemperature"),
    temperature("HKQuantityTypeIdentifierBasalBodyTemperature"),
    discrete("HKQuantityTypeIdentifierBloodPressureSystolic", "mmHg"),
    discrete("HKQuantityTypeIdentifierBloodPressureDiastolic", "mmHg"),
    weighted("HKQuantityTypeIdentifierRespiratoryRate", "count/min"),
    discrete("HKQuantityTypeIdentifierRestingHeartRate", "count/min"),
    discrete("HKQuantityTypeIdentifierWalkingHeartRateAverage", "count/min"),
    discrete("HKQuantityTypeIdentifierHeartRateVariabilitySDNN", "ms"),
    discrete("HKQuantityTypeIdentifierHeartRateRecoveryOneMinute", "count/min"),
    // Results
    weighted("HKQuantityTypeIdentifierOxygenSaturation", "%"),
    discrete("HKQuantityTypeIdentifierPeripheralPerfusionIndex", "%"),
    discrete("HKQuantityTypeIdentifierBloodGlucose", "mg/dL"),
    cumulative("HKQuantityTypeIdentifierNumberOfTimesFallen", "count"),
    discrete("HKQuantityTypeIdentifierElectrodermalActivity", "mcS"),
    cumulative("HKQuantityTypeIdentifierInhalerUsage", "count"),
    cumulative("HKQuantityTypeIdentifierInsulinDelivery", "IU"),
    discrete("HKQuantityTypeIdentifierBloodAlcoholContent", "%"),
    discrete("HKQuantityTypeIdentifierForcedVitalCapacity", "L"),
    discrete("HKQuantityTypeIdentifierForcedExpiratoryVolume1", "L"),
    discrete("HKQuantityTypeIdentifierPeakExpiratoryFlowRate", "L/min"),
    quantity(
        "HKQuantityTypeIdentifierEnvironmentalAudioExposure",
        UnitRule::Fixed("dBASPL"),
        AggregationStyle::DiscreteEquivalentContinuousLevel,
    ),
    quantity(
        "HKQuantityTypeIdentifierHeadphoneAudioExposure",
        UnitRule::Fixed("dBASPL"),
        AggregationStyle::DiscreteEquivalentContinuousLevel,
    ),
    cumulative("HKQuantityTypeIdentifierNumberOfAlcoholicBeverages", "count"),
    // Nutrition
    cumulative("HKQuantityTypeIdentifierDietaryFatTotal", "g"),
    cumulative("HKQuantityTypeIdentifierDietaryFatPolyunsaturated", "g"),
    cumulative("HKQuantityTypeIdentifierDietaryFatMonounsaturated", "g"),
    cumulative("HKQuantityTypeIdentifierDietaryFatSaturated", "g"),
    cumulative("HKQuantityTypeIdentifierDietaryCholesterol", "mg"),
    cumulative("HKQuantityTypeIdentifierDietarySodium", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryCarbohydrates", "g"),
    cumulative("HKQuantityTypeIdentifierDietaryFiber", "g"),
    cumulative("HKQuantityTypeIdentifierDietarySugar", "g"),
    cumulative("HKQuantityTypeIdentifierDietaryEnergyConsumed", "kcal"),
    cumulative("HKQuantityTypeIdentifierDietaryProtein", "g"),
    cumulative("HKQuantityTypeIdentifierDietaryVitaminA", "mcg"),
    cumulative("HKQuantityTypeIdentifierDietaryVitaminB6", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryVitaminB12", "mcg"),
    cumulative("HKQuantityTypeIdentifierDietaryVitaminC", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryVitaminD", "mcg"),
    cumulative("HKQuantityTypeIdentifierDietaryVitaminE", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryVitaminK", "mcg"),
    cumulative("HKQuantityTypeIdentifierDietaryCalcium", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryIron", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryThiamin", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryRiboflavin", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryNiacin", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryFolate", "mcg"),
    cumulative("HKQuantityTypeIdentifierDietaryBiotin", "mcg"),
    cumulative("HKQuantityTypeIdentifierDietaryPantothenicAcid", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryPhosphorus", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryIodine", "mcg"),
    cumulative("HKQuantityTypeIdentifierDietaryMagnesium", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryZinc", "mg"),
    cumulative("HKQuantityTypeIdentifierDietarySelenium", "mcg"),
    cumulative("HKQuantityTypeIdentifierDietaryCopper", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryManganese", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryChromium", "mcg"),
    cumulative("HKQuantityTypeIdentifierDietaryMolybdenum", "mcg"),
    cumulative("HKQuantityTypeIdentifierDietaryChloride", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryPotassium", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryCaffeine", "mg"),
    cumulative("HKQuantityTypeIdentifierDietaryWater", "mL"),
    // Mobility
    discrete("HKQuantityTypeIdentifierSixMinuteWalkTestDistance", "m"),
    discrete("HKQuantityTypeIdentifierWalkingSpeed", "m/s"),
    discrete("HKQuantityTypeIdentifierWalkingStepLength", "m"),
    discrete("HKQuantityTypeIdentifierWalkingAsymmetryPercentage", "%"),
    discrete("HKQuantityTypeIdentifierWalkingDoubleSupportPercentage", "%"),
    discrete("HKQuantityTypeIdentifierStairAscentSpeed", "m/s"),
    discrete("HKQuantityTypeIdentifierStairDescentSpeed", "m/s"),
    discrete("HKQuantityTypeIdentifierUVExposure", "count"),
    discrete("HKQuantityTypeIdentifierAtrialFibrillationBurden", "%"),
    discrete("HKQuantityTypeIdentifierUnderwaterDepth", "m"),
    temperature("HKQuantityTypeIdentifierWaterTemperature"),
    // Categories
    category("HKCategoryTypeIdentifierSleepAnalysis", ValueTable::SleepAnalysis),
    category("HKCategoryTypeIdentifierAppleStandHour", ValueTable::AppleStandHour),
    category(
        "HKCategoryTypeIdentifierCervicalMucusQuality",
        ValueTable::CervicalMucusQuality,
    ),
    category(
        "HKCategoryTypeIdentifierOvulationTestResult",
        ValueTable::OvulationTestResult,
    ),
    category("HKCategoryTypeIdentifierMenstrualFlow", ValueTable::MenstrualFlow),
    category(
        "HKCategoryTypeIdentifierIntermenstrualBleeding",
        ValueTable::NotApplicable,
    ),
    category(
        "HKCategoryTypeIdentifierPersistentIntermenstrualBleeding",
        ValueTable::NotApplicable,
    ),
    category(
        "HKCategoryTypeIdentifierProlongedMenstrualPeriods",
        ValueTable::NotApplicable,
    ),
    category(
        "HKCategoryTypeIdentifierIrregularMenstrualCycles",
        ValueTable::NotApplicable,
    ),
    category(
        "HKCategoryTypeIdentifierInfrequentMenstrualCycles",
        ValueTable::NotApplicable,
    ),
    category("HKCategoryTypeIdentifierSexualActivity", ValueTable::NotApplicable),
    category("HKCategoryTypeIdentifierMindfulSession", ValueTable::NotApplicable),
    category("HKCategoryTypeIdentifierHighHeartRateEvent", ValueTable::NotApplicable),
    category("HKCategoryTypeIdentifierLowHeartRateEvent", ValueTable::NotApplicable),
    category(
        "HKCategoryTypeIdentifierIrregularHeartRhythmEvent",
        ValueTable::NotApplicable,
    ),
    category(
        "HKCategoryTypeIdentifierAudioExposureEvent",
        ValueTable::AudioExposureEvent,
    ),
    category("HKCategoryTypeIdentifierToothbrushingEvent", ValueTable::NotApplicable),
    category("HKCategoryTypeIdentifierPregnancy", ValueTable::NotApplicable),
    category("HKCategoryTypeIdentifierLactation", ValueTable::NotApplicable),
    category("HKCategoryTypeIdentifierContraceptive", ValueTable::Contraceptive),
    category(
        "HKCategoryTypeIdentifierEnvironmentalAudioExposureEvent",
        ValueTable::AudioExposureEvent,
    ),
    category(
        "HKCategoryTypeIdentifierHeadphoneAudioExposureEvent",
        ValueTable::AudioExposureEvent,
    ),
    category("HKCategoryTypeIdentifierHandwashingEvent", ValueTable::NotApplicable),
    category(
        "HKCategoryTypeIdentifierLowCardioFitnessEvent",
        ValueTable::LowCardioFitnessEvent,
    ),
    category(
        "HKCategoryTypeIdentifierAppleWalkingSteadinessEvent",
        ValueTable::WalkingSteadinessEvent,
    ),
    // Symptoms
    symptom("HKCategoryTypeIdentifierAbdominalCramps"),
    symptom("HKCategoryTypeIdentifierAcne"),
    category("HKCategoryTypeIdentifierAppetiteChanges", ValueTable::AppetiteChanges),
    symptom("HKCategoryTypeIdentifierBladderIncontinence"),
    symptom("HKCategoryTypeIdentifierBloating"),
    symptom("HKCategoryTypeIdentifierBreastPain"),
    symptom("HKCategoryTypeIdentifierChestTightnessOrPain"),
    symptom("HKCategoryTypeIdentifierChills"),
    symptom("HKCategoryTypeIdentifierConstipation"),
    symptom("HKCategoryTypeIdentifierCoughing"),
    symptom("HKCategoryTypeIdentifierDiarrhea"),
    symptom("HKCategoryTypeIdentifierDizziness"),
    symptom("HKCategoryTypeIdentifierDrySkin"),
    symptom("HKCategoryTypeIdentifierFainting"),
    symptom("HKCategoryTypeIdentifierFatigue"),
    symptom("HKCategoryTypeIdentifierFever"),
    symptom("HKCategoryTypeIdentifierGeneralizedBodyAche"),
    symptom("HKCategoryTypeIdentifierHairLoss"),
    symptom("HKCategoryTypeIdentifierHeadache"),
    symptom("HKCategoryTypeIdentifierHeartburn"),
    symptom("HKCategoryTypeIdentifierHotFlashes"),
    symptom("HKCategoryTypeIdentifierLossOfSmell"),
    symptom("HKCategoryTypeIdentifierLossOfTaste"),
    symptom("HKCategoryTypeIdentifierLowerBackPain"),
    symptom("HKCategoryTypeIdentifierMemoryLapse"),
    symptom("HKCategoryTypeIdentifierMoodChanges"),
    symptom("HKCategoryTypeIdentifierNausea"),
    symptom("HKCategoryTypeIdentifierNightSweats"),
    symptom("HKCategoryTypeIdentifierPelvicPain"),
    symptom("HKCategoryTypeIdentifierRapidPoundingOrFlutteringHeartbeat"),
    symptom("HKCategoryTypeIdentifierRunnyNose"),
    symptom("HKCategoryTypeIdentifierShortnessOfBreath"),
    symptom("HKCategoryTypeIdentifierSinusCongestion"),
    symptom("HKCategoryTypeIdentifierSkippedHeartbeat"),
    symptom("HKCategoryTypeIdentifierSleepChanges"),
    symptom("HKCategoryTypeIdentifierSoreThroat"),
    symptom("HKCategoryTypeIdentifierVaginalDryness"),
    symptom("HKCategoryTypeIdentifierVomiting"),
    symptom("HKCategoryTypeIdentifierWheezing"),
    // Characteristics
    unitless("HKCharacteristicTypeIdentifierBiologicalSex", DataKind::Characteristic),
    unitless("HKCharacteristicTypeIdentifierBloodType", DataKind::Characteristic),
    unitless("HKCharacteristicTypeIdentifierDateOfBirth", DataKind::Characteristic),
    unitless("HKCharacteristicTypeIdentifierFitzpatrickSkinType", DataKind::Characteristic),
    unitless("HKCharacteristicTypeIdentifierWheelchairUse", DataKind::Characteristic),
    unitless("HKCharacteristicTypeIdentifierActivityMoveMode", DataKind::Characteristic),
    // Correlations, documents, workouts
    unitless("HKCorrelationTypeIdentifierBloodPressure", DataKind::Correlation),
    unitless("HKCorrelationTypeIdentifierFood", DataKind::Correlation),
    unitless("HKDocumentTypeIdentifierCDA", DataKind::Document),
    unitless(WORKOUT_IDENTIFIER, DataKind::Workout),
    unitless(PEDOMETER_IDENTIFIER, DataKind::Pedometer),
];

const PREFIXES: &[&str] = &[
    "HKQuantityTypeIdentifier",
    "HKCategoryTypeIdentifier",
    "HKCharacteristicTypeIdentifier",
    "HKCorrelationTypeIdentifier",
    "HKDocumentTypeIdentifier",
];

/// Short alias for a canonical identifier.
///
/// The prefix is dropped and the leading capital run lower-cased, keeping the last capital when
/// it starts a word: `UVExposure` becomes `uvExposure`, `VO2Max` becomes `vo2Max`.
fn short_alias(identifier: &str) -> String {
    if identifier == WORKOUT_IDENTIFIER {
        return "workout".to_owned();
    }
    let stem = PREFIXES
        .iter()
        .find_map(|prefix| identifier.strip_prefix(prefix))
        .unwrap_or(identifier);

    let chars: Vec<char> = stem.chars().collect();
    let run = chars.iter().take_while(|c| c.is_ascii_uppercase()).count();
    let lower_until = match chars.get(run) {
        Some(next) if next.is_ascii_lowercase() && run > 1 => run - 1,
        _ => run,
    };
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < lower_until { c.to_ascii_lowercase() } else { *c })
        .collect()
}

fn index() -> &'static HashMap<String, &'static DataTypeInfo> {
    static INDEX: OnceLock<HashMap<String, &'static DataTypeInfo>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut map = HashMap::with_capacity(CATALOGUE.len() * 2);
        for info in CATALOGUE {
            map.insert(info.identifier.to_owned(), info);
            map.insert(short_alias(info.identifier), info);
        }
        map
    })
}

/// A validated data type identifier.
///
/// Cheap to copy; equality, hashing and ordering use the canonical identifier.
#[derive(Clone, Copy)]
pub struct DataType(&'static DataTypeInfo);

impl DataType {
    /// Parse a canonical identifier or its short alias.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError::UnknownDataType`] when `identifier` is not in the catalogue.
    pub fn parse(identifier: &str) -> RecordsResult<Self> {
        index()
            .get(identifier.trim())
            .copied()
            .map(DataType)
            .ok_or_else(|| RecordsError::UnknownDataType(identifier.to_owned()))
    }

    /// Every supported data type, in catalogue order.
    pub fn all() -> impl Iterator<Item = DataType> {
        CATALOGUE.iter().map(DataType)
    }

    /// The workout type.
    pub fn workout() -> Self {
        Self::find(WORKOUT_IDENTIFIER)
    }

    /// The pseudo type used for pedometer summaries.
    pub fn pedometer() -> Self {
        Self::find(PEDOMETER_IDENTIFIER)
    }

    fn find(identifier: &str) -> Self {
        // Only called with identifiers present in the catalogue.
        CATALOGUE
            .iter()
            .find(|info| info.identifier == identifier)
            .map(DataType)
            .unwrap_or(DataType(&CATALOGUE[CATALOGUE.len() - 1]))
    }

    pub fn identifier(&self) -> &'static str {
        self.0.identifier
    }

    pub fn alias(&self) -> String {
        short_alias(self.0.identifier)
    }

    pub fn kind(&self) -> DataKind {
        self.0.kind
    }

    pub fn unit_rule(&self) -> UnitRule {
        self.0.unit_rule
    }

    pub fn aggregation_style(&self) -> Option<AggregationStyle> {
        self.0.aggregation_style
    }

    pub fn values(&self) -> ValueTable {
        self.0.values
    }

    pub fn is_quantity(&self) -> bool {
        self.0.kind == DataKind::Quantity
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        self.0.identifier == other.0.identifier
    }
}

impl Eq for DataType {}

impl PartialOrd for DataType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DataType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.identifier.cmp(other.0.identifier)
    }
}

impl std::hash::Hash for DataType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.identifier.hash(state);
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataType({})", self.0.identifier)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.identifier)
    }
}

impl std::str::FromStr for DataType {
    type Err = RecordsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::parse(s)
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.identifier())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let identifier = String::deserialize(deserializer)?;
        DataType::parse(&identifier).map_err(serde::de::Error::custom)
    }
}
