//! Demo data for the in-memory store.
//!
//! Everything is laid out relative to a caller-supplied `now`, so the same `now` always produces
//! the same records.

use crate::store::InMemoryHealthStore;
use crate::CoreResult;
use bridge_types::NonEmptyText;
use chrono::{DateTime, Duration, TimeZone, Utc};
use health_records::labels::{
    BiologicalSex, BloodType, SleepAnalysis, WorkoutActivityType, WorkoutEventType,
};
use health_records::{
    CategorySample, Characteristic, CharacteristicRecord, CorrelatedSample, CorrelationSample,
    DataType, DocumentRecord, HealthRecord, MetadataValue, PedometerSummary, Quantity,
    QuantitySample, RecordsError, SampleHeader, SourceRevision, Unit, WorkoutEvent, WorkoutSample,
};

const DEMO_CDA: &str = "<ClinicalDocument xmlns=\"urn:hl7-org:v3\"><title>Annual check-up</title></ClinicalDocument>";

/// Fill `store` with a day of plausible data ending at `now`.
pub fn seed(store: &InMemoryHealthStore, now: DateTime<Utc>) -> CoreResult<()> {
    let phone = source("Demo Phone", "com.example.health.phone")?;
    let watch = source("Demo Watch", "com.example.health.watch")?;
    let day_start = now - Duration::hours(24);

    let mut records = Vec::new();

    // Hourly steps from the phone.
    for hour in 0..24 {
        let start = day_start + Duration::hours(hour);
        let value = f64::from(u32::try_from((hour * 137) % 600).unwrap_or(0) + 40);
        records.push(quantity(
            "stepCount",
            SampleHeader::new(start, start + Duration::hours(1)).with_source(phone.clone()),
            value,
            "count",
        )?);
    }

    // Heart rate every two hours from the watch.
    for slot in 0..12 {
        let start = day_start + Duration::hours(slot * 2);
        let bpm = 58.0 + f64::from(u32::try_from((slot * 7) % 30).unwrap_or(0));
        records.push(quantity(
            "heartRate",
            SampleHeader::new(start, start).with_source(watch.clone()),
            bpm,
            "count/min",
        )?);
    }

    for (hour, celsius) in [(7, 36.6), (13, 36.9), (21, 37.1)] {
        let at = day_start + Duration::hours(hour);
        records.push(quantity(
            "bodyTemperature",
            SampleHeader::new(at, at).with_source(phone.clone()),
            celsius,
            "degC",
        )?);
    }

    let weigh_in = day_start + Duration::hours(7);
    records.push(quantity(
        "bodyMass",
        SampleHeader::new(weigh_in, weigh_in)
            .with_source(phone.clone())
            .with_metadata("HKWasUserEntered", MetadataValue::Bool(true)),
        70.5,
        "kg",
    )?);

    let bed = day_start - Duration::hours(1);
    records.push(HealthRecord::Category(CategorySample {
        data_type: DataType::parse("sleepAnalysis")?,
        header: SampleHeader::new(bed, bed + Duration::hours(8)).with_source(watch.clone()),
        value: SleepAnalysis::InBed.code(),
    }));
    records.push(HealthRecord::Category(CategorySample {
        data_type: DataType::parse("sleepAnalysis")?,
        header: SampleHeader::new(bed + Duration::minutes(20), bed + Duration::hours(7))
            .with_source(watch.clone()),
        value: SleepAnalysis::Asleep.code(),
    }));

    let reading = day_start + Duration::hours(9);
    let reading_header = SampleHeader::new(reading, reading).with_source(phone.clone());
    records.push(HealthRecord::Correlation(CorrelationSample {
        data_type: DataType::parse("HKCorrelationTypeIdentifierBloodPressure")?,
        header: reading_header.clone(),
        objects: vec![
            CorrelatedSample::Quantity(quantity_sample(
                "bloodPressureSystolic",
                reading_header.clone(),
                121.0,
                "mmHg",
            )?),
            CorrelatedSample::Quantity(quantity_sample(
                "bloodPressureDiastolic",
                reading_header,
                79.0,
                "mmHg",
            )?),
        ],
    }));

    let run_start = day_start + Duration::hours(18);
    let run_end = run_start + Duration::minutes(32);
    records.push(HealthRecord::Workout(WorkoutSample {
        header: SampleHeader::new(run_start, run_end).with_source(watch.clone()),
        activity_type: WorkoutActivityType::Running,
        duration: Some(32.0 * 60.0),
        total_distance: Some(Quantity::new(5.2, Unit::parse("km")?)),
        total_energy_burned: Some(Quantity::new(361.0, Unit::parse("kcal")?)),
        events: vec![
            WorkoutEvent {
                event_type: WorkoutEventType::Pause,
                date: run_start + Duration::minutes(15),
            },
            WorkoutEvent {
                event_type: WorkoutEventType::Resume,
                date: run_start + Duration::minutes(16),
            },
        ],
    }));

    let walk_start = day_start + Duration::hours(12);
    records.push(HealthRecord::Workout(WorkoutSample {
        header: SampleHeader::new(walk_start, walk_start + Duration::minutes(45))
            .with_source(phone.clone()),
        activity_type: WorkoutActivityType::Walking,
        duration: Some(45.0 * 60.0),
        total_distance: Some(Quantity::new(3.4, Unit::parse("km")?)),
        total_energy_burned: None,
        events: Vec::new(),
    }));

    records.push(characteristic(Characteristic::BiologicalSex(
        BiologicalSex::Female,
    )));
    records.push(characteristic(Characteristic::BloodType(BloodType::APositive)));
    let born = Utc
        .with_ymd_and_hms(1990, 4, 12, 0, 0, 0)
        .single()
        .ok_or_else(|| RecordsError::InvalidInput("demo date of birth".into()))?;
    records.push(characteristic(Characteristic::DateOfBirth(born)));

    let filed = day_start + Duration::hours(10);
    records.push(HealthRecord::Document(DocumentRecord {
        data_type: DataType::parse("HKDocumentTypeIdentifierCDA")?,
        header: SampleHeader::new(filed, filed).with_source(phone),
        title: Some("Annual check-up".into()),
        author: Some("Dr. A. Example".into()),
        custodian: Some("Example Health Centre".into()),
        patient: Some("Demo Patient".into()),
        content: Some(DEMO_CDA.into()),
    }));

    records.push(HealthRecord::Pedometer(PedometerSummary {
        start: day_start,
        end: now,
        steps: 7_420,
        distance: Some(5_310.0),
        floors_ascended: Some(11),
        floors_descended: Some(9),
    }));

    tracing::debug!("seeding {} demo record(s)", records.len());
    store.insert_all(records)
}

fn source(name: &str, bundle_id: &str) -> CoreResult<SourceRevision> {
    Ok(SourceRevision {
        name: NonEmptyText::new(name).map_err(RecordsError::from)?,
        bundle_id: NonEmptyText::new(bundle_id).map_err(RecordsError::from)?,
        version: Some("1.0".into()),
        product_type: None,
    })
}

fn quantity_sample(
    identifier: &str,
    header: SampleHeader,
    value: f64,
    unit: &str,
) -> CoreResult<QuantitySample> {
    Ok(QuantitySample {
        data_type: DataType::parse(identifier)?,
        header,
        quantity: Quantity::new(value, Unit::parse(unit)?),
        count: None,
    })
}

fn quantity(
    identifier: &str,
    header: SampleHeader,
    value: f64,
    unit: &str,
) -> CoreResult<HealthRecord> {
    quantity_sample(identifier, header, value, unit).map(HealthRecord::Quantity)
}

fn characteristic(characteristic: Characteristic) -> HealthRecord {
    HealthRecord::Characteristic(CharacteristicRecord { characteristic })
}
