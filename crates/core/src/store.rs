//! The health store seam and its in-memory implementation.
//!
//! [`HealthStore`] is everything the orchestrator needs from a native health database: sample
//! reads by type and time range, characteristics, pedometer summaries, an availability flag and a
//! change feed for background observers. Reduction (statistics, combined totals) is not part of
//! the seam; the orchestrator computes it from raw samples with `health_records`.

use crate::constants::STORE_CHANGE_CAPACITY;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use health_records::{DataKind, DataType, ErrorRecord, HealthRecord, PedometerSummary};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRequest`] when `end` is before `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if end < start {
            return Err(CoreError::InvalidRequest(format!(
                "range ends before it starts: {start} > {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Everything representable.
    pub fn unbounded() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// A native health database.
///
/// Implementations are called from the blocking thread pool and may block.
pub trait HealthStore: Send + Sync + 'static {
    /// Whether health data can be read at all on this device.
    fn is_available(&self) -> bool;

    /// Stored samples of `data_type` whose start falls in `range`, oldest first.
    ///
    /// Covers quantity, category, correlation, workout and document types.
    fn samples(&self, data_type: DataType, range: &DateRange) -> CoreResult<Vec<HealthRecord>>;

    /// The current value of a characteristic, if the user has set one.
    fn characteristic(&self, data_type: DataType) -> CoreResult<Option<HealthRecord>>;

    /// Pedometer summaries starting in `range`.
    fn pedometer(&self, range: &DateRange) -> CoreResult<Vec<PedometerSummary>>;

    /// Feed of newly stored records.
    fn subscribe(&self) -> broadcast::Receiver<HealthRecord>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// A [`HealthStore`] backed by a vector, used by the host simulator and in tests.
pub struct InMemoryHealthStore {
    records: RwLock<Vec<HealthRecord>>,
    available: AtomicBool,
    pending_failure: Mutex<Option<ErrorRecord>>,
    changes: broadcast::Sender<HealthRecord>,
}

impl Default for InMemoryHealthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHealthStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(STORE_CHANGE_CAPACITY);
        Self {
            records: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
            pending_failure: Mutex::new(None),
            changes,
        }
    }

    /// Store a sample-like record and notify subscribers.
    ///
    /// A characteristic replaces any earlier value of the same type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRequest`] for derived records (statistics, collections,
    /// combined totals), which the store never holds.
    pub fn insert(&self, record: HealthRecord) -> CoreResult<()> {
        match &record {
            HealthRecord::Statistics(_)
            | HealthRecord::StatisticsCollection(_)
            | HealthRecord::CombinedTotal(_) => {
                return Err(CoreError::InvalidRequest(format!(
                    "a {} is computed, not stored",
                    record.variant_name()
                )));
            }
            _ => {}
        }

        {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            if let HealthRecord::Characteristic(new) = &record {
                records.retain(|existing| match existing {
                    HealthRecord::Characteristic(old) => {
                        old.characteristic.identifier() != new.characteristic.identifier()
                    }
                    _ => true,
                });
            }
            records.push(record.clone());
        }

        // No receivers is fine.
        let _ = self.changes.send(record);
        Ok(())
    }

    pub fn insert_all(&self, records: impl IntoIterator<Item = HealthRecord>) -> CoreResult<()> {
        for record in records {
            self.insert(record)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make the next read fail with `error`, as a native query would.
    pub fn fail_next(&self, error: ErrorRecord) {
        *self
            .pending_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    fn check_failure(&self) -> CoreResult<()> {
        let pending = self
            .pending_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            Some(error) => Err(CoreError::Store(error)),
            None => Ok(()),
        }
    }

    fn select<T>(&self, mut pick: impl FnMut(&HealthRecord) -> Option<T>) -> Vec<T> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(&mut pick)
            .collect()
    }
}

impl HealthStore for InMemoryHealthStore {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn samples(&self, data_type: DataType, range: &DateRange) -> CoreResult<Vec<HealthRecord>> {
        self.check_failure()?;
        match data_type.kind() {
            DataKind::Characteristic | DataKind::Pedometer => {
                return Err(CoreError::InvalidRequest(format!(
                    "{data_type} has no samples"
                )));
            }
            _ => {}
        }

        let mut found = self.select(|record| {
            let matches = record.data_type() == Some(data_type)
                && record.header().is_some_and(|h| range.contains(h.start));
            matches.then(|| record.clone())
        });
        found.sort_by_key(|record| record.start());
        Ok(found)
    }

    fn characteristic(&self, data_type: DataType) -> CoreResult<Option<HealthRecord>> {
        self.check_failure()?;
        if data_type.kind() != DataKind::Characteristic {
            return Err(CoreError::InvalidRequest(format!(
                "{data_type} is not a characteristic"
            )));
        }
        Ok(self
            .select(|record| match record {
                HealthRecord::Characteristic(value)
                    if value.characteristic.identifier() == data_type.identifier() =>
                {
                    Some(record.clone())
                }
                _ => None,
            })
            .pop())
    }

    fn pedometer(&self, range: &DateRange) -> CoreResult<Vec<PedometerSummary>> {
        self.check_failure()?;
        let mut found = self.select(|record| match record {
            HealthRecord::Pedometer(summary) if range.contains(summary.start) => {
                Some(summary.clone())
            }
            _ => None,
        });
        found.sort_by_key(|summary| summary.start);
        Ok(found)
    }

    fn subscribe(&self) -> broadcast::Receiver<HealthRecord> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use health_records::labels::BloodType;
    use health_records::{
        Characteristic, CharacteristicRecord, Quantity, QuantitySample, SampleHeader, Unit,
    };

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn steps(hour: u32, value: f64) -> HealthRecord {
        HealthRecord::Quantity(QuantitySample {
            data_type: DataType::parse("stepCount").unwrap(),
            header: SampleHeader::new(at(hour), at(hour + 1)),
            quantity: Quantity::new(value, Unit::parse("count").unwrap()),
            count: None,
        })
    }

    fn blood_type(value: BloodType) -> HealthRecord {
        HealthRecord::Characteristic(CharacteristicRecord {
            characteristic: Characteristic::BloodType(value),
        })
    }

    #[test]
    fn range_is_half_open() {
        let range = DateRange::new(at(1), at(3)).expect("ordered");
        assert!(range.contains(at(1)));
        assert!(range.contains(at(2)));
        assert!(!range.contains(at(3)));
        assert!(DateRange::new(at(3), at(1)).is_err());
    }

    #[test]
    fn samples_are_filtered_and_sorted() {
        let store = InMemoryHealthStore::new();
        store
            .insert_all([steps(5, 50.0), steps(1, 10.0), steps(3, 30.0)])
            .expect("insert");

        let step_count = DataType::parse("stepCount").unwrap();
        let found = store
            .samples(step_count, &DateRange::new(at(1), at(5)).unwrap())
            .expect("read");
        let starts: Vec<_> = found.iter().filter_map(HealthRecord::start).collect();
        assert_eq!(starts, vec![at(1), at(3)]);

        let heart_rate = DataType::parse("heartRate").unwrap();
        assert!(store
            .samples(heart_rate, &DateRange::unbounded())
            .expect("read")
            .is_empty());
    }

    #[test]
    fn characteristics_replace_earlier_values() {
        let store = InMemoryHealthStore::new();
        store.insert(blood_type(BloodType::APositive)).expect("insert");
        store.insert(blood_type(BloodType::ONegative)).expect("insert");
        assert_eq!(store.len(), 1);

        let data_type = DataType::parse("bloodType").unwrap();
        let found = store.characteristic(data_type).expect("read");
        assert_eq!(found, Some(blood_type(BloodType::ONegative)));

        let sex = DataType::parse("biologicalSex").unwrap();
        assert_eq!(store.characteristic(sex).expect("read"), None);
    }

    #[test]
    fn derived_records_are_rejected() {
        let store = InMemoryHealthStore::new();
        let stats = health_records::StatisticsRecord::empty(
            DataType::parse("stepCount").unwrap(),
            at(0),
            at(1),
            health_records::StatisticsOption::CumulativeSum,
        );
        let err = store
            .insert(HealthRecord::Statistics(stats))
            .expect_err("derived");
        assert!(matches!(err, CoreError::InvalidRequest(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn injected_failure_fails_one_read() {
        let store = InMemoryHealthStore::new();
        let native = ErrorRecord::new("com.apple.healthkit", 5, "not authorized").unwrap();
        store.fail_next(native.clone());

        let step_count = DataType::parse("stepCount").unwrap();
        let err = store
            .samples(step_count, &DateRange::unbounded())
            .expect_err("fails once");
        assert!(matches!(err, CoreError::Store(record) if record == native));
        assert!(store.samples(step_count, &DateRange::unbounded()).is_ok());
    }

    #[test]
    fn subscribers_see_inserts() {
        let store = InMemoryHealthStore::new();
        let mut changes = store.subscribe();
        store.insert(steps(2, 20.0)).expect("insert");
        assert_eq!(changes.try_recv().expect("change"), steps(2, 20.0));
    }
}
