//! The closed set of health record variants.
//!
//! [`HealthRecord`] is a tagged union; code that consumes records matches on it exhaustively,
//! so a new record kind is a compile-time change for every consumer.
//!
//! Correlations hold [`CorrelatedSample`]s rather than [`HealthRecord`]s, which keeps a
//! correlation from ever containing another correlation.

use crate::aggregation::{Aggregation, StatisticsOption};
use crate::data_types::{AggregationStyle, DataKind, DataType};
use crate::interval::IntervalSpec;
use crate::labels::{
    ActivityMoveMode, BiologicalSex, BloodType, FitzpatrickSkinType, WheelchairUse,
    WorkoutActivityType, WorkoutEventType,
};
use crate::units::Quantity;
use bridge_types::NonEmptyText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// Shared parts
// ============================================================================

/// The app and device a sample came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRevision {
    pub name: NonEmptyText,
    #[serde(rename = "bundleID")]
    pub bundle_id: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
}

/// A metadata value. Dictionaries nest arbitrarily deep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum MetadataValue {
    #[serde(rename = "string")]
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Quantity(Quantity),
    Dictionary(BTreeMap<String, MetadataValue>),
}

/// Attributes common to every sample-like record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleHeader {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRevision>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl SampleHeader {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            uuid: None,
            source: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn with_source(mut self, source: SourceRevision) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

// ============================================================================
// Samples
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantitySample {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(flatten)]
    pub header: SampleHeader,
    pub quantity: Quantity,
    /// Number of underlying samples when this one is itself a series aggregate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySample {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(flatten)]
    pub header: SampleHeader,
    pub value: i64,
}

impl CategorySample {
    /// Human-readable label for the value, when the type's table knows it.
    pub fn label(&self) -> Option<&'static str> {
        self.data_type.values().label(self.value)
    }
}

/// A sample nested inside a correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CorrelatedSample {
    Quantity(QuantitySample),
    Category(CategorySample),
}

impl CorrelatedSample {
    pub fn data_type(&self) -> DataType {
        match self {
            CorrelatedSample::Quantity(sample) => sample.data_type,
            CorrelatedSample::Category(sample) => sample.data_type,
        }
    }

    pub fn header(&self) -> &SampleHeader {
        match self {
            CorrelatedSample::Quantity(sample) => &sample.header,
            CorrelatedSample::Category(sample) => &sample.header,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationSample {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(flatten)]
    pub header: SampleHeader,
    pub objects: Vec<CorrelatedSample>,
}

// ============================================================================
// Characteristics
// ============================================================================

/// A point-in-time fact about the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Characteristic {
    BiologicalSex(BiologicalSex),
    BloodType(BloodType),
    DateOfBirth(DateTime<Utc>),
    FitzpatrickSkinType(FitzpatrickSkinType),
    WheelchairUse(WheelchairUse),
    ActivityMoveMode(ActivityMoveMode),
}

impl Characteristic {
    /// Canonical identifier of the characteristic type this value belongs to.
    pub fn identifier(&self) -> &'static str {
        match self {
            Characteristic::BiologicalSex(_) => "HKCharacteristicTypeIdentifierBiologicalSex",
            Characteristic::BloodType(_) => "HKCharacteristicTypeIdentifierBloodType",
            Characteristic::DateOfBirth(_) => "HKCharacteristicTypeIdentifierDateOfBirth",
            Characteristic::FitzpatrickSkinType(_) => {
                "HKCharacteristicTypeIdentifierFitzpatrickSkinType"
            }
            Characteristic::WheelchairUse(_) => "HKCharacteristicTypeIdentifierWheelchairUse",
            Characteristic::ActivityMoveMode(_) => {
                "HKCharacteristicTypeIdentifierActivityMoveMode"
            }
        }
    }

    /// Integer code and label, or `None` for the date of birth.
    pub fn coded_value(&self) -> Option<(i64, &'static str)> {
        match self {
            Characteristic::BiologicalSex(v) => Some((v.code(), v.label())),
            Characteristic::BloodType(v) => Some((v.code(), v.label())),
            Characteristic::DateOfBirth(_) => None,
            Characteristic::FitzpatrickSkinType(v) => Some((v.code(), v.label())),
            Characteristic::WheelchairUse(v) => Some((v.code(), v.label())),
            Characteristic::ActivityMoveMode(v) => Some((v.code(), v.label())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicRecord {
    pub characteristic: Characteristic,
}

// ============================================================================
// Workouts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutEvent {
    pub event_type: WorkoutEventType,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSample {
    #[serde(flatten)]
    pub header: SampleHeader,
    pub activity_type: WorkoutActivityType,
    /// Active duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_energy_burned: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<WorkoutEvent>,
}

// ============================================================================
// Aggregates
// ============================================================================

/// Aggregate values for one quantity type over one time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsRecord {
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub option: StatisticsOption,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_recent: Option<Quantity>,
}

impl StatisticsRecord {
    pub fn empty(
        data_type: DataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        option: StatisticsOption,
    ) -> Self {
        Self {
            data_type,
            start,
            end,
            option,
            sum: None,
            average: None,
            minimum: None,
            maximum: None,
            most_recent: None,
        }
    }

    /// Present aggregates in wire order.
    pub fn values(&self) -> impl Iterator<Item = (Aggregation, Quantity)> + '_ {
        [
            (Aggregation::Sum, self.sum),
            (Aggregation::Average, self.average),
            (Aggregation::Minimum, self.minimum),
            (Aggregation::Maximum, self.maximum),
            (Aggregation::MostRecent, self.most_recent),
        ]
        .into_iter()
        .filter_map(|(aggregation, value)| value.map(|q| (aggregation, q)))
    }

    pub fn get(&self, aggregation: Aggregation) -> Option<Quantity> {
        match aggregation {
            Aggregation::Sum => self.sum,
            Aggregation::Average => self.average,
            Aggregation::Minimum => self.minimum,
            Aggregation::Maximum => self.maximum,
            Aggregation::MostRecent => self.most_recent,
        }
    }

    pub fn set(&mut self, aggregation: Aggregation, value: Option<Quantity>) {
        match aggregation {
            Aggregation::Sum => self.sum = value,
            Aggregation::Average => self.average = value,
            Aggregation::Minimum => self.minimum = value,
            Aggregation::Maximum => self.maximum = value,
            Aggregation::MostRecent => self.most_recent = value,
        }
    }

    pub fn aggregation_style(&self) -> Option<AggregationStyle> {
        self.data_type.aggregation_style()
    }
}

/// Statistics bucketed by a repeating interval from an anchor date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsCollection {
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub option: StatisticsOption,
    pub anchor: DateTime<Utc>,
    pub interval: IntervalSpec,
    pub statistics: Vec<StatisticsRecord>,
}

/// A set of quantity samples pre-reduced to one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedTotal {
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub value: Quantity,
    pub aggregation: Aggregation,
    /// Number of samples that were reduced.
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

// ============================================================================
// Documents and pedometer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(flatten)]
    pub header: SampleHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custodian: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<String>,
    /// Full document body; only read when full data was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PedometerSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub steps: u64,
    /// Distance in metres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floors_ascended: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floors_descended: Option<u32>,
}

// ============================================================================
// The union
// ============================================================================

/// Any record the health store can return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HealthRecord {
    Quantity(QuantitySample),
    Category(CategorySample),
    Correlation(CorrelationSample),
    Characteristic(CharacteristicRecord),
    Workout(WorkoutSample),
    Statistics(StatisticsRecord),
    StatisticsCollection(StatisticsCollection),
    Document(DocumentRecord),
    Pedometer(PedometerSummary),
    CombinedTotal(CombinedTotal),
}

impl HealthRecord {
    /// Variant name, as used in diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            HealthRecord::Quantity(_) => "quantity sample",
            HealthRecord::Category(_) => "category sample",
            HealthRecord::Correlation(_) => "correlation sample",
            HealthRecord::Characteristic(_) => "characteristic",
            HealthRecord::Workout(_) => "workout sample",
            HealthRecord::Statistics(_) => "statistics",
            HealthRecord::StatisticsCollection(_) => "statistics collection",
            HealthRecord::Document(_) => "document",
            HealthRecord::Pedometer(_) => "pedometer summary",
            HealthRecord::CombinedTotal(_) => "combined total",
        }
    }

    /// Data kind a record of this variant must be declared with.
    pub fn expected_kind(&self) -> DataKind {
        match self {
            HealthRecord::Quantity(_)
            | HealthRecord::Statistics(_)
            | HealthRecord::StatisticsCollection(_)
            | HealthRecord::CombinedTotal(_) => DataKind::Quantity,
            HealthRecord::Category(_) => DataKind::Category,
            HealthRecord::Correlation(_) => DataKind::Correlation,
            HealthRecord::Characteristic(_) => DataKind::Characteristic,
            HealthRecord::Workout(_) => DataKind::Workout,
            HealthRecord::Document(_) => DataKind::Document,
            HealthRecord::Pedometer(_) => DataKind::Pedometer,
        }
    }

    /// Data type carried by the record itself, where it has one.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            HealthRecord::Quantity(sample) => Some(sample.data_type),
            HealthRecord::Category(sample) => Some(sample.data_type),
            HealthRecord::Correlation(sample) => Some(sample.data_type),
            HealthRecord::Characteristic(record) => {
                DataType::parse(record.characteristic.identifier()).ok()
            }
            HealthRecord::Workout(_) => Some(DataType::workout()),
            HealthRecord::Statistics(record) => Some(record.data_type),
            HealthRecord::StatisticsCollection(collection) => Some(collection.data_type),
            HealthRecord::Document(record) => Some(record.data_type),
            HealthRecord::Pedometer(_) => Some(DataType::pedometer()),
            HealthRecord::CombinedTotal(total) => Some(total.data_type),
        }
    }

    /// Sample header, for the sample-like variants.
    pub fn header(&self) -> Option<&SampleHeader> {
        match self {
            HealthRecord::Quantity(sample) => Some(&sample.header),
            HealthRecord::Category(sample) => Some(&sample.header),
            HealthRecord::Correlation(sample) => Some(&sample.header),
            HealthRecord::Workout(sample) => Some(&sample.header),
            HealthRecord::Document(record) => Some(&record.header),
            HealthRecord::Characteristic(_)
            | HealthRecord::Statistics(_)
            | HealthRecord::StatisticsCollection(_)
            | HealthRecord::Pedometer(_)
            | HealthRecord::CombinedTotal(_) => None,
        }
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        match self {
            HealthRecord::Statistics(record) => Some(record.start),
            HealthRecord::StatisticsCollection(collection) => Some(collection.anchor),
            HealthRecord::Pedometer(summary) => Some(summary.start),
            HealthRecord::CombinedTotal(total) => total.start,
            other => other.header().map(|h| h.start),
        }
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        match self {
            HealthRecord::Statistics(record) => Some(record.end),
            HealthRecord::Pedometer(summary) => Some(summary.end),
            HealthRecord::CombinedTotal(total) => total.end,
            other => other.header().map(|h| h.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn steps(value: f64) -> QuantitySample {
        QuantitySample {
            data_type: DataType::parse("stepCount").unwrap(),
            header: SampleHeader::new(at(8), at(9)),
            quantity: Quantity::new(value, Unit::parse("count").unwrap()),
            count: None,
        }
    }

    #[test]
    fn category_label_uses_type_table() {
        let sleep = CategorySample {
            data_type: DataType::parse("sleepAnalysis").unwrap(),
            header: SampleHeader::new(at(0), at(6)),
            value: 4,
        };
        assert_eq!(sleep.label(), Some("asleepDeep"));
    }

    #[test]
    fn json_round_trip_preserves_nested_correlation() {
        let systolic = QuantitySample {
            data_type: DataType::parse("bloodPressureSystolic").unwrap(),
            header: SampleHeader::new(at(7), at(7)),
            quantity: Quantity::new(120.0, Unit::parse("mmHg").unwrap()),
            count: None,
        };
        let record = HealthRecord::Correlation(CorrelationSample {
            data_type: DataType::parse("HKCorrelationTypeIdentifierBloodPressure").unwrap(),
            header: SampleHeader::new(at(7), at(7))
                .with_metadata("HKWasUserEntered", MetadataValue::Bool(true)),
            objects: vec![CorrelatedSample::Quantity(systolic)],
        });

        let json = serde_json::to_string(&record).expect("serialize");
        assert!(json.contains("\"kind\":\"correlation\""));
        let back: HealthRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, record);
    }

    #[test]
    fn characteristic_record_resolves_its_type() {
        let record = HealthRecord::Characteristic(CharacteristicRecord {
            characteristic: Characteristic::BloodType(BloodType::ONegative),
        });
        assert_eq!(record.expected_kind(), DataKind::Characteristic);
        assert_eq!(
            record.data_type().map(|t| t.identifier()),
            Some("HKCharacteristicTypeIdentifierBloodType")
        );
        assert!(record.header().is_none());
    }

    #[test]
    fn statistics_values_iterate_in_wire_order() {
        let mut stats = StatisticsRecord::empty(
            DataType::parse("heartRate").unwrap(),
            at(0),
            at(1),
            StatisticsOption::None,
        );
        let bpm = Unit::parse("count/min").unwrap();
        stats.set(Aggregation::Maximum, Some(Quantity::new(90.0, bpm)));
        stats.set(Aggregation::Average, Some(Quantity::new(70.0, bpm)));
        let order: Vec<_> = stats.values().map(|(a, _)| a).collect();
        assert_eq!(order, vec![Aggregation::Average, Aggregation::Maximum]);
    }

    #[test]
    fn sample_accessors_cover_time_range() {
        let record = HealthRecord::Quantity(steps(100.0));
        assert_eq!(record.start(), Some(at(8)));
        assert_eq!(record.end(), Some(at(9)));
        assert_eq!(record.variant_name(), "quantity sample");
    }
}
