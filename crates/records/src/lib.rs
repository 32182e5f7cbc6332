//! # Health Records
//!
//! Native health-record model shared by the bridge and the query layer.
//!
//! This crate owns the typed side of the bridge:
//! - the catalogue of supported data type identifiers ([`DataType`])
//! - units, quantities and the per-identifier default-unit table ([`DefaultUnits`])
//! - the closed set of record variants ([`HealthRecord`])
//! - interval specifications, aggregation and statistics reduction
//! - [`ErrorRecord`], the native failure carried to the host
//!
//! **No wire concerns**: XML encoding and decoding live in `bridge-wire`.

pub mod aggregation;
pub mod data_types;
pub mod default_units;
pub mod error_record;
pub mod interval;
pub mod labels;
pub mod record;
pub mod units;

pub use aggregation::{combine, summarize, Aggregation, StatisticsOption};
pub use data_types::{AggregationStyle, DataKind, DataType};
pub use default_units::{DefaultUnits, TemperatureScale};
pub use error_record::ErrorRecord;
pub use interval::{CalendarUnit, IntervalSpec};
pub use record::{
    CategorySample, Characteristic, CharacteristicRecord, CombinedTotal, CorrelatedSample,
    CorrelationSample, DocumentRecord, HealthRecord, MetadataValue, PedometerSummary,
    QuantitySample, SampleHeader, SourceRevision, StatisticsCollection, StatisticsRecord,
    WorkoutEvent, WorkoutSample,
};
pub use units::{Dimension, Quantity, Unit};

/// Errors returned by the `health-records` crate.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecordsError {
    #[error("unknown data type identifier: {0}")]
    UnknownDataType(String),

    #[error("no default unit for data type: {0}")]
    NoDefaultUnit(String),

    #[error("unknown unit: {0}")]
    UnknownUnit(String),

    #[error("cannot convert {from} to {to}")]
    IncompatibleUnits { from: String, to: String },

    #[error("unknown calendar unit: {0}")]
    UnknownCalendarUnit(String),

    #[error("unknown aggregation: {0}")]
    UnknownAggregation(String),

    #[error("unknown statistics option: {0}")]
    UnknownStatisticsOption(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Text(#[from] bridge_types::TypesError),
}

pub type RecordsResult<T> = std::result::Result<T, RecordsError>;
