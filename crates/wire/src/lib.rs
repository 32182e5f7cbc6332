//! Wire format support for the health bridge.
//!
//! This crate translates between the typed record model in `health-records` and the XML strings
//! exchanged with the host. Everything here is synchronous and stateless apart from the read-only
//! [`DefaultUnits`](health_records::DefaultUnits) table injected into the [`Encoder`].
//!
//! - [`Encoder`] turns records (or an [`ErrorRecord`]) into one wire document.
//! - [`Decoder`] turns host strings into constraints, intervals, numbers and timestamps.
//! - [`decode_document`] reads a wire document back into records, for host tooling and tests.

pub mod constraint;
pub mod decoder;
pub mod document;
pub mod encoder;
pub mod number;
pub mod wf;

pub use constraint::{Comparison, ConstraintExpression, Literal, LiteralType, Operand, Operator};
pub use decoder::{encode_interval, Decoder};
pub use document::{decode_document, DecodedDocument};
pub use encoder::{EncodeOptions, Encoder};
pub use number::{NumberFormat, NumberLocale};
pub use wf::Element;

use health_records::error_record::codes;
use health_records::{ErrorRecord, RecordsError};

/// Errors returned by the wire crate.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WireError {
    #[error("unknown data type identifier: {0}")]
    UnknownDataType(String),

    #[error("no default unit for data type: {0}")]
    NoDefaultUnit(String),

    #[error("malformed constraint ({reason}): {fragment}")]
    MalformedConstraint { reason: String, fragment: String },

    #[error("malformed document ({reason}): {fragment}")]
    MalformedDocument { reason: String, fragment: String },

    #[error("record mismatch: {0}")]
    RecordMismatch(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("xml error: {0}")]
    Xml(String),

    #[error(transparent)]
    Records(RecordsError),
}

impl From<RecordsError> for WireError {
    fn from(err: RecordsError) -> Self {
        match err {
            RecordsError::UnknownDataType(identifier) => WireError::UnknownDataType(identifier),
            RecordsError::NoDefaultUnit(identifier) => WireError::NoDefaultUnit(identifier),
            other => WireError::Records(other),
        }
    }
}

impl WireError {
    /// Stable numeric code reported to the host.
    pub fn code(&self) -> i64 {
        match self {
            WireError::UnknownDataType(_) => codes::UNKNOWN_DATA_TYPE,
            WireError::NoDefaultUnit(_) => codes::NO_DEFAULT_UNIT,
            WireError::MalformedConstraint { .. } => codes::MALFORMED_CONSTRAINT,
            WireError::MalformedDocument { .. } => codes::MALFORMED_DOCUMENT,
            _ => codes::BRIDGE_FAILURE,
        }
    }

    pub fn to_error_record(&self) -> ErrorRecord {
        ErrorRecord::bridge(self.code(), self.to_string())
    }

    pub(crate) fn malformed_constraint(reason: impl Into<String>, fragment: impl Into<String>) -> Self {
        WireError::MalformedConstraint {
            reason: reason.into(),
            fragment: fragment.into(),
        }
    }

    pub(crate) fn malformed_document(reason: impl Into<String>, fragment: impl Into<String>) -> Self {
        WireError::MalformedDocument {
            reason: reason.into(),
            fragment: fragment.into(),
        }
    }
}

pub type WireResult<T> = std::result::Result<T, WireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_errors_flatten_into_wire_kinds() {
        let err = WireError::from(RecordsError::UnknownDataType("x".into()));
        assert_eq!(err, WireError::UnknownDataType("x".into()));
        assert_eq!(err.code(), codes::UNKNOWN_DATA_TYPE);

        let err = WireError::from(RecordsError::UnknownUnit("furlong".into()));
        assert!(matches!(err, WireError::Records(RecordsError::UnknownUnit(_))));
        assert_eq!(err.code(), codes::BRIDGE_FAILURE);
    }

    #[test]
    fn error_record_carries_code_and_message() {
        let err = WireError::malformed_constraint("missing operand", "<eq field=\"x\"/>");
        let record = err.to_error_record();
        assert_eq!(record.code(), codes::MALFORMED_CONSTRAINT);
        assert!(record.description().contains("missing operand"));
    }
}
