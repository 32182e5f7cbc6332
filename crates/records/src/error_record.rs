//! Native failures carried to the host.

use crate::{RecordsError, RecordsResult};
use serde::{Deserialize, Serialize};

/// Error domain used for failures raised by the bridge itself.
pub const BRIDGE_ERROR_DOMAIN: &str = "healthbridge";

/// Stable numeric error codes.
pub mod codes {
    pub const HEALTH_STORE_UNAVAILABLE: i64 = 1001;
    pub const NO_DEFAULT_UNIT: i64 = 1003;
    pub const FEATURE_UNAVAILABLE: i64 = 1005;
    pub const BRIDGE_FAILURE: i64 = 2000;
    pub const UNKNOWN_DATA_TYPE: i64 = 2001;
    pub const MALFORMED_CONSTRAINT: i64 = 2002;
    pub const MALFORMED_DOCUMENT: i64 = 2003;
}

/// A failure reported by the health store or the bridge.
///
/// Built where the failure happens, encoded straight away and handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{domain} error {code}: {description}")]
pub struct ErrorRecord {
    domain: String,
    code: i64,
    description: String,
}

impl ErrorRecord {
    /// # Errors
    ///
    /// Returns [`RecordsError::InvalidInput`] if `domain` is blank.
    pub fn new(
        domain: impl AsRef<str>,
        code: i64,
        description: impl Into<String>,
    ) -> RecordsResult<Self> {
        let domain = domain.as_ref().trim();
        if domain.is_empty() {
            return Err(RecordsError::InvalidInput(
                "error domain cannot be empty".into(),
            ));
        }
        Ok(Self {
            domain: domain.to_owned(),
            code,
            description: description.into(),
        })
    }

    /// An error in the bridge's own domain.
    pub fn bridge(code: i64, description: impl Into<String>) -> Self {
        Self {
            domain: BRIDGE_ERROR_DOMAIN.to_owned(),
            code,
            description: description.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl From<&RecordsError> for ErrorRecord {
    fn from(err: &RecordsError) -> Self {
        let code = match err {
            RecordsError::UnknownDataType(_) => codes::UNKNOWN_DATA_TYPE,
            RecordsError::NoDefaultUnit(_) => codes::NO_DEFAULT_UNIT,
            _ => codes::BRIDGE_FAILURE,
        };
        ErrorRecord::bridge(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_domain() {
        let err = ErrorRecord::new("  ", 1, "x").expect_err("blank domain");
        assert!(matches!(err, RecordsError::InvalidInput(msg) if msg.contains("domain")));
    }

    #[test]
    fn maps_records_errors_to_codes() {
        let record = ErrorRecord::from(&RecordsError::UnknownDataType("x".into()));
        assert_eq!(record.code(), codes::UNKNOWN_DATA_TYPE);
        assert_eq!(record.domain(), BRIDGE_ERROR_DOMAIN);

        let record = ErrorRecord::from(&RecordsError::NoDefaultUnit("y".into()));
        assert_eq!(record.code(), codes::NO_DEFAULT_UNIT);
        assert!(record.to_string().starts_with("healthbridge error 1003"));
    }
}
