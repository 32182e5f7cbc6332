use bridge_wire::WireError;
use health_records::error_record::codes;
use health_records::{ErrorRecord, RecordsError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("health data is not available on this device")]
    HealthStoreUnavailable,
    #[error("feature unavailable: {0}")]
    FeatureUnavailable(String),
    #[error("health store failure: {0}")]
    Store(ErrorRecord),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to read config file: {0}")]
    ConfigRead(std::io::Error),
    #[error("background task failed: {0}")]
    Task(String),
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl From<RecordsError> for CoreError {
    fn from(err: RecordsError) -> Self {
        CoreError::Wire(WireError::from(err))
    }
}

impl CoreError {
    pub fn code(&self) -> i64 {
        match self {
            CoreError::HealthStoreUnavailable => codes::HEALTH_STORE_UNAVAILABLE,
            CoreError::FeatureUnavailable(_) => codes::FEATURE_UNAVAILABLE,
            CoreError::Store(record) => record.code(),
            CoreError::Wire(err) => err.code(),
            CoreError::InvalidRequest(_)
            | CoreError::Config(_)
            | CoreError::ConfigRead(_)
            | CoreError::Task(_) => codes::BRIDGE_FAILURE,
        }
    }

    /// The error as the host sees it. Native store failures keep their own domain.
    pub fn to_error_record(&self) -> ErrorRecord {
        match self {
            CoreError::Store(record) => record.clone(),
            CoreError::Wire(err) => err.to_error_record(),
            other => ErrorRecord::bridge(other.code(), other.to_string()),
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_keep_their_domain() {
        let native = ErrorRecord::new("com.apple.healthkit", 5, "authorization denied")
            .expect("valid domain");
        let err = CoreError::Store(native.clone());
        assert_eq!(err.to_error_record(), native);
        assert_eq!(err.code(), 5);
    }

    #[test]
    fn records_errors_reach_wire_codes() {
        let err = CoreError::from(RecordsError::UnknownDataType("x".into()));
        assert_eq!(err.code(), codes::UNKNOWN_DATA_TYPE);
        assert_eq!(
            CoreError::HealthStoreUnavailable.to_error_record().code(),
            codes::HEALTH_STORE_UNAVAILABLE
        );
    }
}
