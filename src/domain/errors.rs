//! Domain errors for the migration tracking core.

use thiserror::Error;

use super::models::{AlertId, ServerId};

/// Domain-level errors that can occur in the migration tracking core.
///
/// None of these are fatal: callers surface them as a visible, retryable
/// state rather than aborting.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Validation rejected: {0}")]
    ValidationRejected(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Data inconsistency: {0}")]
    DataInconsistency(String),

    #[error("Server not found: {0}")]
    ServerNotFound(ServerId),

    #[error("Alert not found: {0}")]
    AlertNotFound(AlertId),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportFailure(_) | Self::Timeout(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<reqwest::Error> for DomainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DomainError::SerializationError(err.to_string())
        } else {
            DomainError::TransportFailure(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DomainError::TransportFailure("reset".into()).is_retryable());
        assert!(DomainError::Timeout(500).is_retryable());
        assert!(!DomainError::ServerNotFound(ServerId(3)).is_retryable());
        assert!(!DomainError::ValidationRejected("stale".into()).is_retryable());
    }

    #[test]
    fn test_malformed_json_is_not_retryable() {
        let err: DomainError = serde_json::from_str::<Vec<i64>>("{\"not\": \"a list\"}")
            .unwrap_err()
            .into();
        assert!(matches!(err, DomainError::SerializationError(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            DomainError::AlertNotFound(AlertId(9)).to_string(),
            "Alert not found: 9"
        );
        assert_eq!(
            DomainError::Timeout(1500).to_string(),
            "Operation timed out after 1500ms"
        );
    }
}
