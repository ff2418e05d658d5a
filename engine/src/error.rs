//! Error types for the Dompet engine.

use crate::{FormatVersion, OperationId, OperationStatus};
use thiserror::Error;

/// All possible errors from the Dompet engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("field '{0}' must be greater than zero")]
    NonPositiveAmount(String),

    // Queue state errors
    #[error("operation not found: {0}")]
    OperationNotFound(OperationId),

    #[error("invalid status transition for {op_id}: {from} -> {to}")]
    InvalidTransition {
        op_id: OperationId,
        from: OperationStatus,
        to: OperationStatus,
    },

    // Persisted format errors
    #[error("invalid persisted record: {0}")]
    InvalidRecord(String),

    #[error("unsupported record format version: {found} (max supported: {supported})")]
    UnsupportedFormatVersion {
        found: FormatVersion,
        supported: FormatVersion,
    },
}

impl Error {
    /// Whether the error describes bad transaction input (as opposed to queue state).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::UnknownCollection(_)
                | Error::InvalidPayload(_)
                | Error::MissingRequiredField(_)
                | Error::TypeMismatch { .. }
                | Error::NonPositiveAmount(_)
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::UnknownCollection("budgets".into());
        assert_eq!(err.to_string(), "unknown collection: budgets");

        let err = Error::InvalidTransition {
            op_id: "op-1".into(),
            from: OperationStatus::Failed,
            to: OperationStatus::Syncing,
        };
        assert_eq!(
            err.to_string(),
            "invalid status transition for op-1: failed -> syncing"
        );

        let err = Error::TypeMismatch {
            field: "amount".into(),
            expected: "Amount".into(),
            got: "String".into(),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch for field 'amount': expected Amount, got String"
        );
    }

    #[test]
    fn validation_classification() {
        assert!(Error::NonPositiveAmount("amount".into()).is_validation());
        assert!(Error::MissingRequiredField("description".into()).is_validation());
        assert!(!Error::OperationNotFound("op-1".into()).is_validation());
        assert!(!Error::InvalidRecord("truncated".into()).is_validation());
    }
}
