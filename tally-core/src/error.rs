//! Error types for tally operations

use crate::command::Operation;
use thiserror::Error;

/// Entity store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Insert failed: {reason}")]
    InsertFailed { reason: String },

    #[error("Save failed for transaction {id}: {reason}")]
    SaveFailed { id: String, reason: String },

    #[error("Delete failed for transaction {id}: {reason}")]
    DeleteFailed { id: String, reason: String },

    #[error("Store transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Message broker errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Publish to {queue} failed: {reason}")]
    PublishFailed { queue: String, reason: String },

    #[error("Queue {queue} is closed")]
    Closed { queue: String },
}

/// Cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache serialization failed for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Cache backend error: {reason}")]
    Backend { reason: String },
}

/// Command decode and validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command payload could not be decoded: {reason}")]
    Decode { reason: String },

    #[error("Command could not be encoded: {reason}")]
    Encode { reason: String },

    #[error("{operation} command is missing required field '{field}'")]
    MissingField {
        operation: Operation,
        field: &'static str,
    },

    #[error("Unknown operation: {operation}")]
    UnknownOperation { operation: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all tally errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TallyError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for tally operations.
pub type TallyResult<T> = Result<T, TallyError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display() {
        let err = CommandError::MissingField {
            operation: Operation::Update,
            field: "id",
        };
        let msg = format!("{}", err);
        assert!(msg.contains("UPDATE"));
        assert!(msg.contains("'id'"));
    }

    #[test]
    fn test_broker_error_display_closed() {
        let err = BrokerError::Closed {
            queue: "transaction.queue".to_string(),
        };
        assert!(format!("{}", err).contains("transaction.queue"));
    }

    #[test]
    fn test_tally_error_from_store_error() {
        let err: TallyError = StoreError::Unavailable {
            reason: "down".to_string(),
        }
        .into();
        assert!(matches!(err, TallyError::Store(StoreError::Unavailable { .. })));
        assert!(format!("{}", err).starts_with("Store error"));
    }

    #[test]
    fn test_unknown_operation_display() {
        let err = CommandError::UnknownOperation {
            operation: "ARCHIVE".to_string(),
        };
        assert_eq!(format!("{}", err), "Unknown operation: ARCHIVE");
    }
}
