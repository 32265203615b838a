//! Registry error types
//!
//! TigerStyle: Explicit error variants with context.
//!
//! This is the caller-facing taxonomy. Store errors are translated here in
//! one place ([`RegistryError::from_store`]); lost CAS races are handled
//! inside the retry loop and never appear.

use beacon_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("store unavailable during {operation} on {key}: {reason}")]
    StoreUnavailable {
        operation: String,
        key: String,
        reason: String,
    },

    #[error("retry budget exhausted for {key} after {attempts} attempts in {elapsed_ms}ms")]
    RetryBudgetExhausted {
        key: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    #[error("registry {key} has no nodes")]
    EmptyRegistry { key: String },

    #[error("no node at slot {slot} of {size}")]
    NodeNotFound { slot: usize, size: usize },

    #[error("{operation} is not supported by the {backend} store")]
    UnsupportedOperation { operation: String, backend: String },

    #[error("registry {key} is full ({limit} slots)")]
    RegistryFull { key: String, limit: usize },

    #[error("invalid node: {node}, reason: {reason}")]
    InvalidNode { node: String, reason: String },

    #[error("invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },
}

impl RegistryError {
    /// Translate an error raised below the registry
    pub fn from_store(operation: &str, key: &str, err: CoreError) -> Self {
        match err {
            CoreError::StorageUnsupported { operation, backend } => {
                Self::UnsupportedOperation { operation, backend }
            }
            CoreError::InvalidNode { node, reason } => Self::InvalidNode { node, reason },
            CoreError::InvalidConfiguration { field, reason } => {
                Self::InvalidConfiguration { field, reason }
            }
            CoreError::SlotTableFull { limit, .. } => Self::RegistryFull {
                key: key.to_string(),
                limit,
            },
            CoreError::InvalidKey { key, reason } => Self::InvalidConfiguration {
                field: "key".into(),
                reason: format!("{}: {}", key, reason),
            },
            other => Self::StoreUnavailable {
                operation: operation.to_string(),
                key: key.to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub fn empty_registry(key: impl Into<String>) -> Self {
        Self::EmptyRegistry { key: key.into() }
    }

    /// Check if retrying the whole logical call may succeed
    ///
    /// After `RetryBudgetExhausted` the store state is uncertain; the call
    /// is safe to repeat because every mutation is idempotent.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::RetryBudgetExhausted { .. }
        )
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::empty_registry("client_nodes");
        assert!(err.to_string().contains("client_nodes"));
    }

    #[test]
    fn test_from_store_keeps_context() {
        let err = RegistryError::from_store(
            "heartbeat",
            "client_nodes",
            CoreError::storage_read_failed("client_nodes", "connection refused"),
        );
        match err {
            RegistryError::StoreUnavailable {
                operation,
                key,
                reason,
            } => {
                assert_eq!(operation, "heartbeat");
                assert_eq!(key, "client_nodes");
                assert!(reason.contains("connection refused"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_from_store_unsupported() {
        let err = RegistryError::from_store(
            "remove",
            "event_nodes",
            CoreError::unsupported("remove", "conditional"),
        );
        assert!(matches!(err, RegistryError::UnsupportedOperation { .. }));
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_error_retriable() {
        let exhausted = RegistryError::RetryBudgetExhausted {
            key: "k".into(),
            attempts: 5,
            elapsed_ms: 12,
        };
        assert!(exhausted.is_retriable());
        assert!(!RegistryError::empty_registry("k").is_retriable());
    }
}
