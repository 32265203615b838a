//! Error types for Beacon
//!
//! TigerStyle: Explicit error types with context, using thiserror.

use thiserror::Error;

/// Result type alias for Beacon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Beacon error types
///
/// These are the errors produced at the storage boundary. Backend-native
/// errors are folded into one of these variants before leaving an adapter.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid node: {node}, reason: {reason}")]
    InvalidNode { node: String, reason: String },

    #[error("Invalid registry key: {key}, reason: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Record too large: {size} bytes exceeds limit of {limit} bytes")]
    RecordTooLarge { size: usize, limit: usize },

    #[error("Slot table full: {count} slots, limit {limit}")]
    SlotTableFull { count: usize, limit: usize },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage read failed: {key}, reason: {reason}")]
    StorageReadFailed { key: String, reason: String },

    #[error("Storage write failed: {key}, reason: {reason}")]
    StorageWriteFailed { key: String, reason: String },

    #[error("Storage operation unsupported: {operation} on {backend}")]
    StorageUnsupported {
        operation: String,
        backend: String,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Deserialization failed: {reason}")]
    DeserializationFailed { reason: String },
}

impl Error {
    /// Create a storage read failed error
    pub fn storage_read_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StorageReadFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage write failed error
    pub fn storage_write_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StorageWriteFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported storage operation error
    pub fn unsupported(operation: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::StorageUnsupported {
            operation: operation.into(),
            backend: backend.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Check if this error is retriable
    ///
    /// Transient backend failures are; malformed data and bad input are not.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::StorageReadFailed { .. } | Self::StorageWriteFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::storage_read_failed("client_nodes", "timeout");
        let message = err.to_string();
        assert!(message.contains("client_nodes"));
        assert!(message.contains("timeout"));
    }

    #[test]
    fn test_error_is_retriable() {
        assert!(Error::storage_write_failed("k", "connection reset").is_retriable());
        assert!(!Error::DeserializationFailed {
            reason: "bad slot".into()
        }
        .is_retriable());
        assert!(!Error::unsupported("delete_entry", "conditional").is_retriable());
    }
}
