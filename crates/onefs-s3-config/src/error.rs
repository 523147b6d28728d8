//! Error types for configuration operations.

use std::error::Error as StdError;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The key-value store rejected or failed an operation.
    #[error("configuration storage operation failed")]
    Storage {
        /// Operation identifier.
        operation: &'static str,
        /// Storage key involved.
        key: String,
        /// Underlying storage error.
        source: Box<dyn StdError + Send + Sync>,
    },
    /// A record could not be encoded or decoded.
    #[error("configuration record serialization failed")]
    Serialization {
        /// Operation identifier.
        operation: &'static str,
        /// Storage key involved.
        key: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Record that failed validation.
        record: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Record name did not satisfy the naming rules.
    #[error("invalid record name")]
    InvalidName {
        /// Record kind being addressed.
        record: &'static str,
        /// Offending name.
        name: String,
    },
    /// One or more fields of a role failed validation; nothing was persisted.
    #[error("role validation failed")]
    Validation {
        /// Record kind being written.
        record: &'static str,
        /// Role name.
        name: String,
        /// Every validation failure found.
        errors: Vec<String>,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
