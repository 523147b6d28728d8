//! # Design
//!
//! - Constant error messages; context travels in fields.
//! - Collaborator failures keep their source so callers can log the chain once.

use std::error::Error as StdError;

use onefs_s3_config::ConfigError;
use onefs_s3_core::NamingError;
use thiserror::Error;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while issuing or reclaiming credentials.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No global configuration has been written yet.
    #[error("plugin is not configured")]
    NotConfigured,
    /// The requested role does not exist.
    #[error("role not found")]
    RoleNotFound {
        /// Role kind looked up (`dynamic` or `predefined`).
        kind: &'static str,
        /// Requested role name.
        role: String,
    },
    /// The resolved lease cannot be represented as an instant.
    #[error("lease out of range")]
    LeaseOutOfRange {
        /// Lease length in minutes.
        minutes: i64,
    },
    /// An identity backend call failed.
    #[error("identity backend operation failed")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Identity addressed by the call.
        identity: String,
        /// Scope addressed by the call.
        scope: String,
        /// Source backend error.
        source: Box<dyn StdError + Send + Sync>,
    },
    /// An owned identity name could not be decoded.
    #[error("identity name codec failed")]
    Codec {
        /// Operation identifier.
        operation: &'static str,
        /// Source codec error.
        source: NamingError,
    },
    /// Configuration storage failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ConfigError,
    },
}

impl EngineError {
    /// Operation the error is attributed to, used as a metrics label.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::NotConfigured => "load_global",
            Self::RoleNotFound { .. } => "load_role",
            Self::LeaseOutOfRange { .. } => "resolve_lease",
            Self::Backend { operation, .. }
            | Self::Codec { operation, .. }
            | Self::Config { operation, .. } => *operation,
        }
    }

    /// Backend operation, identity and scope of a failed backend call.
    #[must_use]
    pub const fn backend_context(&self) -> Option<(&'static str, &str, &str)> {
        match self {
            Self::Backend {
                operation,
                identity,
                scope,
                ..
            } => Some((*operation, identity.as_str(), scope.as_str())),
            _ => None,
        }
    }

    pub(crate) fn backend(
        operation: &'static str,
        identity: &str,
        scope: &str,
    ) -> impl FnOnce(anyhow::Error) -> Self {
        let identity = identity.to_string();
        let scope = scope.to_string();
        move |err| Self::Backend {
            operation,
            identity,
            scope,
            source: err.into(),
        }
    }

    pub(crate) fn config(operation: &'static str) -> impl FnOnce(ConfigError) -> Self {
        move |source| Self::Config { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_keep_operation_and_source() {
        let err = EngineError::backend("create_identity", "vault_a", "System")(anyhow::anyhow!(
            "conflict"
        ));
        assert_eq!(err.to_string(), "identity backend operation failed");
        assert_eq!(err.operation(), "create_identity");
        assert!(err.source().is_some());
        assert_eq!(
            err.backend_context(),
            Some(("create_identity", "vault_a", "System"))
        );
        let EngineError::Backend {
            identity, scope, ..
        } = err
        else {
            panic!("expected backend error");
        };
        assert_eq!(identity, "vault_a");
        assert_eq!(scope, "System");
    }

    #[test]
    fn not_configured_is_distinct_from_missing_role() {
        let missing_config = EngineError::NotConfigured;
        let missing_role = EngineError::RoleNotFound {
            kind: "dynamic",
            role: "reader".to_string(),
        };
        assert_ne!(missing_config.to_string(), missing_role.to_string());
        assert_ne!(missing_config.operation(), missing_role.operation());
        assert_eq!(missing_role.backend_context(), None);
    }
}
