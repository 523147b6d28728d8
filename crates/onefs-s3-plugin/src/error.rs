//! # Design
//!
//! - Constant error messages; the failing operation travels as a field.
//! - Sources are kept so hosts can log the chain once.

use onefs_s3_config::ConfigError;
use onefs_s3_engine::EngineError;
use thiserror::Error;

/// Result alias for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors surfaced to the hosting process.
///
/// Every message is constant. A host renders a failure from
/// [`PluginError::operation`] followed by the `Display` of each error in the
/// [`std::error::Error::source`] chain. For a failed identity backend call,
/// [`PluginError::backend_context`] returns the backend operation, identity
/// name and access zone, which belong in the host's response next to the
/// message, for example
/// `issue_dynamic: create_identity failed for vault_Ab12Cd_3f2a_20240115103045 in zone-a`.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Configuration or role storage failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ConfigError,
    },
    /// Issuance or sweeping failed.
    #[error("credential engine operation failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Source engine error.
        source: EngineError,
    },
    /// The periodic tick interval cannot drive a timer.
    #[error("invalid tick interval")]
    InvalidTickInterval {
        /// Requested interval in milliseconds.
        millis: u128,
    },
}

impl PluginError {
    /// Operation the error is attributed to.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Config { operation, .. } | Self::Engine { operation, .. } => *operation,
            Self::InvalidTickInterval { .. } => "spawn_periodic",
        }
    }

    /// Backend operation, identity and scope when an identity backend call
    /// failed.
    #[must_use]
    pub const fn backend_context(&self) -> Option<(&'static str, &str, &str)> {
        match self {
            Self::Engine { source, .. } => source.backend_context(),
            Self::Config { .. } | Self::InvalidTickInterval { .. } => None,
        }
    }

    /// Whether the error means the plugin has no global configuration yet.
    #[must_use]
    pub const fn is_not_configured(&self) -> bool {
        matches!(
            self,
            Self::Engine {
                source: EngineError::NotConfigured,
                ..
            }
        )
    }

    /// Whether the error means the requested role does not exist.
    #[must_use]
    pub const fn is_role_not_found(&self) -> bool {
        matches!(
            self,
            Self::Engine {
                source: EngineError::RoleNotFound { .. },
                ..
            }
        )
    }

    pub(crate) fn config(operation: &'static str) -> impl FnOnce(ConfigError) -> Self {
        move |source| Self::Config { operation, source }
    }

    pub(crate) fn engine(operation: &'static str) -> impl FnOnce(EngineError) -> Self {
        move |source| Self::Engine { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn engine_errors_classify_missing_policy() {
        let not_configured = PluginError::engine("issue_dynamic")(EngineError::NotConfigured);
        assert!(not_configured.is_not_configured());
        assert!(!not_configured.is_role_not_found());
        assert!(not_configured.source().is_some());

        let missing_role = PluginError::engine("issue_dynamic")(EngineError::RoleNotFound {
            kind: "dynamic",
            role: "reader".to_string(),
        });
        assert!(missing_role.is_role_not_found());
        assert_eq!(missing_role.to_string(), "credential engine operation failed");
        assert_eq!(missing_role.backend_context(), None);
    }
}
