//! DTOs exchanged with the identity backend and returned to credential callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity as reported by the backend when listing a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Backend username; the primary key within its scope.
    pub name: String,
}

impl Identity {
    /// Convenience constructor used by adapters and tests.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Parameters for creating a backing identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIdentity {
    /// Generated username.
    pub name: String,
    /// Home directory assigned to the identity.
    pub home_directory: String,
    /// Primary group the identity belongs to.
    pub primary_group: String,
    /// Scope (access zone) the identity lives in.
    pub scope: String,
}

/// Access-key pair minted by the backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    /// Access key identifier.
    pub access_id: String,
    /// Secret key material.
    pub secret_key: String,
    /// Epoch seconds at which the superseded key expires; `0` when none.
    #[serde(default)]
    pub prior_key_expiry: i64,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("KeyPair")
            .field("access_id", &self.access_id)
            .field("secret_key", &"<redacted>")
            .field("prior_key_expiry", &self.prior_key_expiry)
            .finish()
    }
}

/// Credential returned to the caller of an issuance request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCredential {
    /// Username the keys belong to.
    pub username: String,
    /// Access key identifier.
    pub access_key: String,
    /// Secret key material.
    pub secret_key: String,
    /// Expiry in epoch seconds; `0` means the key never expires.
    pub key_expiry: i64,
}

impl IssuedCredential {
    /// Whether the backend attached an expiry to the issued key.
    #[must_use]
    pub const fn expires(&self) -> bool {
        self.key_expiry != 0
    }
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("IssuedCredential")
            .field("username", &self.username)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("key_expiry", &self.key_expiry)
            .finish()
    }
}
