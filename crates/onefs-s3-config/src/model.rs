//! Typed configuration records and the patches used to write them.
//!
//! # Design
//! - Records are what is persisted; patches are what callers send. A patch
//!   field left as `None` keeps the stored value.
//! - Records deserialize with `#[serde(default)]` so older entries missing a
//!   field still load.

use std::fmt;

use onefs_s3_core::{TTL_INHERIT, TTL_UNLIMITED};
use serde::{Deserialize, Serialize};

/// Plugin-wide configuration: backend connection details and lease policy.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Skip TLS certificate verification when talking to the cluster API.
    pub bypass_cert_check: bool,
    /// Seconds between expiry sweeps; non-positive disables sweeping.
    pub cleanup_period: i64,
    /// Cluster API endpoint, e.g. `https://cluster.example:8080`.
    pub endpoint: String,
    /// Home directory assigned to generated identities.
    pub homedir: String,
    /// Password of the administrative API user.
    pub password: String,
    /// Primary group assigned to generated identities.
    pub primary_group: String,
    /// Default credential lifetime in seconds.
    pub ttl: i64,
    /// Maximum credential lifetime in seconds.
    pub ttl_max: i64,
    /// Administrative API user.
    pub user: String,
    /// Prefix of generated identity names.
    pub username_prefix: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            bypass_cert_check: false,
            cleanup_period: 0,
            endpoint: String::new(),
            homedir: String::new(),
            password: String::new(),
            primary_group: String::new(),
            ttl: TTL_INHERIT,
            ttl_max: TTL_INHERIT,
            user: String::new(),
            username_prefix: String::new(),
        }
    }
}

impl GlobalConfig {
    /// Whether the periodic expiry sweep is enabled.
    #[must_use]
    pub const fn sweep_enabled(&self) -> bool {
        self.cleanup_period > 0
    }

    /// Copy of the record safe to hand back to readers.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            password: String::new(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for GlobalConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GlobalConfig")
            .field("bypass_cert_check", &self.bypass_cert_check)
            .field("cleanup_period", &self.cleanup_period)
            .field("endpoint", &self.endpoint)
            .field("homedir", &self.homedir)
            .field("password", &"<redacted>")
            .field("primary_group", &self.primary_group)
            .field("ttl", &self.ttl)
            .field("ttl_max", &self.ttl_max)
            .field("user", &self.user)
            .field("username_prefix", &self.username_prefix)
            .finish()
    }
}

/// Partial update of [`GlobalConfig`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfigPatch {
    /// See [`GlobalConfig::bypass_cert_check`].
    pub bypass_cert_check: Option<bool>,
    /// See [`GlobalConfig::cleanup_period`].
    pub cleanup_period: Option<i64>,
    /// See [`GlobalConfig::endpoint`].
    pub endpoint: Option<String>,
    /// See [`GlobalConfig::homedir`].
    pub homedir: Option<String>,
    /// See [`GlobalConfig::password`].
    pub password: Option<String>,
    /// See [`GlobalConfig::primary_group`].
    pub primary_group: Option<String>,
    /// See [`GlobalConfig::ttl`].
    pub ttl: Option<i64>,
    /// See [`GlobalConfig::ttl_max`].
    pub ttl_max: Option<i64>,
    /// See [`GlobalConfig::user`].
    pub user: Option<String>,
    /// See [`GlobalConfig::username_prefix`].
    pub username_prefix: Option<String>,
}

impl GlobalConfigPatch {
    /// Overlay the patch onto `base`.
    #[must_use]
    pub fn apply(self, base: GlobalConfig) -> GlobalConfig {
        GlobalConfig {
            bypass_cert_check: self.bypass_cert_check.unwrap_or(base.bypass_cert_check),
            cleanup_period: self.cleanup_period.unwrap_or(base.cleanup_period),
            endpoint: self.endpoint.unwrap_or(base.endpoint),
            homedir: self.homedir.unwrap_or(base.homedir),
            password: self.password.unwrap_or(base.password),
            primary_group: self.primary_group.unwrap_or(base.primary_group),
            ttl: self.ttl.unwrap_or(base.ttl),
            ttl_max: self.ttl_max.unwrap_or(base.ttl_max),
            user: self.user.unwrap_or(base.user),
            username_prefix: self.username_prefix.unwrap_or(base.username_prefix),
        }
    }
}

impl fmt::Debug for GlobalConfigPatch {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GlobalConfigPatch")
            .field("bypass_cert_check", &self.bypass_cert_check)
            .field("cleanup_period", &self.cleanup_period)
            .field("endpoint", &self.endpoint)
            .field("homedir", &self.homedir)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("primary_group", &self.primary_group)
            .field("ttl", &self.ttl)
            .field("ttl_max", &self.ttl_max)
            .field("user", &self.user)
            .field("username_prefix", &self.username_prefix)
            .finish()
    }
}

/// Policy for credentials backed by freshly generated identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicRole {
    /// Bucket the role grants access to.
    pub bucket: String,
    /// Supplemental groups attached to every generated identity.
    pub groups: Vec<String>,
    /// Access zone the identities are created in.
    pub access_zone: String,
    /// Default credential lifetime in seconds; `0` inherits the global value.
    pub ttl: i64,
    /// Maximum credential lifetime in seconds; `0` inherits the global value.
    pub ttl_max: i64,
}

impl Default for DynamicRole {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            groups: Vec::new(),
            access_zone: String::new(),
            ttl: TTL_INHERIT,
            ttl_max: TTL_INHERIT,
        }
    }
}

/// Partial update of [`DynamicRole`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicRolePatch {
    /// See [`DynamicRole::bucket`].
    pub bucket: Option<String>,
    /// See [`DynamicRole::groups`].
    pub groups: Option<Vec<String>>,
    /// See [`DynamicRole::access_zone`].
    pub access_zone: Option<String>,
    /// See [`DynamicRole::ttl`].
    pub ttl: Option<i64>,
    /// See [`DynamicRole::ttl_max`].
    pub ttl_max: Option<i64>,
}

impl DynamicRolePatch {
    /// Overlay the patch onto `base`.
    #[must_use]
    pub fn apply(self, base: DynamicRole) -> DynamicRole {
        DynamicRole {
            bucket: self.bucket.unwrap_or(base.bucket),
            groups: self.groups.unwrap_or(base.groups),
            access_zone: self.access_zone.unwrap_or(base.access_zone),
            ttl: self.ttl.unwrap_or(base.ttl),
            ttl_max: self.ttl_max.unwrap_or(base.ttl_max),
        }
    }
}

/// Policy for credentials minted against an existing backend user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredefinedRole {
    /// Access zone the user lives in.
    pub access_zone: String,
    /// Default credential lifetime in seconds; `0` inherits the global value.
    pub ttl: i64,
    /// Maximum credential lifetime in seconds; `0` inherits the global value.
    pub ttl_max: i64,
}

impl Default for PredefinedRole {
    fn default() -> Self {
        Self {
            access_zone: String::new(),
            ttl: TTL_INHERIT,
            ttl_max: TTL_INHERIT,
        }
    }
}

/// Partial update of [`PredefinedRole`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredefinedRolePatch {
    /// See [`PredefinedRole::access_zone`].
    pub access_zone: Option<String>,
    /// See [`PredefinedRole::ttl`].
    pub ttl: Option<i64>,
    /// See [`PredefinedRole::ttl_max`].
    pub ttl_max: Option<i64>,
}

impl PredefinedRolePatch {
    /// Overlay the patch onto `base`.
    #[must_use]
    pub fn apply(self, base: PredefinedRole) -> PredefinedRole {
        PredefinedRole {
            access_zone: self.access_zone.unwrap_or(base.access_zone),
            ttl: self.ttl.unwrap_or(base.ttl),
            ttl_max: self.ttl_max.unwrap_or(base.ttl_max),
        }
    }
}

/// Clamp a negative role TTL to the unlimited sentinel.
#[must_use]
pub const fn clamp_role_ttl(value: i64) -> i64 {
    if value < 0 { TTL_UNLIMITED } else { value }
}
