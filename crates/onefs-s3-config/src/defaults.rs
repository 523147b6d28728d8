//! Storage keys and fallback values for configuration records.
//!
//! # Design
//! - Keep every storage key in one place so readers and writers agree.
//! - Fallbacks are applied at write time, never on read.

/// Storage key of the singleton global configuration record.
pub const CONFIG_KEY: &str = "config/root";
/// Key prefix under which dynamic roles are stored.
pub const DYNAMIC_ROLE_PREFIX: &str = "roles/dynamic/";
/// Key prefix under which predefined roles are stored.
pub const PREDEFINED_ROLE_PREFIX: &str = "roles/predefined/";

/// Seconds between expiry sweeps when none is configured.
pub const DEFAULT_CLEANUP_PERIOD_SECS: i64 = 600;
/// Home directory assigned to generated identities.
pub const DEFAULT_HOMEDIR: &str = "/ifs/home/vault";
/// Primary group assigned to generated identities.
pub const DEFAULT_PRIMARY_GROUP: &str = "vault";
/// Prefix for generated identity names.
pub const DEFAULT_USERNAME_PREFIX: &str = "vault";
/// Global credential lifetime in seconds when none is configured.
pub const DEFAULT_TTL_SECS: i64 = 300;
/// Access zone used by roles that do not name one.
pub const DEFAULT_ACCESS_ZONE: &str = "System";
