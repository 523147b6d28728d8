//! Normalisation and validation applied before a record is persisted.

use onefs_s3_core::TTL_UNLIMITED;

use crate::defaults::{
    DEFAULT_ACCESS_ZONE, DEFAULT_CLEANUP_PERIOD_SECS, DEFAULT_HOMEDIR, DEFAULT_PRIMARY_GROUP,
    DEFAULT_TTL_SECS, DEFAULT_USERNAME_PREFIX,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{DynamicRole, GlobalConfig, PredefinedRole, clamp_role_ttl};

const GLOBAL_RECORD: &str = "global_config";
pub(crate) const DYNAMIC_ROLE_RECORD: &str = "dynamic_role";
pub(crate) const PREDEFINED_ROLE_RECORD: &str = "predefined_role";

/// Fill defaults into a merged global record and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the username prefix contains
/// characters that cannot appear in a generated identity name.
pub fn normalize_global(mut config: GlobalConfig) -> ConfigResult<GlobalConfig> {
    if config.cleanup_period == 0 {
        config.cleanup_period = DEFAULT_CLEANUP_PERIOD_SECS;
    }
    if config.homedir.is_empty() {
        config.homedir = DEFAULT_HOMEDIR.to_string();
    }
    if config.primary_group.is_empty() {
        config.primary_group = DEFAULT_PRIMARY_GROUP.to_string();
    }
    if config.username_prefix.is_empty() {
        config.username_prefix = DEFAULT_USERNAME_PREFIX.to_string();
    }
    if config.ttl_max < 1 {
        config.ttl_max = TTL_UNLIMITED;
    }
    if config.ttl < 0 {
        config.ttl = TTL_UNLIMITED;
    } else if config.ttl == 0 {
        config.ttl = DEFAULT_TTL_SECS;
    }
    validate_username_prefix(&config.username_prefix)?;
    Ok(config)
}

/// Ensure a username prefix is safe to embed in a `_`-delimited name.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for empty prefixes or prefixes with
/// characters other than ASCII alphanumerics and `-`.
pub fn validate_username_prefix(prefix: &str) -> ConfigResult<()> {
    if prefix.is_empty() {
        return Err(ConfigError::InvalidField {
            record: GLOBAL_RECORD,
            field: "username_prefix",
            value: None,
            reason: "must not be empty",
        });
    }
    if !prefix
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
    {
        return Err(ConfigError::InvalidField {
            record: GLOBAL_RECORD,
            field: "username_prefix",
            value: Some(prefix.to_string()),
            reason: "must contain only ASCII letters, digits, or '-'",
        });
    }
    Ok(())
}

/// Check a dynamic role name: word characters, with `.` and `-` allowed
/// between the first and last character.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidName`] when the name does not qualify.
pub fn validate_dynamic_role_name(name: &str) -> ConfigResult<()> {
    if is_record_name(name, &['.', '-']) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            record: DYNAMIC_ROLE_RECORD,
            name: name.to_string(),
        })
    }
}

/// Check a predefined role name. Same rules as dynamic roles, plus `@` so
/// that principal-style usernames are accepted.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidName`] when the name does not qualify.
pub fn validate_predefined_role_name(name: &str) -> ConfigResult<()> {
    if is_record_name(name, &['.', '-', '@']) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            record: PREDEFINED_ROLE_RECORD,
            name: name.to_string(),
        })
    }
}

/// Normalise and validate a merged dynamic role.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] listing every failed check.
pub fn normalize_dynamic_role(name: &str, mut role: DynamicRole) -> ConfigResult<DynamicRole> {
    let mut errors = Vec::new();
    if role.access_zone.is_empty() {
        role.access_zone = DEFAULT_ACCESS_ZONE.to_string();
    }
    if role.bucket.is_empty() {
        errors.push("a bucket name is required for a role".to_string());
    }
    role.groups.retain(|group| !group.trim().is_empty());
    if role.groups.is_empty() {
        errors.push("at least one group is required for a role".to_string());
    }
    role.ttl = clamp_role_ttl(role.ttl);
    role.ttl_max = clamp_role_ttl(role.ttl_max);

    if errors.is_empty() {
        Ok(role)
    } else {
        Err(ConfigError::Validation {
            record: DYNAMIC_ROLE_RECORD,
            name: name.to_string(),
            errors,
        })
    }
}

/// Normalise a merged predefined role.
#[must_use]
pub fn normalize_predefined_role(mut role: PredefinedRole) -> PredefinedRole {
    if role.access_zone.is_empty() {
        role.access_zone = DEFAULT_ACCESS_ZONE.to_string();
    }
    role.ttl = clamp_role_ttl(role.ttl);
    role.ttl_max = clamp_role_ttl(role.ttl_max);
    role
}

fn is_word(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn is_record_name(name: &str, inner: &[char]) -> bool {
    let mut chars = name.chars();
    let (Some(first), last) = (chars.next(), chars.next_back()) else {
        return false;
    };
    is_word(first)
        && last.is_none_or(is_word)
        && chars.all(|ch| is_word(ch) || inner.contains(&ch))
}
