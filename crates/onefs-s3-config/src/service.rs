//! Configuration facade over the host's key-value store.
//!
//! All records are JSON documents. Writes load the stored record, overlay the
//! caller's patch, normalise, validate, and only then persist.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::defaults::{CONFIG_KEY, DYNAMIC_ROLE_PREFIX, PREDEFINED_ROLE_PREFIX};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    DynamicRole, DynamicRolePatch, GlobalConfig, GlobalConfigPatch, PredefinedRole,
    PredefinedRolePatch,
};
use crate::store::KvStore;
use crate::validate::{
    normalize_dynamic_role, normalize_global, normalize_predefined_role,
    validate_dynamic_role_name, validate_predefined_role_name,
};

/// Typed access to global configuration and role records.
#[derive(Clone)]
pub struct ConfigService {
    store: Arc<dyn KvStore>,
}

impl fmt::Debug for ConfigService {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("ConfigService").finish_non_exhaustive()
    }
}

impl ConfigService {
    /// Wrap a host-supplied store.
    #[must_use]
    pub const fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Load the global configuration, `None` when the plugin is unconfigured.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record cannot be decoded.
    pub async fn load_global(&self) -> ConfigResult<Option<GlobalConfig>> {
        self.get_json("config.load_global", CONFIG_KEY).await
    }

    /// Create or update the global configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged record is invalid or cannot be stored.
    #[instrument(name = "config.write_global", skip(self, patch))]
    pub async fn write_global(&self, patch: GlobalConfigPatch) -> ConfigResult<GlobalConfig> {
        let current = self.load_global().await?.unwrap_or_default();
        let config = normalize_global(patch.apply(current))?;
        self.put_json("config.write_global", CONFIG_KEY, &config)
            .await?;
        info!(
            endpoint = %config.endpoint,
            username_prefix = %config.username_prefix,
            cleanup_period = config.cleanup_period,
            ttl = config.ttl,
            ttl_max = config.ttl_max,
            "global configuration stored"
        );
        Ok(config)
    }

    /// Load a dynamic role.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, the store fails, or the record
    /// cannot be decoded.
    pub async fn load_role(&self, name: &str) -> ConfigResult<Option<DynamicRole>> {
        validate_dynamic_role_name(name)?;
        self.get_json("config.load_role", &dynamic_key(name)).await
    }

    /// Create or update a dynamic role.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] with every failed check when the
    /// merged role is invalid; nothing is persisted in that case.
    #[instrument(name = "config.write_role", skip(self, patch))]
    pub async fn write_role(
        &self,
        name: &str,
        patch: DynamicRolePatch,
    ) -> ConfigResult<DynamicRole> {
        let current = self.load_role(name).await?.unwrap_or_default();
        let role = normalize_dynamic_role(name, patch.apply(current))?;
        self.put_json("config.write_role", &dynamic_key(name), &role)
            .await?;
        info!(
            role = name,
            bucket = %role.bucket,
            access_zone = %role.access_zone,
            ttl = role.ttl,
            ttl_max = role.ttl_max,
            "dynamic role stored"
        );
        Ok(role)
    }

    /// Delete a dynamic role. Deleting an absent role succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the store fails.
    pub async fn delete_role(&self, name: &str) -> ConfigResult<()> {
        validate_dynamic_role_name(name)?;
        self.delete_key("config.delete_role", &dynamic_key(name))
            .await?;
        info!(role = name, "dynamic role deleted");
        Ok(())
    }

    /// Names of every stored dynamic role, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list_roles(&self) -> ConfigResult<Vec<String>> {
        self.list_keys("config.list_roles", DYNAMIC_ROLE_PREFIX)
            .await
    }

    /// Load a predefined role.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, the store fails, or the record
    /// cannot be decoded.
    pub async fn load_predefined(&self, name: &str) -> ConfigResult<Option<PredefinedRole>> {
        validate_predefined_role_name(name)?;
        self.get_json("config.load_predefined", &predefined_key(name))
            .await
    }

    /// Create or update a predefined role.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the record cannot be stored.
    #[instrument(name = "config.write_predefined", skip(self, patch))]
    pub async fn write_predefined(
        &self,
        name: &str,
        patch: PredefinedRolePatch,
    ) -> ConfigResult<PredefinedRole> {
        let current = self.load_predefined(name).await?.unwrap_or_default();
        let role = normalize_predefined_role(patch.apply(current));
        self.put_json("config.write_predefined", &predefined_key(name), &role)
            .await?;
        info!(
            role = name,
            access_zone = %role.access_zone,
            ttl = role.ttl,
            ttl_max = role.ttl_max,
            "predefined role stored"
        );
        Ok(role)
    }

    /// Delete a predefined role. Deleting an absent role succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the store fails.
    pub async fn delete_predefined(&self, name: &str) -> ConfigResult<()> {
        validate_predefined_role_name(name)?;
        self.delete_key("config.delete_predefined", &predefined_key(name))
            .await?;
        info!(role = name, "predefined role deleted");
        Ok(())
    }

    /// Names of every stored predefined role, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list_predefined(&self) -> ConfigResult<Vec<String>> {
        self.list_keys("config.list_predefined", PREDEFINED_ROLE_PREFIX)
            .await
    }

    /// Distinct access zones referenced by dynamic roles.
    ///
    /// Recomputed from storage on every call. Predefined roles never
    /// contribute.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or decoding any role fails.
    pub async fn active_scopes(&self) -> ConfigResult<BTreeSet<String>> {
        let mut scopes = BTreeSet::new();
        for name in self.list_roles().await? {
            let key = dynamic_key(&name);
            if let Some(role) = self
                .get_json::<DynamicRole>("config.active_scopes", &key)
                .await?
            {
                scopes.insert(role.access_zone);
            }
        }
        debug!(scopes = scopes.len(), "active scopes resolved");
        Ok(scopes)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        key: &str,
    ) -> ConfigResult<Option<T>> {
        let raw = self
            .store
            .get(key)
            .await
            .map_err(|err| ConfigError::Storage {
                operation,
                key: key.to_string(),
                source: err.into(),
            })?;
        raw.map(|bytes| {
            serde_json::from_slice(&bytes).map_err(|source| ConfigError::Serialization {
                operation,
                key: key.to_string(),
                source,
            })
        })
        .transpose()
    }

    async fn put_json<T: Serialize + Sync>(
        &self,
        operation: &'static str,
        key: &str,
        value: &T,
    ) -> ConfigResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|source| ConfigError::Serialization {
            operation,
            key: key.to_string(),
            source,
        })?;
        self.store
            .put(key, bytes)
            .await
            .map_err(|err| ConfigError::Storage {
                operation,
                key: key.to_string(),
                source: err.into(),
            })
    }

    async fn delete_key(&self, operation: &'static str, key: &str) -> ConfigResult<()> {
        self.store
            .delete(key)
            .await
            .map_err(|err| ConfigError::Storage {
                operation,
                key: key.to_string(),
                source: err.into(),
            })
    }

    async fn list_keys(&self, operation: &'static str, prefix: &str) -> ConfigResult<Vec<String>> {
        let mut names = self
            .store
            .list(prefix)
            .await
            .map_err(|err| ConfigError::Storage {
                operation,
                key: prefix.to_string(),
                source: err.into(),
            })?;
        names.sort();
        Ok(names)
    }
}

fn dynamic_key(name: &str) -> String {
    format!("{DYNAMIC_ROLE_PREFIX}{name}")
}

fn predefined_key(name: &str) -> String {
    format!("{PREDEFINED_ROLE_PREFIX}{name}")
}
