//! Credential issuance.
//!
//! # Design
//! - The lease is resolved once per request and drives both the generated
//!   name and the backend key expiry, so the sweep and the key agree.
//! - No rollback: an identity left behind by a failed request still carries
//!   its expiry in its name and is reclaimed by a later sweep.

use std::sync::Arc;

use onefs_s3_config::{ConfigService, GlobalConfig};
use onefs_s3_core::{
    Clock, IdentityBackend, IdentityName, IssuedCredential, LeaseTerm, NameStamp, NewIdentity,
    resolve_effective_ttl,
};
use onefs_s3_telemetry::Metrics;
use tracing::{debug, info, instrument, warn};

use crate::error::{EngineError, EngineResult};

/// Kind of role a credential was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// Backed by a freshly generated identity.
    Dynamic,
    /// Minted for an existing backend user.
    Predefined,
}

impl CredentialKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dynamic => "dynamic",
            Self::Predefined => "predefined",
        }
    }
}

/// Issues credentials against the identity backend.
#[derive(Debug, Clone)]
pub struct CredentialMinter {
    config: ConfigService,
    backend: Arc<dyn IdentityBackend>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl CredentialMinter {
    /// Wire the minter to its collaborators.
    #[must_use]
    pub const fn new(
        config: ConfigService,
        backend: Arc<dyn IdentityBackend>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        Self {
            config,
            backend,
            clock,
            metrics,
        }
    }

    /// Issue a credential for a dynamic role.
    ///
    /// Creates a generated identity in the role's access zone, attaches the
    /// role's groups, and mints its key pair.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotConfigured`] or [`EngineError::RoleNotFound`]
    /// when policy is missing, and [`EngineError::Backend`] naming the failed
    /// step when the backend rejects a call.
    #[instrument(name = "minter.issue_dynamic", skip(self))]
    pub async fn issue_dynamic(
        &self,
        role: &str,
        requested_ttl: i64,
        request_id: &str,
    ) -> EngineResult<IssuedCredential> {
        let result = self
            .issue_dynamic_inner(role, requested_ttl, request_id)
            .await;
        self.record(CredentialKind::Dynamic, &result);
        result
    }

    /// Issue a credential for a predefined role, minting keys for the
    /// existing user of the same name.
    ///
    /// # Errors
    ///
    /// Same as [`Self::issue_dynamic`], minus identity creation.
    #[instrument(name = "minter.issue_predefined", skip(self))]
    pub async fn issue_predefined(
        &self,
        name: &str,
        requested_ttl: i64,
    ) -> EngineResult<IssuedCredential> {
        let result = self.issue_predefined_inner(name, requested_ttl).await;
        self.record(CredentialKind::Predefined, &result);
        result
    }

    async fn issue_dynamic_inner(
        &self,
        role_name: &str,
        requested_ttl: i64,
        request_id: &str,
    ) -> EngineResult<IssuedCredential> {
        let global = self.load_global().await?;
        let role = self
            .config
            .load_role(role_name)
            .await
            .map_err(EngineError::config("load_role"))?
            .ok_or_else(|| EngineError::RoleNotFound {
                kind: CredentialKind::Dynamic.as_str(),
                role: role_name.to_string(),
            })?;

        let lease = resolve_lease(requested_ttl, role.ttl, role.ttl_max, &global);
        let stamp = self.name_stamp(lease)?;
        let username = IdentityName::generate(&global.username_prefix, request_id, stamp).to_string();
        let scope = role.access_zone.as_str();
        debug!(
            identity = %username,
            scope,
            lease_minutes = lease.minutes(),
            "generated identity name"
        );

        let identity = NewIdentity {
            name: username.clone(),
            home_directory: global.homedir.clone(),
            primary_group: global.primary_group.clone(),
            scope: scope.to_string(),
        };
        self.backend
            .create_identity(&identity)
            .await
            .map_err(EngineError::backend("create_identity", &username, scope))?;
        self.backend
            .set_supplemental_groups(&username, &role.groups, scope)
            .await
            .map_err(EngineError::backend("set_supplemental_groups", &username, scope))?;

        let credential = self.mint_credential(&username, scope, lease).await?;
        info!(
            identity = %username,
            scope,
            role = role_name,
            key_expiry = credential.key_expiry,
            "dynamic credential issued"
        );
        Ok(credential)
    }

    async fn issue_predefined_inner(
        &self,
        name: &str,
        requested_ttl: i64,
    ) -> EngineResult<IssuedCredential> {
        let global = self.load_global().await?;
        let role = self
            .config
            .load_predefined(name)
            .await
            .map_err(EngineError::config("load_predefined"))?
            .ok_or_else(|| EngineError::RoleNotFound {
                kind: CredentialKind::Predefined.as_str(),
                role: name.to_string(),
            })?;

        let lease = resolve_lease(requested_ttl, role.ttl, role.ttl_max, &global);
        let credential = self
            .mint_credential(name, &role.access_zone, lease)
            .await?;
        info!(
            identity = name,
            scope = %role.access_zone,
            key_expiry = credential.key_expiry,
            "predefined credential issued"
        );
        Ok(credential)
    }

    async fn load_global(&self) -> EngineResult<GlobalConfig> {
        self.config
            .load_global()
            .await
            .map_err(EngineError::config("load_global"))?
            .ok_or(EngineError::NotConfigured)
    }

    fn name_stamp(&self, lease: LeaseTerm) -> EngineResult<NameStamp> {
        let now = self.clock.now();
        match lease {
            LeaseTerm::Unlimited => Ok(NameStamp::unlimited_since(now)),
            LeaseTerm::Minutes(minutes) => lease
                .duration()
                .and_then(|duration| now.checked_add_signed(duration))
                .map(NameStamp::expires_at)
                .ok_or(EngineError::LeaseOutOfRange { minutes }),
        }
    }

    /// Mint the returned key pair and, for finite leases, a superseding pair
    /// whose creation bounds the returned pair's lifetime.
    async fn mint_credential(
        &self,
        username: &str,
        scope: &str,
        lease: LeaseTerm,
    ) -> EngineResult<IssuedCredential> {
        let issued = self
            .backend
            .mint_key_pair(username, scope, 0)
            .await
            .map_err(EngineError::backend("mint_key_pair", username, scope))?;

        let mut key_expiry = 0;
        if let LeaseTerm::Minutes(minutes) = lease {
            let superseding = self
                .backend
                .mint_key_pair(username, scope, minutes)
                .await
                .map_err(EngineError::backend("mint_superseding_key_pair", username, scope))?;
            key_expiry = superseding.prior_key_expiry;
        }

        Ok(IssuedCredential {
            username: username.to_string(),
            access_key: issued.access_id,
            secret_key: issued.secret_key,
            key_expiry,
        })
    }

    fn record(&self, kind: CredentialKind, result: &EngineResult<IssuedCredential>) {
        match result {
            Ok(_) => self.metrics.inc_credential_issued(kind.as_str()),
            Err(err) => {
                self.metrics.inc_credential_failure(err.operation());
                warn!(
                    kind = kind.as_str(),
                    operation = err.operation(),
                    error = %err,
                    "credential issuance failed"
                );
            }
        }
    }
}

/// Resolve the effective lease for a request against role and global policy.
#[must_use]
pub fn resolve_lease(
    requested_ttl: i64,
    role_ttl: i64,
    role_ttl_max: i64,
    global: &GlobalConfig,
) -> LeaseTerm {
    LeaseTerm::from_seconds(resolve_effective_ttl(
        requested_ttl,
        role_ttl,
        role_ttl_max,
        global.ttl,
        global.ttl_max,
    ))
}
