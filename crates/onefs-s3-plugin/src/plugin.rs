//! Host facade.
//!
//! # Design
//! - Issuance runs concurrently; the sweeper sits behind one async mutex so
//!   ticks and re-arms are serialised.
//! - A successful global configuration write re-arms the sweeper so the next
//!   sweep is one period after the write.

use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

use onefs_s3_config::{
    ConfigService, DynamicRole, DynamicRolePatch, GlobalConfig, GlobalConfigPatch, KvStore,
    PredefinedRole, PredefinedRolePatch,
};
use onefs_s3_core::{Clock, IdentityBackend, IssuedCredential};
use onefs_s3_engine::{CredentialMinter, ExpirySweeper, SweepReport, TickOutcome};
use onefs_s3_telemetry::Metrics;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{PluginError, PluginResult};

/// Credential plugin as seen by the hosting process.
#[derive(Debug)]
pub struct CredentialPlugin {
    config: ConfigService,
    minter: CredentialMinter,
    sweeper: Mutex<ExpirySweeper>,
    metrics: Metrics,
}

impl CredentialPlugin {
    /// Wire the plugin to its storage, identity backend, and clock.
    #[must_use]
    pub fn new(
        store: Arc<dyn KvStore>,
        backend: Arc<dyn IdentityBackend>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        let config = ConfigService::new(store);
        let minter = CredentialMinter::new(
            config.clone(),
            Arc::clone(&backend),
            Arc::clone(&clock),
            metrics.clone(),
        );
        let sweeper = ExpirySweeper::new(config.clone(), backend, clock, metrics.clone());
        Self {
            config,
            minter,
            sweeper: Mutex::new(sweeper),
            metrics,
        }
    }

    /// Metrics shared by every component of the plugin.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Check whether the plugin has been configured and log guidance if not.
    ///
    /// # Errors
    ///
    /// Returns an error if stored configuration cannot be read.
    pub async fn initialize(&self) -> PluginResult<()> {
        match self
            .config
            .load_global()
            .await
            .map_err(PluginError::config("initialize"))?
        {
            Some(config) => info!(
                endpoint = %config.endpoint,
                cleanup_period = config.cleanup_period,
                "credential plugin initialised"
            ),
            None => info!(
                "credential plugin is not configured; write the global configuration before issuing credentials"
            ),
        }
        Ok(())
    }

    /// Create or update the global configuration, then re-arm the sweeper.
    ///
    /// Returns the stored record with the password removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged configuration is invalid or cannot be
    /// stored; the sweeper is left untouched in that case.
    #[instrument(name = "plugin.write_config", skip(self, patch))]
    pub async fn write_config(&self, patch: GlobalConfigPatch) -> PluginResult<GlobalConfig> {
        let stored = self
            .config
            .write_global(patch)
            .await
            .map_err(PluginError::config("write_config"))?;
        self.sweeper.lock().await.rearm();
        Ok(stored.redacted())
    }

    /// Read the global configuration with the password removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub async fn read_config(&self) -> PluginResult<Option<GlobalConfig>> {
        Ok(self
            .config
            .load_global()
            .await
            .map_err(PluginError::config("read_config"))?
            .map(|config| config.redacted()))
    }

    /// Create or update a dynamic role.
    ///
    /// # Errors
    ///
    /// Returns every validation failure for the merged role, or a storage error.
    pub async fn write_role(
        &self,
        name: &str,
        patch: DynamicRolePatch,
    ) -> PluginResult<DynamicRole> {
        self.config
            .write_role(name, patch)
            .await
            .map_err(PluginError::config("write_role"))
    }

    /// Read a dynamic role.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names or storage failures.
    pub async fn read_role(&self, name: &str) -> PluginResult<Option<DynamicRole>> {
        self.config
            .load_role(name)
            .await
            .map_err(PluginError::config("read_role"))
    }

    /// Delete a dynamic role.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names or storage failures.
    pub async fn delete_role(&self, name: &str) -> PluginResult<()> {
        self.config
            .delete_role(name)
            .await
            .map_err(PluginError::config("delete_role"))
    }

    /// Names of every dynamic role.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failures.
    pub async fn list_roles(&self) -> PluginResult<Vec<String>> {
        self.config
            .list_roles()
            .await
            .map_err(PluginError::config("list_roles"))
    }

    /// Create or update a predefined role.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names or storage failures.
    pub async fn write_predefined(
        &self,
        name: &str,
        patch: PredefinedRolePatch,
    ) -> PluginResult<PredefinedRole> {
        self.config
            .write_predefined(name, patch)
            .await
            .map_err(PluginError::config("write_predefined"))
    }

    /// Read a predefined role.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names or storage failures.
    pub async fn read_predefined(&self, name: &str) -> PluginResult<Option<PredefinedRole>> {
        self.config
            .load_predefined(name)
            .await
            .map_err(PluginError::config("read_predefined"))
    }

    /// Delete a predefined role.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names or storage failures.
    pub async fn delete_predefined(&self, name: &str) -> PluginResult<()> {
        self.config
            .delete_predefined(name)
            .await
            .map_err(PluginError::config("delete_predefined"))
    }

    /// Names of every predefined role.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failures.
    pub async fn list_predefined(&self) -> PluginResult<Vec<String>> {
        self.config
            .list_predefined()
            .await
            .map_err(PluginError::config("list_predefined"))
    }

    /// Issue a credential for a dynamic role. A request id is generated when
    /// the host does not supply one.
    ///
    /// # Errors
    ///
    /// See [`CredentialMinter::issue_dynamic`].
    pub async fn issue_dynamic(
        &self,
        role: &str,
        requested_ttl: i64,
        request_id: Option<&str>,
    ) -> PluginResult<IssuedCredential> {
        let request_id = request_id.map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
        self.minter
            .issue_dynamic(role, requested_ttl, &request_id)
            .await
            .map_err(PluginError::engine("issue_dynamic"))
    }

    /// Issue a credential for a predefined role.
    ///
    /// # Errors
    ///
    /// See [`CredentialMinter::issue_predefined`].
    pub async fn issue_predefined(
        &self,
        name: &str,
        requested_ttl: i64,
    ) -> PluginResult<IssuedCredential> {
        self.minter
            .issue_predefined(name, requested_ttl)
            .await
            .map_err(PluginError::engine("issue_predefined"))
    }

    /// Handle one periodic tick from the host.
    ///
    /// # Errors
    ///
    /// Returns an error when configuration cannot be read or a due sweep is
    /// aborted.
    pub async fn periodic(&self) -> PluginResult<TickOutcome> {
        self.sweeper
            .lock()
            .await
            .tick()
            .await
            .map_err(PluginError::engine("periodic"))
    }

    /// Run a sweep immediately, outside the schedule.
    ///
    /// # Errors
    ///
    /// Returns an error when the plugin is not configured or the sweep aborts.
    pub async fn sweep_now(&self) -> PluginResult<SweepReport> {
        self.sweeper
            .lock()
            .await
            .sweep_now()
            .await
            .map_err(PluginError::engine("sweep_now"))
    }
}

/// Drive [`CredentialPlugin::periodic`] from a timer until the task is aborted.
///
/// Missed ticks are delayed rather than replayed in a burst. Tick errors are
/// logged and the loop keeps going.
///
/// # Errors
///
/// Returns [`PluginError::InvalidTickInterval`] for a zero interval.
pub fn spawn_periodic(
    plugin: Arc<CredentialPlugin>,
    every: Duration,
) -> PluginResult<JoinHandle<()>> {
    if every.is_zero() {
        return Err(PluginError::InvalidTickInterval {
            millis: every.as_millis(),
        });
    }
    Ok(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match plugin.periodic().await {
                Ok(TickOutcome::Swept(report)) => debug!(
                    reclaimed = report.reclaimed.len(),
                    failures = report.failures.len(),
                    "periodic sweep completed"
                ),
                Ok(_) => {}
                Err(err) => {
                    let (backend_operation, identity, scope) =
                        err.backend_context().unwrap_or_default();
                    warn!(
                        operation = err.operation(),
                        backend_operation,
                        identity,
                        scope,
                        error = %err,
                        source = ?err.source(),
                        "periodic tick failed"
                    );
                }
            }
        }
    }))
}
