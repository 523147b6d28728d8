//! One reclamation pass over the active access zones.
//!
//! # Design
//! - Ownership and expiry come from the identity name alone.
//! - Listing or deleting failures are recorded and the pass moves on; a name
//!   that matches the pattern but does not decode aborts the pass.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use onefs_s3_config::{ConfigService, GlobalConfig};
use onefs_s3_core::{Clock, IdentityBackend, IdentityPattern};
use onefs_s3_telemetry::Metrics;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{EngineError, EngineResult};

/// Identity deleted by a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReclaimedIdentity {
    /// Identity name.
    pub name: String,
    /// Access zone it lived in.
    pub scope: String,
    /// Expiry decoded from the name.
    pub expired_at: DateTime<Utc>,
}

/// Non-fatal failure recorded during a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ReclaimFailure {
    /// A scope could not be listed; its identities were skipped.
    ListIdentities {
        /// Access zone that failed to list.
        scope: String,
        /// Rendered backend error.
        error: String,
    },
    /// An expired identity could not be deleted.
    DeleteIdentity {
        /// Identity name.
        name: String,
        /// Access zone it lives in.
        scope: String,
        /// Rendered backend error.
        error: String,
    },
}

/// Outcome of a completed sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Access zones visited, including ones that failed to list.
    pub scopes_scanned: usize,
    /// Identities listed across all zones.
    pub identities_seen: usize,
    /// Identities deleted.
    pub reclaimed: Vec<ReclaimedIdentity>,
    /// Non-fatal failures.
    pub failures: Vec<ReclaimFailure>,
}

/// Collaborators needed to run a sweep.
#[derive(Debug, Clone)]
pub(crate) struct Reclaimer {
    pub(crate) config: ConfigService,
    pub(crate) backend: Arc<dyn IdentityBackend>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) metrics: Metrics,
}

impl Reclaimer {
    /// Run one sweep, comparing expiries against `now`.
    #[instrument(name = "sweep.run", skip(self, config), fields(prefix = %config.username_prefix))]
    pub(crate) async fn run(
        &self,
        config: &GlobalConfig,
        now: DateTime<Utc>,
    ) -> EngineResult<SweepReport> {
        let started = Instant::now();
        self.metrics.inc_sweep();
        let result = self.scan(config, now).await;
        self.metrics.observe_sweep_duration(started.elapsed());
        match &result {
            Ok(report) => {
                self.metrics.set_last_sweep_scopes(report.scopes_scanned);
                info!(
                    scopes = report.scopes_scanned,
                    identities = report.identities_seen,
                    reclaimed = report.reclaimed.len(),
                    failures = report.failures.len(),
                    "expiry sweep finished"
                );
            }
            Err(err) => {
                self.metrics.inc_sweep_abort();
                error!(error = %err, operation = err.operation(), "expiry sweep aborted");
            }
        }
        result
    }

    async fn scan(&self, config: &GlobalConfig, now: DateTime<Utc>) -> EngineResult<SweepReport> {
        let pattern = IdentityPattern::for_prefix(&config.username_prefix).map_err(|source| {
            EngineError::Codec {
                operation: "compile_pattern",
                source,
            }
        })?;
        let scopes = self
            .config
            .active_scopes()
            .await
            .map_err(EngineError::config("active_scopes"))?;

        let mut report = SweepReport::default();
        for scope in scopes {
            report.scopes_scanned += 1;
            let identities = match self.backend.list_identities(&scope).await {
                Ok(identities) => identities,
                Err(err) => {
                    warn!(scope = %scope, error = %err, "failed to list identities; skipping scope");
                    self.metrics.inc_reclaim_failure();
                    report.failures.push(ReclaimFailure::ListIdentities {
                        scope,
                        error: format!("{err:#}"),
                    });
                    continue;
                }
            };

            for identity in identities {
                report.identities_seen += 1;
                let decoded = pattern
                    .decode(&identity.name)
                    .map_err(|source| EngineError::Codec {
                        operation: "decode_identity_name",
                        source,
                    })?;
                let Some(decoded) = decoded else {
                    continue;
                };
                let Some(expiry) = decoded.stamp().expiry() else {
                    debug!(identity = %identity.name, scope = %scope, "unlimited identity left in place");
                    continue;
                };
                if expiry >= now {
                    continue;
                }

                match self.backend.delete_identity(&identity.name, &scope).await {
                    Ok(()) => {
                        self.metrics.inc_identity_reclaimed();
                        info!(
                            identity = %identity.name,
                            scope = %scope,
                            expired_at = %expiry,
                            "expired identity reclaimed"
                        );
                        report.reclaimed.push(ReclaimedIdentity {
                            name: identity.name,
                            scope: scope.clone(),
                            expired_at: expiry,
                        });
                    }
                    Err(err) => {
                        self.metrics.inc_reclaim_failure();
                        warn!(
                            identity = %identity.name,
                            scope = %scope,
                            error = %err,
                            "failed to delete expired identity"
                        );
                        report.failures.push(ReclaimFailure::DeleteIdentity {
                            name: identity.name,
                            scope: scope.clone(),
                            error: format!("{err:#}"),
                        });
                    }
                }
            }
        }
        Ok(report)
    }
}
