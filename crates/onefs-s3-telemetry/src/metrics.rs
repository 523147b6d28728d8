//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Counters cover issuance outcomes and sweep reclamation; gauges describe
//!   the most recent sweep.

use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{MetricName, Result, TelemetryError};

/// Prometheus-backed metrics registry shared by the minter and the sweeper.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    credentials_issued_total: IntCounterVec,
    credential_failures_total: IntCounterVec,
    sweeps_total: IntCounter,
    sweep_aborts_total: IntCounter,
    identities_reclaimed_total: IntCounter,
    reclaim_failures_total: IntCounter,
    last_sweep_scopes: IntGauge,
    last_sweep_duration_ms: IntGauge,
}

/// Snapshot of sweep counters and gauges for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Sweeps started.
    pub sweeps_total: u64,
    /// Sweeps aborted by a fatal error.
    pub sweep_aborts_total: u64,
    /// Identities deleted by sweeps.
    pub identities_reclaimed_total: u64,
    /// Per-identity or per-scope sweep failures.
    pub reclaim_failures_total: u64,
    /// Scopes scanned by the latest sweep.
    pub last_sweep_scopes: i64,
    /// Wall time of the latest sweep in milliseconds.
    pub last_sweep_duration_ms: i64,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let credentials_issued_total = register(
            &registry,
            MetricName::CredentialsIssuedTotal,
            IntCounterVec::new(
                Opts::new(
                    MetricName::CredentialsIssuedTotal.as_str(),
                    "Credentials issued by role kind",
                ),
                &["kind"],
            ),
        )?;
        let credential_failures_total = register(
            &registry,
            MetricName::CredentialFailuresTotal,
            IntCounterVec::new(
                Opts::new(
                    MetricName::CredentialFailuresTotal.as_str(),
                    "Credential issuance failures by failing operation",
                ),
                &["operation"],
            ),
        )?;
        let sweeps_total = register(
            &registry,
            MetricName::SweepsTotal,
            IntCounter::with_opts(Opts::new(
                MetricName::SweepsTotal.as_str(),
                "Expiry sweeps started",
            )),
        )?;
        let sweep_aborts_total = register(
            &registry,
            MetricName::SweepAbortsTotal,
            IntCounter::with_opts(Opts::new(
                MetricName::SweepAbortsTotal.as_str(),
                "Expiry sweeps aborted by a fatal error",
            )),
        )?;
        let identities_reclaimed_total = register(
            &registry,
            MetricName::IdentitiesReclaimedTotal,
            IntCounter::with_opts(Opts::new(
                MetricName::IdentitiesReclaimedTotal.as_str(),
                "Expired identities deleted by sweeps",
            )),
        )?;
        let reclaim_failures_total = register(
            &registry,
            MetricName::ReclaimFailuresTotal,
            IntCounter::with_opts(Opts::new(
                MetricName::ReclaimFailuresTotal.as_str(),
                "Non-fatal failures recorded during sweeps",
            )),
        )?;
        let last_sweep_scopes = register(
            &registry,
            MetricName::LastSweepScopes,
            IntGauge::with_opts(Opts::new(
                MetricName::LastSweepScopes.as_str(),
                "Access zones scanned by the latest sweep",
            )),
        )?;
        let last_sweep_duration_ms = register(
            &registry,
            MetricName::LastSweepDurationMs,
            IntGauge::with_opts(Opts::new(
                MetricName::LastSweepDurationMs.as_str(),
                "Wall time of the latest sweep (ms)",
            )),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                credentials_issued_total,
                credential_failures_total,
                sweeps_total,
                sweep_aborts_total,
                identities_reclaimed_total,
                reclaim_failures_total,
                last_sweep_scopes,
                last_sweep_duration_ms,
            }),
        })
    }

    /// Count an issued credential of the given role kind.
    pub fn inc_credential_issued(&self, kind: &str) {
        self.inner
            .credentials_issued_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Count an issuance failure attributed to a backend or config operation.
    pub fn inc_credential_failure(&self, operation: &str) {
        self.inner
            .credential_failures_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Count a started sweep.
    pub fn inc_sweep(&self) {
        self.inner.sweeps_total.inc();
    }

    /// Count a sweep aborted by a fatal error.
    pub fn inc_sweep_abort(&self) {
        self.inner.sweep_aborts_total.inc();
    }

    /// Count a reclaimed identity.
    pub fn inc_identity_reclaimed(&self) {
        self.inner.identities_reclaimed_total.inc();
    }

    /// Count a non-fatal sweep failure.
    pub fn inc_reclaim_failure(&self) {
        self.inner.reclaim_failures_total.inc();
    }

    /// Record how many scopes the latest sweep covered.
    pub fn set_last_sweep_scopes(&self, scopes: usize) {
        self.inner
            .last_sweep_scopes
            .set(i64::try_from(scopes).unwrap_or(i64::MAX));
    }

    /// Record how long the latest sweep took.
    pub fn observe_sweep_duration(&self, duration: Duration) {
        self.inner
            .last_sweep_duration_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Issued credentials so far for a role kind.
    #[must_use]
    pub fn credentials_issued(&self, kind: &str) -> u64 {
        self.inner
            .credentials_issued_total
            .with_label_values(&[kind])
            .get()
    }

    /// Issuance failures so far for an operation.
    #[must_use]
    pub fn credential_failures(&self, operation: &str) -> u64 {
        self.inner
            .credential_failures_total
            .with_label_values(&[operation])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the sweep counters and gauges.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sweeps_total: self.inner.sweeps_total.get(),
            sweep_aborts_total: self.inner.sweep_aborts_total.get(),
            identities_reclaimed_total: self.inner.identities_reclaimed_total.get(),
            reclaim_failures_total: self.inner.reclaim_failures_total.get(),
            last_sweep_scopes: self.inner.last_sweep_scopes.get(),
            last_sweep_duration_ms: self.inner.last_sweep_duration_ms.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn register<C>(
    registry: &Registry,
    metric: MetricName,
    collector: prometheus::Result<C>,
) -> Result<C>
where
    C: Collector + Clone + 'static,
{
    let collector =
        collector.map_err(|source| TelemetryError::MetricsCollector { metric, source })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { metric, source })?;
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_credential_issued("dynamic");
        metrics.inc_credential_issued("dynamic");
        metrics.inc_credential_failure("create_identity");
        metrics.inc_sweep();
        metrics.inc_sweep_abort();
        metrics.inc_identity_reclaimed();
        metrics.inc_reclaim_failure();
        metrics.set_last_sweep_scopes(3);
        metrics.observe_sweep_duration(Duration::from_millis(45));

        assert_eq!(metrics.credentials_issued("dynamic"), 2);
        assert_eq!(metrics.credentials_issued("predefined"), 0);
        assert_eq!(metrics.credential_failures("create_identity"), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot,
            MetricsSnapshot {
                sweeps_total: 1,
                sweep_aborts_total: 1,
                identities_reclaimed_total: 1,
                reclaim_failures_total: 1,
                last_sweep_scopes: 3,
                last_sweep_duration_ms: 45,
            }
        );

        let rendered = metrics.render()?;
        assert!(rendered.contains("credentials_issued_total"));
        assert!(rendered.contains("identities_reclaimed_total"));
        assert!(rendered.contains("last_sweep_scopes 3"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.inc_sweep();
        assert_eq!(second.snapshot().sweeps_total, 0);
        Ok(())
    }
}
