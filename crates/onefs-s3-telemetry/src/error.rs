//! Telemetry errors.

use std::fmt;

use prometheus::Error as PrometheusError;
use thiserror::Error;

use crate::init::LogFormat;

/// Collectors owned by [`crate::Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    /// Credentials issued, labelled by role kind.
    CredentialsIssuedTotal,
    /// Issuance failures, labelled by failing operation.
    CredentialFailuresTotal,
    /// Sweeps started.
    SweepsTotal,
    /// Sweeps aborted by a fatal error.
    SweepAbortsTotal,
    /// Identities deleted by sweeps.
    IdentitiesReclaimedTotal,
    /// Non-fatal sweep failures.
    ReclaimFailuresTotal,
    /// Scopes covered by the latest sweep.
    LastSweepScopes,
    /// Wall time of the latest sweep.
    LastSweepDurationMs,
}

impl MetricName {
    /// Prometheus name of the collector.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CredentialsIssuedTotal => "credentials_issued_total",
            Self::CredentialFailuresTotal => "credential_failures_total",
            Self::SweepsTotal => "sweeps_total",
            Self::SweepAbortsTotal => "sweep_aborts_total",
            Self::IdentitiesReclaimedTotal => "identities_reclaimed_total",
            Self::ReclaimFailuresTotal => "reclaim_failures_total",
            Self::LastSweepScopes => "last_sweep_scopes",
            Self::LastSweepDurationMs => "last_sweep_duration_ms",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while installing logging or operating the metrics registry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    #[error("failed to install {format} log subscriber")]
    SubscriberInstall {
        /// Output format that was being installed.
        format: LogFormat,
        /// Underlying subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A configured log format name is not recognised.
    #[error("unknown log format")]
    UnknownLogFormat {
        /// Value that failed to parse.
        value: String,
    },
    /// A collector definition was rejected.
    #[error("failed to build metric collector {metric}")]
    MetricsCollector {
        /// Collector being built.
        metric: MetricName,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The registry refused a collector, usually a duplicate name.
    #[error("failed to register metric collector {metric}")]
    MetricsRegister {
        /// Collector being registered.
        metric: MetricName,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The registry could not be encoded in the text exposition format.
    #[error("failed to encode metrics")]
    MetricsEncode {
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The encoder produced bytes that are not UTF-8.
    #[error("encoded metrics were not valid UTF-8")]
    MetricsUtf8 {
        /// Underlying conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    /// Collector involved in the failure, if any.
    #[must_use]
    pub const fn metric(&self) -> Option<MetricName> {
        match self {
            Self::MetricsCollector { metric, .. } | Self::MetricsRegister { metric, .. } => {
                Some(*metric)
            }
            _ => None,
        }
    }
}

/// Convenience alias for telemetry results.
pub type Result<T> = std::result::Result<T, TelemetryError>;
