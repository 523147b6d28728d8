//! Tracing subscriber setup.
//!
//! # Design
//! - One entry point installs either a JSON or a human-readable `fmt` layer.
//! - `RUST_LOG` wins over the configured level when present.
//! - Hosts pass the format as a string from their own configuration;
//!   [`LogFormat`] parses it.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::{
    EnvFilter, fmt as layer_fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::error::{Result, TelemetryError};

/// Level used when neither `RUST_LOG` nor the host sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Output format for plugin logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, for hosts that ship logs to a collector.
    Json,
    /// Human-readable lines.
    Pretty,
}

impl LogFormat {
    /// Pretty output for debug builds, JSON otherwise.
    #[must_use]
    pub const fn for_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            _ => Err(TelemetryError::UnknownLogFormat {
                value: value.to_string(),
            }),
        }
    }
}

/// How the plugin's logs are filtered and rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive applied when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::for_build(),
        }
    }
}

/// Install the global tracing subscriber for the plugin process.
///
/// # Errors
///
/// Returns [`TelemetryError::SubscriberInstall`] naming the requested format
/// when a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(layer_fmt::layer().json().with_target(false))
            .try_init(),
        LogFormat::Pretty => registry
            .with(layer_fmt::layer().with_target(false))
            .try_init(),
    };
    installed.map_err(|source| TelemetryError::SubscriberInstall {
        format: config.format,
        source,
    })?;
    tracing::debug!(
        format = %config.format,
        level = %config.level,
        "credential plugin logging initialised"
    );
    Ok(())
}
