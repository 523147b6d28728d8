//! Drift-free scheduling of expiry sweeps.
//!
//! # Design
//! - The sweeper is driven by an external tick of any cadence; each tick
//!   either does nothing or runs one full sweep before returning.
//! - `next_sweep_at` only moves forward by whole periods and is advanced
//!   before any backend I/O, so a slow or failing sweep never re-triggers on
//!   the following tick.
//! - `&mut self` on [`ExpirySweeper::tick`] makes the single-writer rule a
//!   compile-time property.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use onefs_s3_config::{ConfigService, GlobalConfig};
use onefs_s3_core::{Clock, IdentityBackend};
use onefs_s3_telemetry::Metrics;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::sweep::{Reclaimer, SweepReport};

/// Armed sweep schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    period: TimeDelta,
    next_sweep_at: DateTime<Utc>,
}

impl SweepSchedule {
    /// Schedule whose first sweep is one period after `anchor`.
    #[must_use]
    pub fn starting_at(anchor: DateTime<Utc>, period: TimeDelta) -> Option<Self> {
        Some(Self {
            period,
            next_sweep_at: anchor.checked_add_signed(period)?,
        })
    }

    /// Sweep period.
    #[must_use]
    pub const fn period(&self) -> TimeDelta {
        self.period
    }

    /// Instant after which the next sweep is due.
    #[must_use]
    pub const fn next_sweep_at(&self) -> DateTime<Utc> {
        self.next_sweep_at
    }

    /// Whether a sweep is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now > self.next_sweep_at
    }

    /// Advance `next_sweep_at` by the smallest whole number of periods that
    /// puts it strictly after `now`. Returns `false` on overflow, leaving the
    /// schedule untouched.
    pub fn advance_past(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.next_sweep_at {
            return true;
        }
        let period_ms = self.period.num_milliseconds();
        if period_ms <= 0 {
            return false;
        }
        let behind_ms = (now - self.next_sweep_at).num_milliseconds();
        let periods = behind_ms / period_ms + 1;
        let advanced = period_ms
            .checked_mul(periods)
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|step| self.next_sweep_at.checked_add_signed(step));
        let Some(next) = advanced else {
            return false;
        };
        self.next_sweep_at = next;
        true
    }
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No configuration, or sweeping is turned off.
    Disabled,
    /// A schedule was created from the current configuration; nothing is due yet.
    Armed,
    /// The schedule is armed and not yet due.
    Idle,
    /// A sweep ran to completion.
    Swept(SweepReport),
}

/// Owns the sweep schedule and runs sweeps when due.
#[derive(Debug)]
pub struct ExpirySweeper {
    reclaimer: Reclaimer,
    anchor: DateTime<Utc>,
    schedule: Option<SweepSchedule>,
}

impl ExpirySweeper {
    /// Create a sweeper anchored at the clock's current instant.
    #[must_use]
    pub fn new(
        config: ConfigService,
        backend: Arc<dyn IdentityBackend>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        let anchor = clock.now();
        Self {
            reclaimer: Reclaimer {
                config,
                backend,
                clock,
                metrics,
            },
            anchor,
            schedule: None,
        }
    }

    /// Current schedule, if armed.
    #[must_use]
    pub const fn schedule(&self) -> Option<SweepSchedule> {
        self.schedule
    }

    /// Reset the schedule so the next sweep is one period after now, using
    /// whatever configuration is current at the next tick.
    pub fn rearm(&mut self) {
        self.anchor = self.reclaimer.clock.now();
        self.schedule = None;
        debug!(anchor = %self.anchor, "expiry sweeper re-armed");
    }

    /// Handle one periodic tick.
    ///
    /// # Errors
    ///
    /// Returns an error when configuration cannot be loaded or a sweep is
    /// aborted. The schedule has already advanced in the latter case.
    pub async fn tick(&mut self) -> EngineResult<TickOutcome> {
        let config = self
            .reclaimer
            .config
            .load_global()
            .await
            .map_err(EngineError::config("load_global"))?;
        let Some((config, period)) = config.and_then(|config| {
            let period = sweep_period(&config)?;
            Some((config, period))
        }) else {
            if self.schedule.take().is_some() {
                info!("expiry sweep disabled");
            }
            return Ok(TickOutcome::Disabled);
        };

        let now = self.reclaimer.clock.now();
        let mut armed = false;
        let schedule = match self.schedule {
            Some(schedule) if schedule.period() == period => schedule,
            _ => {
                let Some(schedule) = SweepSchedule::starting_at(self.anchor, period) else {
                    warn!(period_secs = period.num_seconds(), "sweep period out of range");
                    return Ok(TickOutcome::Disabled);
                };
                info!(
                    period_secs = period.num_seconds(),
                    next_sweep_at = %schedule.next_sweep_at(),
                    "expiry sweep armed"
                );
                armed = true;
                schedule
            }
        };
        self.schedule = Some(schedule);

        if !schedule.is_due(now) {
            return Ok(if armed {
                TickOutcome::Armed
            } else {
                TickOutcome::Idle
            });
        }

        let mut advanced = schedule;
        if !advanced.advance_past(now) {
            warn!("sweep schedule overflowed; re-anchoring at now");
            self.rearm();
            return Ok(TickOutcome::Idle);
        }
        self.schedule = Some(advanced);
        self.anchor = now;
        debug!(next_sweep_at = %advanced.next_sweep_at(), "expiry sweep due");

        self.reclaimer.run(&config, now).await.map(TickOutcome::Swept)
    }

    /// Run a sweep immediately, outside the schedule.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotConfigured`] without configuration, or the
    /// sweep's fatal error.
    pub async fn sweep_now(&self) -> EngineResult<SweepReport> {
        let config = self
            .reclaimer
            .config
            .load_global()
            .await
            .map_err(EngineError::config("load_global"))?
            .ok_or(EngineError::NotConfigured)?;
        let now = self.reclaimer.clock.now();
        self.reclaimer.run(&config, now).await
    }
}

fn sweep_period(config: &GlobalConfig) -> Option<TimeDelta> {
    if config.sweep_enabled() {
        TimeDelta::try_seconds(config.cleanup_period)
    } else {
        None
    }
}
