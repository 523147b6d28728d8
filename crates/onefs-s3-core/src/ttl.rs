//! TTL cascade arithmetic shared by every issuance path.
//!
//! # Design
//! - TTLs are whole seconds with two sentinels: [`TTL_INHERIT`] (`0`) and
//!   [`TTL_UNLIMITED`] (`-1`). Any value `<= 0` never restricts a lease.
//! - Every combination funnels through [`tighter_ttl`] so the sentinel handling
//!   lives in exactly one place.

use chrono::TimeDelta;

/// Sentinel meaning "inherit from the enclosing scope".
pub const TTL_INHERIT: i64 = 0;
/// Sentinel meaning "no expiry".
pub const TTL_UNLIMITED: i64 = -1;
/// Granularity, in seconds, accepted by the identity backend for key expiry.
pub const TTL_TIME_UNIT: i64 = 60;

/// Return the more restrictive of two TTLs.
///
/// Non-positive values never restrict: two of them yield [`TTL_UNLIMITED`], a
/// single positive value wins over a sentinel, and two positive values yield
/// the smaller.
#[must_use]
pub const fn tighter_ttl(lhs: i64, rhs: i64) -> i64 {
    match (lhs > 0, rhs > 0) {
        (false, false) => TTL_UNLIMITED,
        (true, false) => lhs,
        (false, true) => rhs,
        (true, true) => {
            if lhs < rhs {
                lhs
            } else {
                rhs
            }
        }
    }
}

/// Applicable maximum for a role under the global configuration.
#[must_use]
pub const fn max_ttl(role_max: i64, global_max: i64) -> i64 {
    tighter_ttl(role_max, global_max)
}

/// Combine a requested TTL with the role/global defaults and an already
/// computed maximum.
#[must_use]
pub const fn cascade_ttl(requested: i64, role_ttl: i64, global_ttl: i64, max: i64) -> i64 {
    let default = tighter_ttl(role_ttl, global_ttl);
    tighter_ttl(tighter_ttl(requested, default), max)
}

/// Resolve the effective lease, in seconds, for a credential request.
///
/// The result never exceeds the tightest applicable maximum and is
/// [`TTL_UNLIMITED`] only when no input restricts the lease.
#[must_use]
pub const fn resolve_effective_ttl(
    requested: i64,
    role_default: i64,
    role_max: i64,
    global_default: i64,
    global_max: i64,
) -> i64 {
    cascade_ttl(
        requested,
        role_default,
        global_default,
        max_ttl(role_max, global_max),
    )
}

/// Round a positive duration to the nearest multiple of `unit`, half up.
///
/// Sentinels and negative values pass through unchanged. A positive input
/// always rounds to at least one unit.
#[must_use]
pub const fn round_to_unit(seconds: i64, unit: i64) -> i64 {
    if seconds <= 0 || unit <= 0 {
        return seconds;
    }
    let remainder = seconds % unit;
    let mut rounded = seconds - remainder;
    if remainder >= unit - remainder {
        rounded = rounded.saturating_add(unit);
    }
    if rounded == 0 { unit } else { rounded }
}

/// Lease handed to the identity backend, expressed in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseTerm {
    /// Credential never expires.
    Unlimited,
    /// Credential expires after the given number of minutes.
    Minutes(i64),
}

impl LeaseTerm {
    /// Convert an effective TTL in seconds into a backend lease.
    #[must_use]
    pub const fn from_seconds(seconds: i64) -> Self {
        if seconds > 0 {
            Self::Minutes(round_to_unit(seconds, TTL_TIME_UNIT) / TTL_TIME_UNIT)
        } else {
            Self::Unlimited
        }
    }

    /// Minutes passed to the backend; `0` requests no expiry.
    #[must_use]
    pub const fn minutes(self) -> i64 {
        match self {
            Self::Unlimited => 0,
            Self::Minutes(minutes) => minutes,
        }
    }

    /// Whether the lease carries an expiry.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        matches!(self, Self::Minutes(_))
    }

    /// Lease length as a duration, `None` for unlimited leases or overflow.
    #[must_use]
    pub fn duration(self) -> Option<TimeDelta> {
        match self {
            Self::Unlimited => None,
            Self::Minutes(minutes) => TimeDelta::try_minutes(minutes),
        }
    }
}
