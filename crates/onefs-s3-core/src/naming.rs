//! Generated identity names.
//!
//! # Design
//! - The name is the only persistent record of a credential's expiry; there is
//!   no side table. Layout:
//!   `<prefix>_<suffix>_<correlation>_<stamp>` for expiring identities and
//!   `<prefix>_<suffix>_<correlation>_INF_<stamp>` for unlimited ones, where
//!   `<stamp>` is a 14-digit local timestamp (expiry or creation instant).
//! - A stamp written during the repeated hour of a DST fall-back decodes to
//!   the later of the two instants. Such an identity can outlive its lease by
//!   up to an hour but is never reclaimed before it.
//! - [`IdentityPattern`] is parameterised only by the prefix so one regex both
//!   recognises owned identities and extracts the stamp.

use std::fmt;

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, SubsecRound, TimeZone, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;

use crate::error::{NamingError, NamingResult};

/// Length of the random uniqueness suffix.
pub const NAME_SUFFIX_LENGTH: usize = 6;
/// Length of the request correlation slice.
pub const NAME_CORRELATION_LENGTH: usize = 4;
/// `strftime` layout of the embedded timestamp.
pub const NAME_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const UNLIMITED_MARKER: &str = "INF";
const SEPARATOR: char = '_';

/// Temporal component embedded in a generated name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStamp {
    /// Identity expires at the given instant.
    Expires(DateTime<Local>),
    /// Identity never expires; the instant records when it was created.
    Unlimited {
        /// Creation instant.
        created: DateTime<Local>,
    },
}

impl NameStamp {
    /// Expiring stamp truncated to whole seconds.
    #[must_use]
    pub fn expires_at(at: DateTime<Utc>) -> Self {
        Self::Expires(at.with_timezone(&Local).trunc_subsecs(0))
    }

    /// Unlimited stamp recording the creation instant, truncated to whole seconds.
    #[must_use]
    pub fn unlimited_since(created: DateTime<Utc>) -> Self {
        Self::Unlimited {
            created: created.with_timezone(&Local).trunc_subsecs(0),
        }
    }

    /// Expiry instant, `None` for unlimited identities.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Expires(at) => Some(at.with_timezone(&Utc)),
            Self::Unlimited { .. } => None,
        }
    }

    /// Whether the identity is past its expiry. Equality is not expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry().is_some_and(|expiry| expiry < now)
    }
}

/// Structured form of a generated identity name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityName {
    prefix: String,
    suffix: String,
    correlation: String,
    stamp: NameStamp,
}

impl IdentityName {
    /// Assemble a name from its parts.
    #[must_use]
    pub fn new(
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        correlation: impl Into<String>,
        stamp: NameStamp,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            correlation: correlation.into(),
            stamp,
        }
    }

    /// Generate a fresh name with a random suffix and a correlation slice of
    /// the request identifier.
    #[must_use]
    pub fn generate(prefix: &str, request_id: &str, stamp: NameStamp) -> Self {
        Self::new(
            prefix,
            random_suffix(NAME_SUFFIX_LENGTH),
            correlation_slice(request_id),
            stamp,
        )
    }

    /// Random uniqueness suffix.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Request correlation slice.
    #[must_use]
    pub fn correlation(&self) -> &str {
        &self.correlation
    }

    /// Embedded stamp.
    #[must_use]
    pub const fn stamp(&self) -> NameStamp {
        self.stamp
    }
}

impl fmt::Display for IdentityName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}",
            self.prefix, self.suffix, self.correlation
        )?;
        match self.stamp {
            NameStamp::Expires(at) => write!(formatter, "{}", at.format(NAME_TIMESTAMP_FORMAT)),
            NameStamp::Unlimited { created } => write!(
                formatter,
                "{UNLIMITED_MARKER}{SEPARATOR}{}",
                created.format(NAME_TIMESTAMP_FORMAT)
            ),
        }
    }
}

/// Recogniser for names generated under a given prefix.
#[derive(Debug, Clone)]
pub struct IdentityPattern {
    prefix: String,
    regex: Regex,
}

impl IdentityPattern {
    /// Compile the recognition pattern for `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`NamingError::Pattern`] if the pattern fails to compile.
    pub fn for_prefix(prefix: &str) -> NamingResult<Self> {
        let source = format!(
            r"^{}_(?P<suffix>[^_]+)_(?P<correlation>[^_]+)_(?:(?P<unlimited>{UNLIMITED_MARKER})_)?(?P<stamp>[0-9]{{14}})$",
            regex::escape(prefix)
        );
        let regex = Regex::new(&source).map_err(|source| NamingError::Pattern {
            prefix: prefix.to_string(),
            source,
        })?;
        Ok(Self {
            prefix: prefix.to_string(),
            regex,
        })
    }

    /// Whether `name` was generated under this prefix.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// Decode `name`. Returns `Ok(None)` for names this prefix does not own.
    ///
    /// # Errors
    ///
    /// Returns an error when the name matches but its stamp cannot be turned
    /// into a local instant.
    pub fn decode(&self, name: &str) -> NamingResult<Option<IdentityName>> {
        let Some(captures) = self.regex.captures(name) else {
            return Ok(None);
        };
        let component = |component: &'static str| {
            captures
                .name(component)
                .map(|found| found.as_str())
                .ok_or_else(|| NamingError::MissingComponent {
                    name: name.to_string(),
                    component,
                })
        };
        let suffix = component("suffix")?;
        let correlation = component("correlation")?;
        let value = component("stamp")?;

        let naive = NaiveDateTime::parse_from_str(value, NAME_TIMESTAMP_FORMAT).map_err(
            |source| NamingError::Timestamp {
                name: name.to_string(),
                value: value.to_string(),
                source,
            },
        )?;
        // Repeated wall-clock times take the later instant.
        let instant = latest_instant(Local.from_local_datetime(&naive)).ok_or_else(|| {
            NamingError::LocalTime {
                name: name.to_string(),
                value: value.to_string(),
            }
        })?;
        let stamp = if captures.name("unlimited").is_some() {
            NameStamp::Unlimited { created: instant }
        } else {
            NameStamp::Expires(instant)
        };

        Ok(Some(IdentityName::new(
            self.prefix.clone(),
            suffix,
            correlation,
            stamp,
        )))
    }
}

/// Pick the later instant when a wall-clock time occurs twice.
/// `None` for times skipped by a spring-forward gap.
fn latest_instant<Tz: TimeZone>(resolved: LocalResult<DateTime<Tz>>) -> Option<DateTime<Tz>> {
    match resolved {
        LocalResult::Single(at) => Some(at),
        LocalResult::Ambiguous(first, second) => Some(first.max(second)),
        LocalResult::None => None,
    }
}

fn random_suffix(length: usize) -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| char::from(rng.sample(Alphanumeric)))
        .take(length)
        .collect()
}

fn correlation_slice(request_id: &str) -> String {
    let mut slice: String = request_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(NAME_CORRELATION_LENGTH)
        .collect();
    while slice.len() < NAME_CORRELATION_LENGTH {
        slice.push('0');
    }
    slice
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeDelta};

    fn fixed_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45)
            .single()
            .expect("valid fixed instant")
    }

    #[test]
    fn expiring_name_round_trips_to_the_second() -> NamingResult<()> {
        let expires = fixed_instant() + TimeDelta::milliseconds(750);
        let name = IdentityName::generate("vault", "3f2a9c1e-0000", NameStamp::expires_at(expires));
        let rendered = name.to_string();

        let pattern = IdentityPattern::for_prefix("vault")?;
        let decoded = pattern.decode(&rendered)?.expect("generated name should match");

        assert_eq!(decoded, name);
        assert_eq!(decoded.stamp().expiry(), Some(fixed_instant()));
        Ok(())
    }

    #[test]
    fn unlimited_name_carries_marker_and_creation_time() -> NamingResult<()> {
        let name = IdentityName::new(
            "vault",
            "Ab12Cd",
            "3f2a",
            NameStamp::unlimited_since(fixed_instant()),
        );
        let rendered = name.to_string();
        assert!(rendered.starts_with("vault_Ab12Cd_3f2a_INF_"));
        assert_eq!(rendered.len(), "vault_Ab12Cd_3f2a_INF_".len() + 14);

        let decoded = IdentityPattern::for_prefix("vault")?
            .decode(&rendered)?
            .expect("unlimited name should match");
        assert!(matches!(decoded.stamp(), NameStamp::Unlimited { .. }));
        assert!(decoded.stamp().expiry().is_none());
        assert!(!decoded.stamp().is_expired_at(fixed_instant() + TimeDelta::days(365)));
        Ok(())
    }

    #[test]
    fn generated_parts_have_fixed_widths() {
        let name = IdentityName::generate(
            "vault",
            "9b-7",
            NameStamp::expires_at(fixed_instant()),
        );
        assert_eq!(name.suffix().len(), NAME_SUFFIX_LENGTH);
        assert!(name.suffix().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(name.correlation(), "9b70");
    }

    #[test]
    fn foreign_names_are_ignored() -> NamingResult<()> {
        let pattern = IdentityPattern::for_prefix("vault")?;
        for name in [
            "admin",
            "vault",
            "vaultx_abc123_3f2a_20240115103045",
            "other_abc123_3f2a_20240115103045",
            "vault_abc123_3f2a_2024011510304",
            "vault_abc123_3f2a_XYZ_20240115103045",
            "vault_abc_123_3f2a_20240115103045",
        ] {
            assert!(pattern.decode(name)?.is_none(), "{name} should not match");
        }
        Ok(())
    }

    #[test]
    fn prefix_is_matched_literally() -> NamingResult<()> {
        let pattern = IdentityPattern::for_prefix("a.b")?;
        assert!(pattern.matches("a.b_abc123_3f2a_20240115103045"));
        assert!(!pattern.matches("aXb_abc123_3f2a_20240115103045"));
        Ok(())
    }

    #[test]
    fn impossible_timestamp_is_an_error() -> NamingResult<()> {
        let pattern = IdentityPattern::for_prefix("vault")?;
        let err = pattern
            .decode("vault_abc123_3f2a_20241345103045")
            .expect_err("month 13 must not decode");
        assert!(matches!(err, NamingError::Timestamp { .. }));
        Ok(())
    }

    #[test]
    fn repeated_wall_clock_hour_resolves_to_the_later_instant() {
        // 2024-11-03 01:30 happens at -04:00 and again at -05:00 in New York.
        let at = |offset_hours: i32| {
            FixedOffset::west_opt(offset_hours * 3_600)
                .expect("valid offset")
                .with_ymd_and_hms(2024, 11, 3, 1, 30, 0)
                .single()
                .expect("fixed offsets are unambiguous")
        };
        let daylight = at(4);
        let standard = at(5);
        let later = Utc
            .with_ymd_and_hms(2024, 11, 3, 6, 30, 0)
            .single()
            .expect("valid utc instant");

        for resolved in [
            LocalResult::Ambiguous(daylight, standard),
            LocalResult::Ambiguous(standard, daylight),
        ] {
            let picked = latest_instant(resolved).expect("ambiguous time resolves");
            assert_eq!(picked.with_timezone(&Utc), later);
            let stamp = NameStamp::expires_at(picked.with_timezone(&Utc));
            assert!(!stamp.is_expired_at(daylight.with_timezone(&Utc)));
        }
        assert_eq!(latest_instant(LocalResult::Single(daylight)), Some(daylight));
        assert_eq!(latest_instant::<FixedOffset>(LocalResult::None), None);
    }

    #[test]
    fn expiry_is_strictly_before_now() {
        let stamp = NameStamp::expires_at(fixed_instant());
        assert!(!stamp.is_expired_at(fixed_instant()));
        assert!(!stamp.is_expired_at(fixed_instant() - TimeDelta::seconds(1)));
        assert!(stamp.is_expired_at(fixed_instant() + TimeDelta::seconds(1)));
    }
}
