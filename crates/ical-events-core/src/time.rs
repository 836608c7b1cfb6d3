//! Time types for occurrence generation.
//!
//! This module provides [`TimeWindow`], the bounded range occurrences are
//! generated within, and [`FloatingTimePolicy`], which decides how calendar
//! times without an explicit zone are pinned to an instant.

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A time window for generating occurrences.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates the window anchored at the start of `now`'s UTC day and
    /// extending `days` days forward. The end saturates at the latest
    /// representable instant.
    pub fn starting_today(now: DateTime<Utc>, days: u32) -> Self {
        let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let end = start
            .checked_add_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }

    /// Checks if an instant falls within this window.
    ///
    /// Uses half-open interval semantics: `[start, end)`.
    pub fn contains<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> bool {
        let dt = dt.with_timezone(&Utc);
        self.start <= dt && dt < self.end
    }

    /// Checks if a span `[start, end)` overlaps with this window.
    ///
    /// A zero-length span overlaps only if its instant lies inside the window.
    pub fn overlaps<Tz: TimeZone>(&self, start: &DateTime<Tz>, end: &DateTime<Tz>) -> bool {
        let start_utc = start.with_timezone(&Utc);
        let end_utc = end.with_timezone(&Utc);
        if start_utc >= end_utc {
            return self.contains(start);
        }
        start_utc < self.end && end_utc > self.start
    }
}

/// How to interpret calendar times that carry no zone information.
///
/// Floating times (and unresolvable `TZID`s) are ambiguous by nature. The
/// server's own zone says nothing about the feed author's intent, so the
/// default pins them to UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FloatingTimePolicy {
    /// Treat floating times as UTC.
    #[default]
    AssumeUtc,
    /// Treat floating times as the host's local zone.
    AssumeLocal,
}

impl FloatingTimePolicy {
    /// Returns the stable configuration name of this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssumeUtc => "assume-utc",
            Self::AssumeLocal => "assume-local",
        }
    }

    /// Pins a floating local time to an instant with an explicit offset.
    ///
    /// Returns `None` if the local time does not exist in the host zone
    /// (inside a DST gap). Ambiguous times resolve to the earlier instant.
    pub fn resolve(&self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::AssumeUtc => Some(naive.and_utc().fixed_offset()),
            Self::AssumeLocal => Local
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.fixed_offset()),
        }
    }
}

impl std::fmt::Display for FloatingTimePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
