//! Recurrence expansion.
//!
//! Expands a [`ParsedEvent`]'s `RRULE`, `RDATE` and `EXDATE` into concrete
//! start instants using the `rrule` crate. Zoned series expand in their own
//! zone so instances keep their wall-clock time across DST changes. Floating
//! and date-based series expand on a naive clock and are pinned afterwards
//! with the [`FloatingTimePolicy`].

use std::collections::HashSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use ical_events_core::FloatingTimePolicy;
use rrule::RRuleSet;
use thiserror::Error;
use tracing::{debug, trace};

use crate::raw_event::{ParsedEvent, RawEventTime};

/// Why a series could not be expanded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpandError {
    /// `DTSTART` names a local time that does not exist in its zone.
    #[error("start time cannot be resolved to an instant")]
    UnresolvableStart,
    /// The `RRULE` was rejected.
    #[error("invalid recurrence rule: {0}")]
    InvalidRule(String),
}

/// The expanded start instants of one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Start instants in ascending order, without duplicates.
    pub starts: Vec<DateTime<FixedOffset>>,
    /// True if the limit cut the series short.
    pub truncated: bool,
}

/// The clock a series' rule is evaluated on.
#[derive(Debug, Clone, Copy)]
enum RuleClock {
    Utc,
    Zone(Tz),
    Floating,
}

/// Resolves a document time to an instant with an explicit offset.
///
/// Dates resolve to midnight. Floating times and unknown `TZID`s follow
/// `policy`. Returns `None` for local times that fall in a DST gap.
pub fn resolve_time(
    time: &RawEventTime,
    policy: FloatingTimePolicy,
) -> Option<DateTime<FixedOffset>> {
    match time {
        RawEventTime::Utc(dt) => Some(dt.fixed_offset()),
        RawEventTime::Zoned { local, tzid } => match tzid.parse::<Tz>() {
            Ok(tz) => tz
                .from_local_datetime(local)
                .earliest()
                .map(|dt| dt.fixed_offset()),
            Err(_) => {
                debug!(tzid = %tzid, policy = %policy, "Unknown TZID, treating as floating");
                policy.resolve(local)
            }
        },
        RawEventTime::Floating(_) | RawEventTime::Date(_) => policy.resolve(&time.naive_local()),
    }
}

/// Expands an event into start instants.
///
/// Only instants in `[after, before]` (widened by a day to absorb floating
/// offsets) are produced, and at most `limit` of them. `EXDATE`s are removed
/// and `RDATE`s added after rule expansion. A non-recurring event yields its
/// single start.
///
/// # Errors
///
/// Returns an [`ExpandError`] if the start cannot be resolved or the rule is
/// rejected.
pub fn expand_event(
    event: &ParsedEvent,
    policy: FloatingTimePolicy,
    after: DateTime<Utc>,
    before: DateTime<Utc>,
    limit: usize,
) -> Result<Expansion, ExpandError> {
    let dtstart = resolve_time(&event.start, policy).ok_or(ExpandError::UnresolvableStart)?;
    let lower = after
        .checked_sub_signed(Duration::days(1))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let upper = before
        .checked_add_signed(Duration::days(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let in_range = |dt: &DateTime<FixedOffset>| {
        let utc = dt.with_timezone(&Utc);
        lower <= utc && utc <= upper
    };

    let mut expansion = Expansion::default();
    let mut starts = match &event.rrule {
        Some(rule) => {
            let (starts, limited) = expand_rule(event, rule, policy, lower, upper, limit)?;
            expansion.truncated = limited;
            starts
        }
        None => vec![dtstart],
    };

    starts.extend(
        event
            .rdates
            .iter()
            .filter_map(|t| resolve_time(t, policy))
            .filter(|dt| in_range(dt)),
    );

    let excluded: HashSet<DateTime<Utc>> = event
        .exdates
        .iter()
        .filter_map(|t| resolve_time(t, policy))
        .map(|dt| dt.with_timezone(&Utc))
        .collect();

    let mut seen = HashSet::new();
    starts.retain(|dt| {
        let utc = dt.with_timezone(&Utc);
        in_range(dt) && !excluded.contains(&utc) && seen.insert(utc)
    });
    starts.sort();

    if starts.len() > limit {
        starts.truncate(limit);
        expansion.truncated = true;
    }

    trace!(uid = %event.uid, count = starts.len(), "Expanded event");
    expansion.starts = starts;
    Ok(expansion)
}

/// Evaluates the `RRULE` between `lower` and `upper`.
fn expand_rule(
    event: &ParsedEvent,
    rule: &str,
    policy: FloatingTimePolicy,
    lower: DateTime<Utc>,
    upper: DateTime<Utc>,
    limit: usize,
) -> Result<(Vec<DateTime<FixedOffset>>, bool), ExpandError> {
    let (dtstart_line, clock) = dtstart_line(&event.start);
    let rule = rule.trim();
    let rule = rule
        .get(..6)
        .filter(|prefix| prefix.eq_ignore_ascii_case("RRULE:"))
        .map_or(rule, |_| &rule[6..]);
    let text = format!("{}\nRRULE:{}", dtstart_line, normalize_until(rule));

    let set = text
        .parse::<RRuleSet>()
        .map_err(|e| ExpandError::InvalidRule(e.to_string()))?;

    let utc = rrule::Tz::Tz(chrono_tz::UTC);
    let result = set
        .after(lower.with_timezone(&utc))
        .before(upper.with_timezone(&utc))
        .all(u16::try_from(limit).unwrap_or(u16::MAX));

    let limited = result.limited || result.dates.len() >= limit;
    let starts = result
        .dates
        .iter()
        .filter_map(|dt| match clock {
            RuleClock::Utc | RuleClock::Zone(_) => Some(dt.fixed_offset()),
            RuleClock::Floating => policy.resolve(&dt.naive_utc()),
        })
        .collect();

    Ok((starts, limited))
}

/// Builds the `DTSTART` line the rule is evaluated against.
fn dtstart_line(start: &RawEventTime) -> (String, RuleClock) {
    match start {
        RawEventTime::Utc(dt) => (format!("DTSTART:{}Z", ical(&dt.naive_utc())), RuleClock::Utc),
        RawEventTime::Zoned { local, tzid } => match tzid.parse::<Tz>() {
            Ok(tz) => (
                format!("DTSTART;TZID={}:{}", tz.name(), ical(local)),
                RuleClock::Zone(tz),
            ),
            Err(_) => (format!("DTSTART:{}Z", ical(local)), RuleClock::Floating),
        },
        other => (
            format!("DTSTART:{}Z", ical(&other.naive_local())),
            RuleClock::Floating,
        ),
    }
}

fn ical(naive: &NaiveDateTime) -> String {
    naive.format("%Y%m%dT%H%M%S").to_string()
}

/// Rewrites `UNTIL` as a UTC date-time.
///
/// The rule is evaluated against a zoned or UTC `DTSTART`, which requires a
/// UTC `UNTIL`. Date-only values become the last second of that day.
pub fn normalize_until(rule: &str) -> String {
    let mut out = rule.to_string();
    let Some(idx) = out.to_ascii_uppercase().find("UNTIL=") else {
        return out;
    };

    let value_start = idx + "UNTIL=".len();
    let value_end = out[value_start..]
        .find(';')
        .map_or(out.len(), |i| value_start + i);
    let value = &out[value_start..value_end];

    let replacement = if value.len() == 8 && !value.contains(['T', 't']) {
        Some(format!("{}T235959Z", value))
    } else if !value.ends_with(['Z', 'z']) {
        Some(format!("{}Z", value))
    } else {
        None
    };

    if let Some(replacement) = replacement {
        out.replace_range(value_start..value_end, &replacement);
    }
    out
}
