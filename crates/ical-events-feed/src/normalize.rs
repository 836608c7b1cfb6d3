//! ParsedEvent to Occurrence conversion pipeline.
//!
//! This module handles the transformation from a fetched [`RawFeed`] to the
//! [`Occurrence`] records returned to callers.
//!
//! The normalization process:
//! 1. Parses the document, dropping malformed events
//! 2. Expands each series within the query window
//! 3. Applies `RECURRENCE-ID` overrides and cancellations
//! 4. Pins every start and end to an instant with an explicit offset
//!
//! The occurrence cap keeps the earliest instances across the whole document,
//! so output is ordered by start. Occurrences sharing a start keep document
//! order.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use ical_events_core::{FloatingTimePolicy, Occurrence, TimeWindow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FeedResult;
use crate::expand::{expand_event, resolve_time};
use crate::ics::{CalendarDocument, parse_document};
use crate::provider::RawFeed;
use crate::raw_event::ParsedEvent;

/// Settings that shape normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Length of the query window in days, starting at today's UTC midnight.
    pub window_days: u32,
    /// How floating times and unknown `TZID`s are pinned.
    pub floating_time: FloatingTimePolicy,
    /// Upper bound on occurrences produced from one document. The earliest
    /// instances are kept.
    pub max_occurrences: usize,
}

impl NormalizeOptions {
    /// Default window length.
    pub const DEFAULT_WINDOW_DAYS: u32 = 365;

    /// Default occurrence cap.
    pub const DEFAULT_MAX_OCCURRENCES: usize = 5000;

    /// Creates options with default values.
    pub fn new() -> Self {
        Self {
            window_days: Self::DEFAULT_WINDOW_DAYS,
            floating_time: FloatingTimePolicy::default(),
            max_occurrences: Self::DEFAULT_MAX_OCCURRENCES,
        }
    }

    /// Sets the window length.
    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    /// Sets the floating-time policy.
    pub fn with_floating_time(mut self, policy: FloatingTimePolicy) -> Self {
        self.floating_time = policy;
        self
    }

    /// Sets the occurrence cap.
    pub fn with_max_occurrences(mut self, max: usize) -> Self {
        self.max_occurrences = max;
        self
    }

    /// Returns the query window for a request made at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> TimeWindow {
        TimeWindow::starting_today(now, self.window_days)
    }
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a feed and produces its occurrences within the window.
///
/// # Errors
///
/// Returns a parse error if the body is not a calendar document. Problems
/// with individual events never fail the call.
pub fn normalize_feed(
    feed: &RawFeed,
    options: &NormalizeOptions,
    now: DateTime<Utc>,
) -> FeedResult<Vec<Occurrence>> {
    let document = parse_document(&feed.body)?;
    let occurrences = normalize_document(&document, options, now);
    debug!(
        url = %feed.source,
        events = document.events.len(),
        skipped = document.skipped,
        occurrences = occurrences.len(),
        "Normalized feed"
    );
    Ok(occurrences)
}

type OverrideKey<'a> = (&'a str, DateTime<Utc>);

/// Produces the occurrences of a parsed document within the window.
pub fn normalize_document(
    document: &CalendarDocument,
    options: &NormalizeOptions,
    now: DateTime<Utc>,
) -> Vec<Occurrence> {
    let window = options.window(now);
    let policy = options.floating_time;

    let mut masters = Vec::new();
    let mut overrides: Vec<&ParsedEvent> = Vec::new();
    let mut override_index: HashMap<OverrideKey<'_>, usize> = HashMap::new();

    for event in &document.events {
        let Some(recurrence_id) = &event.recurrence_id else {
            masters.push(event);
            continue;
        };
        match resolve_time(recurrence_id, policy) {
            Some(instant) => {
                override_index.insert((event.uid.as_str(), instant.to_utc()), overrides.len());
                overrides.push(event);
            }
            None => warn!(uid = %event.uid, "Skipping override with unresolvable RECURRENCE-ID"),
        }
    }

    let mut consumed = vec![false; overrides.len()];
    let mut collector = Collector::new(window, options.max_occurrences);

    for event in masters {
        if options.max_occurrences == 0 {
            break;
        }

        let Some(dtstart) = resolve_time(&event.start, policy) else {
            warn!(uid = %event.uid, "Skipping event with unresolvable start time");
            continue;
        };
        let duration = event_duration(event, dtstart, policy);
        if dtstart.checked_add_signed(duration).is_none() {
            warn!(uid = %event.uid, "Skipping event whose end is out of range");
            continue;
        }
        // Instances starting this long before the window still reach into it.
        let earliest = window
            .start
            .checked_sub_signed(duration)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let expansion = match expand_event(
            event,
            policy,
            earliest,
            window.end,
            options.max_occurrences,
        ) {
            Ok(expansion) => expansion,
            Err(e) => {
                warn!(uid = %event.uid, error = %e, "Skipping event that cannot be expanded");
                continue;
            }
        };

        for start in expansion.starts {
            let key = (event.uid.as_str(), start.to_utc());
            let occurrence = match override_index.get(&key) {
                Some(&index) => {
                    consumed[index] = true;
                    let replacement = overrides[index];
                    if replacement.is_cancelled() {
                        debug!(uid = %event.uid, recurrence_id = %start, "Instance cancelled");
                        continue;
                    }
                    match override_occurrence(replacement, policy, now) {
                        Some(occurrence) => occurrence,
                        None => continue,
                    }
                }
                None => {
                    let Some(occurrence) = build_occurrence(event, start, duration, now) else {
                        warn!(uid = %event.uid, "Skipping event whose end is out of range");
                        break;
                    };
                    if event.is_recurring() {
                        occurrence.with_recurrence_id(start.to_rfc3339())
                    } else {
                        occurrence
                    }
                }
            };

            collector.push(occurrence);
        }

        if expansion.truncated {
            collector.dropped = true;
        }
    }

    // Overrides whose original instance was not expanded (moved in from
    // outside the window, or no master in the document).
    for (index, replacement) in overrides.iter().enumerate() {
        if consumed[index] || replacement.is_cancelled() {
            continue;
        }
        if let Some(occurrence) = override_occurrence(replacement, policy, now) {
            collector.push(occurrence);
        }
    }

    collector.finish()
}

/// Accumulates in-window occurrences, keeping the earliest `max` of them.
///
/// Memory stays bounded: once twice the cap has been collected the buffer is
/// sorted and cut back to the cap.
struct Collector {
    window: TimeWindow,
    max: usize,
    dropped: bool,
    occurrences: Vec<Occurrence>,
}

impl Collector {
    fn new(window: TimeWindow, max: usize) -> Self {
        Self {
            window,
            max,
            dropped: false,
            occurrences: Vec::new(),
        }
    }

    /// Adds the occurrence if it overlaps the window.
    fn push(&mut self, occurrence: Occurrence) {
        if !self.window.overlaps(&occurrence.start, &occurrence.end) {
            return;
        }
        self.occurrences.push(occurrence);
        if self.occurrences.len() >= self.max.saturating_mul(2).max(1) {
            self.truncate();
        }
    }

    fn truncate(&mut self) {
        self.occurrences.sort_by(|a, b| a.start.cmp(&b.start));
        if self.occurrences.len() > self.max {
            self.occurrences.truncate(self.max);
            self.dropped = true;
        }
    }

    fn finish(mut self) -> Vec<Occurrence> {
        self.truncate();
        if self.dropped {
            warn!(
                max_occurrences = self.max,
                "Occurrence cap reached, latest instances dropped"
            );
        }
        self.occurrences
    }
}

/// Returns the length of each instance of `event`.
///
/// `DTEND` wins over `DURATION`. Without either, date-based events last one
/// day and timed events are instantaneous.
fn event_duration(
    event: &ParsedEvent,
    dtstart: DateTime<FixedOffset>,
    policy: FloatingTimePolicy,
) -> Duration {
    if let Some(end) = event.end.as_ref().and_then(|t| resolve_time(t, policy)) {
        let duration = end - dtstart;
        if duration >= Duration::zero() {
            return duration;
        }
        debug!(uid = %event.uid, "DTEND precedes DTSTART, ignoring it");
    }

    if let Some(duration) = event.duration.filter(|d| *d >= Duration::zero()) {
        return duration;
    }

    if event.is_all_day() {
        Duration::days(1)
    } else {
        Duration::zero()
    }
}

fn override_occurrence(
    event: &ParsedEvent,
    policy: FloatingTimePolicy,
    now: DateTime<Utc>,
) -> Option<Occurrence> {
    let Some(start) = resolve_time(&event.start, policy) else {
        warn!(uid = %event.uid, "Skipping override with unresolvable start time");
        return None;
    };
    let duration = event_duration(event, start, policy);
    let recurrence_id = event
        .recurrence_id
        .as_ref()
        .and_then(|t| resolve_time(t, policy))
        .map(|dt| dt.to_rfc3339());

    let Some(occurrence) = build_occurrence(event, start, duration, now) else {
        warn!(uid = %event.uid, "Skipping override whose end is out of range");
        return None;
    };
    Some(match recurrence_id {
        Some(id) => occurrence.with_recurrence_id(id),
        None => occurrence,
    })
}

/// Returns `None` if the end falls outside the representable range.
fn build_occurrence(
    event: &ParsedEvent,
    start: DateTime<FixedOffset>,
    duration: Duration,
    now: DateTime<Utc>,
) -> Option<Occurrence> {
    let end = start.checked_add_signed(duration)?;
    let mut occurrence =
        Occurrence::new(&event.uid, event.name(), start, end, now).with_all_day(event.is_all_day());

    if let Some(ref url) = event.url {
        occurrence = occurrence.with_url(url);
    }
    if let Some(ref description) = event.description {
        occurrence = occurrence.with_description(description);
    }
    if let Some(ref location) = event.location {
        occurrence = occurrence.with_location(location);
    }
    if let Some(ref status) = event.status {
        occurrence = occurrence.with_status(status);
    }
    if let Some(created) = event.created {
        occurrence = occurrence.with_created(created);
    }
    if let Some(last_modified) = event.last_modified {
        occurrence = occurrence.with_last_modified(last_modified);
    }

    Some(occurrence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CalendarSource;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn wrap(events: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n{}END:VCALENDAR\r\n",
            events
        )
    }

    fn normalize(ics: &str) -> Vec<Occurrence> {
        normalize_with(ics, NormalizeOptions::new())
    }

    fn normalize_with(ics: &str, options: NormalizeOptions) -> Vec<Occurrence> {
        let source = CalendarSource::parse("https://example.com/cal.ics").unwrap();
        normalize_feed(&RawFeed::new(source, ics), &options, now()).unwrap()
    }

    const WEEKLY: &str = "BEGIN:VEVENT\r\n\
                          UID:standup@example.com\r\n\
                          DTSTART:20250106T090000Z\r\n\
                          DTEND:20250106T091500Z\r\n\
                          SUMMARY:Standup\r\n\
                          RRULE:FREQ=WEEKLY\r\n\
                          END:VEVENT\r\n";

    #[test]
    fn options_defaults() {
        let options = NormalizeOptions::default();
        assert_eq!(options.window_days, 365);
        assert_eq!(options.floating_time, FloatingTimePolicy::AssumeUtc);
        assert_eq!(options.max_occurrences, 5000);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: NormalizeOptions =
            serde_json::from_str(r#"{"floating_time":"assume-local"}"#).unwrap();
        assert_eq!(options.floating_time, FloatingTimePolicy::AssumeLocal);
        assert_eq!(options.window_days, 365);
    }

    #[test]
    fn single_event_maps_fields() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
             UID:review@example.com\r\n\
             DTSTART:20250110T150000Z\r\n\
             DTEND:20250110T160000Z\r\n\
             SUMMARY:Design review\r\n\
             LOCATION:Room 4\r\n\
             URL:https://example.com/review\r\n\
             STATUS:TENTATIVE\r\n\
             CREATED:20241201T080000Z\r\n\
             END:VEVENT\r\n",
        );
        let occurrences = normalize(&ics);

        assert_eq!(occurrences.len(), 1);
        let occurrence = &occurrences[0];
        assert_eq!(occurrence.name, "Design review");
        assert_eq!(occurrence.start.to_rfc3339(), "2025-01-10T15:00:00+00:00");
        assert_eq!(occurrence.end.to_rfc3339(), "2025-01-10T16:00:00+00:00");
        assert_eq!(occurrence.location.as_deref(), Some("Room 4"));
        assert_eq!(occurrence.url.as_deref(), Some("https://example.com/review"));
        assert_eq!(occurrence.status.as_deref(), Some("TENTATIVE"));
        assert!(occurrence.created.is_some());
        assert!(occurrence.recurrence_id.is_none());
        assert!(!occurrence.all_day);
        // 2025-01-01T12:00Z to 2025-01-10T15:00Z
        assert_eq!(occurrence.seconds_until_start, 9 * 86400 + 3 * 3600);
    }

    #[test]
    fn weekly_series_expands_over_window() {
        let occurrences = normalize(&wrap(WEEKLY));

        assert_eq!(occurrences.len(), 52);
        let ids: HashSet<_> = occurrences
            .iter()
            .map(|o| o.recurrence_id.clone().unwrap())
            .collect();
        assert_eq!(ids.len(), 52);
        assert_eq!(
            occurrences[0].recurrence_id.as_deref(),
            Some("2025-01-06T09:00:00+00:00")
        );
        assert!(occurrences.iter().all(|o| o.end - o.start == Duration::minutes(15)));
    }

    #[test]
    fn shorter_window_limits_expansion() {
        let options = NormalizeOptions::new().with_window_days(14);
        let occurrences = normalize_with(&wrap(WEEKLY), options);
        // Mondays 2025-01-06 and 2025-01-13
        assert_eq!(occurrences.len(), 2);
    }

    #[test]
    fn tzid_events_carry_zone_offset() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
             UID:berlin@example.com\r\n\
             DTSTART;TZID=Europe/Berlin:20250324T090000\r\n\
             DTEND;TZID=Europe/Berlin:20250324T100000\r\n\
             RRULE:FREQ=WEEKLY;COUNT=2\r\n\
             END:VEVENT\r\n",
        );
        let occurrences = normalize(&ics);

        assert_eq!(occurrences.len(), 2);
        assert_eq!(occurrences[0].start.to_rfc3339(), "2025-03-24T09:00:00+01:00");
        assert_eq!(occurrences[1].start.to_rfc3339(), "2025-03-31T09:00:00+02:00");
        assert_eq!(occurrences[1].end.to_rfc3339(), "2025-03-31T10:00:00+02:00");
    }

    #[test]
    fn floating_times_are_pinned_to_utc_by_default() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
             UID:floating@example.com\r\n\
             DTSTART:20250201T083000\r\n\
             END:VEVENT\r\n",
        );
        let occurrences = normalize(&ics);

        assert_eq!(occurrences[0].start.to_rfc3339(), "2025-02-01T08:30:00+00:00");
        assert_eq!(occurrences[0].start, occurrences[0].end);
    }

    #[test]
    fn all_day_event_lasts_one_day() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
             UID:holiday@example.com\r\n\
             DTSTART;VALUE=DATE:20250301\r\n\
             SUMMARY:Holiday\r\n\
             END:VEVENT\r\n",
        );
        let occurrences = normalize(&ics);

        assert!(occurrences[0].all_day);
        assert_eq!(occurrences[0].start.to_rfc3339(), "2025-03-01T00:00:00+00:00");
        assert_eq!(occurrences[0].end - occurrences[0].start, Duration::days(1));
    }

    #[test]
    fn duration_property_is_used_without_dtend() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
             UID:workshop@example.com\r\n\
             DTSTART:20250301T090000Z\r\n\
             DURATION:PT2H30M\r\n\
             END:VEVENT\r\n",
        );
        let workshop = &normalize(&ics)[0];
        assert_eq!(workshop.end - workshop.start, Duration::minutes(150));
    }

    #[test]
    fn override_replaces_instance() {
        let ics = wrap(&format!(
            "{}BEGIN:VEVENT\r\n\
             UID:standup@example.com\r\n\
             RECURRENCE-ID:20250113T090000Z\r\n\
             DTSTART:20250113T110000Z\r\n\
             DTEND:20250113T113000Z\r\n\
             SUMMARY:Standup (moved)\r\n\
             END:VEVENT\r\n",
            WEEKLY
        ));
        let occurrences = normalize(&ics);

        assert_eq!(occurrences.len(), 52);
        let moved: Vec<_> = occurrences
            .iter()
            .filter(|o| o.name == "Standup (moved)")
            .collect();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].start.to_rfc3339(), "2025-01-13T11:00:00+00:00");
        assert_eq!(
            moved[0].recurrence_id.as_deref(),
            Some("2025-01-13T09:00:00+00:00")
        );
        assert!(!occurrences
            .iter()
            .any(|o| o.start.to_rfc3339() == "2025-01-13T09:00:00+00:00"));
    }

    #[test]
    fn cancelled_override_removes_instance() {
        let ics = wrap(&format!(
            "{}BEGIN:VEVENT\r\n\
             UID:standup@example.com\r\n\
             RECURRENCE-ID:20250113T090000Z\r\n\
             DTSTART:20250113T090000Z\r\n\
             STATUS:CANCELLED\r\n\
             END:VEVENT\r\n",
            WEEKLY
        ));
        assert_eq!(normalize(&ics).len(), 51);
    }

    #[test]
    fn orphan_override_is_kept() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
             UID:lonely@example.com\r\n\
             RECURRENCE-ID:20250120T090000Z\r\n\
             DTSTART:20250121T090000Z\r\n\
             END:VEVENT\r\n",
        );
        let occurrences = normalize(&ics);
        assert_eq!(occurrences.len(), 1);
        assert_eq!(
            occurrences[0].recurrence_id.as_deref(),
            Some("2025-01-20T09:00:00+00:00")
        );
    }

    #[test]
    fn events_outside_window_are_dropped() {
        let ics = wrap(
            "BEGIN:VEVENT\r\nUID:past@example.com\r\nDTSTART:20241201T090000Z\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:far@example.com\r\nDTSTART:20270101T090000Z\r\nEND:VEVENT\r\n",
        );
        assert!(normalize(&ics).is_empty());
    }

    #[test]
    fn ongoing_event_at_window_start_is_kept() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
             UID:conference@example.com\r\n\
             DTSTART;VALUE=DATE:20241229\r\n\
             DTEND;VALUE=DATE:20250103\r\n\
             END:VEVENT\r\n",
        );
        let occurrences = normalize(&ics);
        assert_eq!(occurrences.len(), 1);
        assert!(occurrences[0].seconds_until_start < 0);
    }

    fn single(uid: &str, dtstart: &str) -> String {
        format!("BEGIN:VEVENT\r\nUID:{}\r\nDTSTART:{}\r\nEND:VEVENT\r\n", uid, dtstart)
    }

    #[test]
    fn occurrence_cap_bounds_output() {
        let options = NormalizeOptions::new().with_max_occurrences(10);
        let ics = wrap(&format!("{}{}", WEEKLY, single("other@example.com", "20250601T090000Z")));
        let occurrences = normalize_with(&ics, options);

        assert_eq!(occurrences.len(), 10);
        // The ten earliest Mondays, 2025-01-06 through 2025-03-10.
        assert!(!occurrences.iter().any(|o| o.uid == "other@example.com"));
        assert_eq!(occurrences[9].start.to_rfc3339(), "2025-03-10T09:00:00+00:00");
    }

    #[test]
    fn occurrence_cap_keeps_earliest_across_events() {
        let hourly = "BEGIN:VEVENT\r\n\
                      UID:heartbeat@example.com\r\n\
                      DTSTART:20241201T000000Z\r\n\
                      RRULE:FREQ=HOURLY\r\n\
                      END:VEVENT\r\n";
        let ics = wrap(&format!(
            "{}{}{}",
            single("kickoff@example.com", "20250101T130000Z"),
            hourly,
            single("offsite@example.com", "20250102T023000Z")
        ));
        let options = NormalizeOptions::new().with_max_occurrences(30);
        let occurrences = normalize_with(&ics, options);

        assert_eq!(occurrences.len(), 30);
        let uids: HashSet<_> = occurrences.iter().map(|o| o.uid.as_str()).collect();
        assert!(uids.contains("kickoff@example.com"));
        assert!(uids.contains("offsite@example.com"));
        assert!(occurrences.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn zero_cap_yields_nothing() {
        let options = NormalizeOptions::new().with_max_occurrences(0);
        let ics = wrap(&single("other@example.com", "20250301T090000Z"));
        assert!(normalize_with(&ics, options).is_empty());
    }

    #[test]
    fn out_of_range_duration_skips_only_that_event() {
        let ics = wrap(&format!(
            "BEGIN:VEVENT\r\n\
             UID:forever@example.com\r\n\
             DTSTART:20250301T090000Z\r\n\
             DURATION:P15000000W\r\n\
             END:VEVENT\r\n{}",
            single("normal@example.com", "20250302T090000Z")
        ));
        let occurrences = normalize(&ics);

        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].uid, "normal@example.com");
    }

    #[test]
    fn recurring_out_of_range_duration_does_not_panic() {
        let ics = wrap(&format!(
            "BEGIN:VEVENT\r\n\
             UID:forever@example.com\r\n\
             DTSTART:20250106T090000Z\r\n\
             DURATION:P15000000W\r\n\
             RRULE:FREQ=WEEKLY;COUNT=3\r\n\
             END:VEVENT\r\n{}",
            single("normal@example.com", "20250302T090000Z")
        ));
        let occurrences = normalize(&ics);
        assert_eq!(occurrences.len(), 1);
    }

    #[test]
    fn malformed_event_among_valid_ones_is_dropped() {
        let mut events = String::new();
        for day in 10..15 {
            let uid = format!("ok-{}@example.com", day);
            events.push_str(&single(&uid, &format!("202502{}T090000Z", day)));
        }
        events.push_str(&single("broken@example.com", "soon"));
        let occurrences = normalize(&wrap(&events));
        assert_eq!(occurrences.len(), 5);
        assert!(!occurrences.iter().any(|o| o.uid == "broken@example.com"));
    }

    #[test]
    fn bad_rule_skips_only_that_event() {
        let ics = wrap(&format!(
            "BEGIN:VEVENT\r\n\
             UID:bad@example.com\r\n\
             DTSTART:20250301T090000Z\r\n\
             RRULE:FREQ=OFTEN\r\n\
             END:VEVENT\r\n{}",
            single("good@example.com", "20250302T090000Z")
        ));
        let occurrences = normalize(&ics);
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].uid, "good@example.com");
    }

    #[test]
    fn unparseable_document_fails() {
        let source = CalendarSource::parse("https://example.com/cal.ics").unwrap();
        let feed = RawFeed::new(source, "\u{0}\u{1}binary garbage");
        let err = normalize_feed(&feed, &NormalizeOptions::new(), now()).unwrap_err();
        assert_eq!(err.code(), crate::error::FeedErrorCode::ParseError);
    }
}
