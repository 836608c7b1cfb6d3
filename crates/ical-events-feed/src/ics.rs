//! ICS/iCalendar parsing utilities.
//!
//! This module parses iCalendar (RFC 5545) documents with the `icalendar`
//! crate and converts each VEVENT to a [`ParsedEvent`]. Property values are
//! read as text and interpreted here, so `TZID` and `VALUE=DATE` parameters
//! are never lost.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use icalendar::{Calendar, CalendarComponent, Component, Event, Property};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{FeedError, FeedResult};
use crate::raw_event::{ParsedEvent, RawEventTime};

/// The events of a parsed calendar document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarDocument {
    /// Well-formed events, in document order.
    pub events: Vec<ParsedEvent>,
    /// Number of VEVENTs dropped as malformed.
    pub skipped: usize,
}

/// Why a single VEVENT was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    /// No `UID` property.
    #[error("missing UID")]
    MissingUid,
    /// No `DTSTART` property.
    #[error("missing DTSTART")]
    MissingStart,
    /// A date or date-time property could not be read.
    #[error("invalid {property} value '{value}'")]
    InvalidTime {
        /// The property name.
        property: &'static str,
        /// The value as written.
        value: String,
    },
    /// `DURATION` could not be read.
    #[error("invalid DURATION value '{0}'")]
    InvalidDuration(String),
}

/// Parses a calendar document.
///
/// Each VEVENT is parsed on its own, so a malformed event (a broken property
/// line, a missing `UID` or an unreadable date) is dropped with a warning and
/// counted in [`CalendarDocument::skipped`] without affecting its neighbours.
///
/// # Errors
///
/// Returns a parse error if the text is not a VCALENDAR (missing
/// `BEGIN:VCALENDAR`/`END:VCALENDAR`).
pub fn parse_document(ics: &str) -> FeedResult<CalendarDocument> {
    let text = ics.trim_start_matches(|c: char| c == '\u{feff}' || c.is_whitespace());

    let first_line = text.lines().next().unwrap_or_default().trim();
    if !first_line.eq_ignore_ascii_case("BEGIN:VCALENDAR") {
        return Err(FeedError::parse("document does not start with BEGIN:VCALENDAR"));
    }

    let last_line = text.trim_end().lines().last().unwrap_or_default().trim();
    if !last_line.eq_ignore_ascii_case("END:VCALENDAR") {
        return Err(FeedError::parse("document is truncated (no END:VCALENDAR)"));
    }

    let blocks = event_blocks(text);
    let mut document = CalendarDocument {
        skipped: blocks.unterminated,
        ..Default::default()
    };
    if blocks.unterminated > 0 {
        warn!(count = blocks.unterminated, "Skipping unterminated events");
    }

    for block in &blocks.complete {
        let event = match parse_block(block) {
            Ok(event) => event,
            Err(reason) => {
                warn!(reason = %reason, "Skipping unparsable event");
                document.skipped += 1;
                continue;
            }
        };
        match parse_event(&event) {
            Ok(parsed) => {
                debug!(uid = %parsed.uid, summary = ?parsed.summary, "Parsed event from ICS");
                document.events.push(parsed);
            }
            Err(reason) => {
                warn!(
                    uid = ?text_property(&event, "UID"),
                    reason = %reason,
                    "Skipping malformed event"
                );
                document.skipped += 1;
            }
        }
    }

    Ok(document)
}

/// Raw VEVENT blocks of a document.
#[derive(Debug, Default)]
struct EventBlocks {
    /// `BEGIN:VEVENT` through `END:VEVENT`, folded lines included.
    complete: Vec<String>,
    /// Events still open when the calendar ended.
    unterminated: usize,
}

/// Splits the text into top-level VEVENT blocks.
///
/// Nested components such as VALARM stay inside their event. Folded
/// continuation lines never match a component boundary since they start with
/// whitespace.
fn event_blocks(text: &str) -> EventBlocks {
    let mut blocks = EventBlocks::default();
    let mut current: Option<String> = None;
    let mut depth = 0usize;

    for line in text.lines() {
        let marker = line.trim_end();
        let begins = component_name(marker, "BEGIN:");
        let ends = component_name(marker, "END:").is_some();

        match current.as_mut() {
            None => {
                if begins.is_some_and(|name| name.eq_ignore_ascii_case("VEVENT")) {
                    current = Some(format!("{}\r\n", marker));
                    depth = 1;
                }
            }
            Some(block) => {
                block.push_str(line.trim_end_matches('\r'));
                block.push_str("\r\n");
                if begins.is_some() {
                    depth += 1;
                } else if ends {
                    depth -= 1;
                    if depth == 0 {
                        blocks.complete.extend(current.take());
                    }
                }
            }
        }
    }

    if current.is_some() {
        blocks.unterminated += 1;
    }
    blocks
}

/// Returns the component name of a `BEGIN:`/`END:` line.
fn component_name<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    line.get(prefix.len()..).filter(|name| !name.is_empty())
}

/// Parses one VEVENT block with the grammar parser.
fn parse_block(block: &str) -> Result<Event, String> {
    let wrapped = format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{}END:VCALENDAR\r\n", block);
    let calendar = wrapped.parse::<Calendar>().map_err(|e| e.to_string())?;
    calendar
        .components
        .into_iter()
        .find_map(|component| match component {
            CalendarComponent::Event(event) => Some(event),
            _ => None,
        })
        .ok_or_else(|| "no VEVENT component".to_string())
}

/// Parses a single VEVENT component into a ParsedEvent.
fn parse_event(event: &Event) -> Result<ParsedEvent, MalformedEvent> {
    let uid = text_property(event, "UID").ok_or(MalformedEvent::MissingUid)?;
    let start = required_time(event, "DTSTART")?;

    let mut parsed = ParsedEvent::new(uid, start);
    parsed.summary = text_property(event, "SUMMARY");
    parsed.description = text_property(event, "DESCRIPTION");
    parsed.location = text_property(event, "LOCATION");
    parsed.url = text_property(event, "URL");
    parsed.status = text_property(event, "STATUS").map(|s| s.to_ascii_uppercase());
    parsed.rrule = text_property(event, "RRULE");

    parsed.end = optional_time(event, "DTEND")?;
    parsed.recurrence_id = optional_time(event, "RECURRENCE-ID")?;

    if let Some(value) = text_property(event, "DURATION") {
        let duration = parse_duration(&value).ok_or(MalformedEvent::InvalidDuration(value))?;
        parsed.duration = Some(duration);
    }

    parsed.exdates = time_list(event, "EXDATE");
    parsed.rdates = time_list(event, "RDATE");

    parsed.created = timestamp(event, "CREATED");
    parsed.last_modified = timestamp(event, "LAST-MODIFIED");

    Ok(parsed)
}

/// Returns every instance of a property, single or repeated.
fn properties<'a>(event: &'a Event, key: &str) -> Vec<&'a Property> {
    let mut found: Vec<&Property> = event.properties().get(key).into_iter().collect();
    if let Some(multi) = event.multi_properties().get(key) {
        found.extend(multi.iter());
    }
    found
}

/// Returns the unescaped text of a property, if present and non-empty.
fn text_property(event: &Event, key: &str) -> Option<String> {
    let value = event.properties().get(key)?.value().trim();
    if value.is_empty() {
        return None;
    }
    Some(unescape_text(value))
}

fn param<'a>(property: &'a Property, name: &str) -> Option<&'a str> {
    property
        .params()
        .get(name)
        .map(|p| p.value().trim_matches('"'))
}

fn required_time(event: &Event, key: &'static str) -> Result<RawEventTime, MalformedEvent> {
    optional_time(event, key)?.ok_or(MalformedEvent::MissingStart)
}

fn optional_time(event: &Event, key: &'static str) -> Result<Option<RawEventTime>, MalformedEvent> {
    let Some(property) = event.properties().get(key) else {
        return Ok(None);
    };
    let value = property.value();
    parse_icalendar_datetime(value, param(property, "TZID"))
        .map(Some)
        .ok_or_else(|| MalformedEvent::InvalidTime {
            property: key,
            value: value.to_string(),
        })
}

/// Reads a comma-separated list property such as `EXDATE` or `RDATE`.
///
/// Unreadable entries are dropped individually. `PERIOD` values keep only
/// their start.
fn time_list(event: &Event, key: &str) -> Vec<RawEventTime> {
    let mut times = Vec::new();
    for property in properties(event, key) {
        let tzid = param(property, "TZID");
        for item in property.value().split(',') {
            let item = item.split('/').next().unwrap_or_default();
            match parse_icalendar_datetime(item, tzid) {
                Some(time) => times.push(time),
                None => debug!(property = key, value = %item, "Ignoring unreadable date"),
            }
        }
    }
    times
}

/// Reads a timestamp property such as `CREATED` as UTC.
fn timestamp(event: &Event, key: &str) -> Option<DateTime<Utc>> {
    let property = event.properties().get(key)?;
    match parse_icalendar_datetime(property.value(), None)? {
        RawEventTime::Utc(dt) => Some(dt),
        RawEventTime::Floating(naive) => Some(naive.and_utc()),
        RawEventTime::Date(date) => Some(date.and_time(chrono::NaiveTime::MIN).and_utc()),
        RawEventTime::Zoned { local, .. } => Some(local.and_utc()),
    }
}

/// Parses an iCalendar date or date-time string.
///
/// Handles formats like:
/// - 20250205T100000Z (UTC)
/// - 20250205T100000 (floating, or zoned when `tzid` is given)
/// - 20250205 (date only)
pub fn parse_icalendar_datetime(s: &str, tzid: Option<&str>) -> Option<RawEventTime> {
    let s = s.trim();

    // Date only (YYYYMMDD)
    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        let date = NaiveDate::parse_from_str(s, "%Y%m%d").ok()?;
        return Some(RawEventTime::Date(date));
    }

    if let Some(utc) = s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        let dt = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some(RawEventTime::Utc(dt.and_utc()));
    }

    let local = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()?;
    match tzid {
        Some(tzid) if !tzid.is_empty() => Some(RawEventTime::Zoned {
            local,
            tzid: tzid.to_string(),
        }),
        _ => Some(RawEventTime::Floating(local)),
    }
}

/// Parses an RFC 5545 `DURATION` value such as `PT1H30M` or `-P1W`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (negative, rest) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let rest = rest.strip_prefix(['P', 'p'])?;

    let mut total = Duration::zero();
    let mut digits = String::new();
    let mut in_time = false;
    let mut seen_unit = false;

    for c in rest.chars() {
        match c.to_ascii_uppercase() {
            '0'..='9' => digits.push(c),
            'T' if digits.is_empty() && !in_time => in_time = true,
            unit => {
                let n: i64 = digits.parse().ok()?;
                digits.clear();
                let part = match (unit, in_time) {
                    ('W', false) => Duration::try_weeks(n)?,
                    ('D', false) => Duration::try_days(n)?,
                    ('H', true) => Duration::try_hours(n)?,
                    ('M', true) => Duration::try_minutes(n)?,
                    ('S', true) => Duration::try_seconds(n)?,
                    _ => return None,
                };
                total = total.checked_add(&part)?;
                seen_unit = true;
            }
        }
    }

    if !digits.is_empty() || !seen_unit {
        return None;
    }
    Some(if negative { -total } else { total })
}

/// Reverses RFC 5545 TEXT escaping.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ics() -> &'static str {
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Test//Test//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:test-event-1@example.com\r\n\
         DTSTART:20250205T100000Z\r\n\
         DTEND:20250205T110000Z\r\n\
         SUMMARY:Team Meeting\r\n\
         DESCRIPTION:Weekly sync meeting\\, bring notes\r\n\
         LOCATION:Conference Room A\r\n\
         URL:https://example.com/meetings/1\r\n\
         STATUS:confirmed\r\n\
         CREATED:20250101T090000Z\r\n\
         LAST-MODIFIED:20250102T090000Z\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    }

    fn all_day_ics() -> &'static str {
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         BEGIN:VEVENT\r\n\
         UID:all-day-1@example.com\r\n\
         DTSTART;VALUE=DATE:20250210\r\n\
         DTEND;VALUE=DATE:20250211\r\n\
         SUMMARY:Company Holiday\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    }

    fn wrap(events: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{}END:VCALENDAR\r\n", events)
    }

    fn vevent(uid: &str, dtstart: &str) -> String {
        format!(
            "BEGIN:VEVENT\r\nUID:{}\r\nDTSTART:{}\r\nSUMMARY:Event {}\r\nEND:VEVENT\r\n",
            uid, dtstart, uid
        )
    }

    #[test]
    fn parse_basic_event() {
        let document = parse_document(sample_ics()).unwrap();

        assert_eq!(document.events.len(), 1);
        assert_eq!(document.skipped, 0);
        let event = &document.events[0];

        assert_eq!(event.uid, "test-event-1@example.com");
        assert_eq!(event.summary.as_deref(), Some("Team Meeting"));
        assert_eq!(
            event.description.as_deref(),
            Some("Weekly sync meeting, bring notes")
        );
        assert_eq!(event.location.as_deref(), Some("Conference Room A"));
        assert_eq!(event.url.as_deref(), Some("https://example.com/meetings/1"));
        assert_eq!(event.status.as_deref(), Some("CONFIRMED"));
        assert!(event.created.is_some());
        assert!(event.last_modified.is_some());
        assert!(!event.is_all_day());
        assert!(matches!(event.end, Some(RawEventTime::Utc(_))));
    }

    #[test]
    fn parse_all_day_event() {
        let document = parse_document(all_day_ics()).unwrap();

        assert_eq!(document.events.len(), 1);
        let event = &document.events[0];

        assert_eq!(event.uid, "all-day-1@example.com");
        assert_eq!(event.summary.as_deref(), Some("Company Holiday"));
        assert!(event.is_all_day());
    }

    #[test]
    fn keeps_tzid_and_recurrence_properties() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
             UID:weekly@example.com\r\n\
             DTSTART;TZID=Europe/Berlin:20250106T090000\r\n\
             DURATION:PT30M\r\n\
             RRULE:FREQ=WEEKLY;BYDAY=MO\r\n\
             EXDATE;TZID=Europe/Berlin:20250113T090000,20250120T090000\r\n\
             RDATE;VALUE=DATE:20250301\r\n\
             END:VEVENT\r\n",
        );
        let document = parse_document(&ics).unwrap();
        let event = &document.events[0];

        assert_eq!(event.start.tzid(), Some("Europe/Berlin"));
        assert_eq!(event.duration, Some(Duration::minutes(30)));
        assert_eq!(event.rrule.as_deref(), Some("FREQ=WEEKLY;BYDAY=MO"));
        assert_eq!(event.exdates.len(), 2);
        assert!(event.exdates.iter().all(|t| t.tzid() == Some("Europe/Berlin")));
        assert_eq!(event.rdates.len(), 1);
        assert!(event.rdates[0].is_all_day());
    }

    #[test]
    fn reads_recurrence_id() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
             UID:series@example.com\r\n\
             RECURRENCE-ID:20250113T090000Z\r\n\
             DTSTART:20250113T100000Z\r\n\
             END:VEVENT\r\n",
        );
        let document = parse_document(&ics).unwrap();
        assert!(matches!(
            document.events[0].recurrence_id,
            Some(RawEventTime::Utc(_))
        ));
    }

    #[test]
    fn malformed_event_is_skipped() {
        let mut events = String::new();
        for i in 1..=5 {
            events.push_str(&vevent(&format!("ok-{}", i), "20250205T100000Z"));
        }
        // No UID
        events.push_str("BEGIN:VEVENT\r\nDTSTART:20250205T100000Z\r\nEND:VEVENT\r\n");

        let document = parse_document(&wrap(&events)).unwrap();
        assert_eq!(document.events.len(), 5);
        assert_eq!(document.skipped, 1);
    }

    #[test]
    fn broken_property_line_drops_only_its_event() {
        let events = format!(
            "{}BEGIN:VEVENT\r\nUID:broken\r\nDTSTART:20250205T100000Z\r\n\
             THIS LINE HAS NO COLON\r\nEND:VEVENT\r\n{}",
            vevent("first", "20250205T100000Z"),
            vevent("last", "20250206T100000Z")
        );
        let document = parse_document(&wrap(&events)).unwrap();

        let uids: Vec<&str> = document.events.iter().map(|e| e.uid.as_str()).collect();
        assert_eq!(uids, vec!["first", "last"]);
        assert_eq!(document.skipped, 1);
    }

    #[test]
    fn nested_alarm_and_timezone_are_tolerated() {
        let ics = wrap(
            "BEGIN:VTIMEZONE\r\n\
             TZID:Europe/Berlin\r\n\
             END:VTIMEZONE\r\n\
             BEGIN:VEVENT\r\n\
             UID:alarm@example.com\r\n\
             DTSTART:20250205T100000Z\r\n\
             SUMMARY:Folded\r\n \
             summary\r\n\
             BEGIN:VALARM\r\n\
             ACTION:DISPLAY\r\n\
             TRIGGER:-PT15M\r\n\
             END:VALARM\r\n\
             END:VEVENT\r\n",
        );
        let document = parse_document(&ics).unwrap();

        assert_eq!(document.events.len(), 1);
        assert_eq!(document.events[0].uid, "alarm@example.com");
        assert_eq!(document.skipped, 0);
    }

    #[test]
    fn unterminated_event_is_skipped() {
        let events = format!(
            "{}BEGIN:VEVENT\r\nUID:open\r\nDTSTART:20250205T100000Z\r\n",
            vevent("closed", "20250205T100000Z")
        );
        let document = parse_document(&wrap(&events)).unwrap();
        assert_eq!(document.events.len(), 1);
        assert_eq!(document.skipped, 1);
    }

    #[test]
    fn unreadable_start_is_skipped() {
        let events = format!(
            "{}{}",
            vevent("good", "20250205T100000Z"),
            vevent("bad", "next tuesday")
        );
        let document = parse_document(&wrap(&events)).unwrap();
        assert_eq!(document.events.len(), 1);
        assert_eq!(document.events[0].uid, "good");
        assert_eq!(document.skipped, 1);
    }

    #[test]
    fn rejects_non_calendar_text() {
        let err = parse_document("hello world").unwrap_err();
        assert_eq!(err.code(), crate::error::FeedErrorCode::ParseError);

        let err = parse_document("<html><body>nope</body></html>").unwrap_err();
        assert_eq!(err.code(), crate::error::FeedErrorCode::ParseError);
    }

    #[test]
    fn rejects_truncated_document() {
        let truncated = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:x\r\n";
        let err = parse_document(truncated).unwrap_err();
        assert_eq!(err.code(), crate::error::FeedErrorCode::ParseError);
    }

    #[test]
    fn tolerates_bom_and_empty_calendar() {
        let document = parse_document("\u{feff}BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n")
            .unwrap();
        assert!(document.events.is_empty());
    }

    #[test]
    fn parse_icalendar_datetime_forms() {
        assert!(matches!(
            parse_icalendar_datetime("20250205T143000Z", None),
            Some(RawEventTime::Utc(_))
        ));
        assert!(matches!(
            parse_icalendar_datetime("20250210", Some("Europe/Paris")),
            Some(RawEventTime::Date(_))
        ));
        assert!(matches!(
            parse_icalendar_datetime("20250205T143000", None),
            Some(RawEventTime::Floating(_))
        ));
        assert_eq!(
            parse_icalendar_datetime("20250205T143000", Some("America/New_York"))
                .and_then(|t| t.tzid().map(str::to_string)),
            Some("America/New_York".to_string())
        );
        assert!(parse_icalendar_datetime("2025-02-05", None).is_none());
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("PT1H30M"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration("P1W"), Some(Duration::weeks(1)));
        assert_eq!(parse_duration("P1DT2H"), Some(Duration::hours(26)));
        assert_eq!(parse_duration("-PT15M"), Some(Duration::minutes(-15)));
        assert_eq!(parse_duration("PT0S"), Some(Duration::zero()));
        assert_eq!(parse_duration("P"), None);
        assert_eq!(parse_duration("PT5"), None);
        assert_eq!(parse_duration("P1H"), None);
        assert_eq!(parse_duration("1H"), None);
    }

    #[test]
    fn unescapes_text() {
        assert_eq!(unescape_text("a\\, b\\; c\\nd\\\\e"), "a, b; c\nd\\e");
    }
}
