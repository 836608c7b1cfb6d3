//! Raw event type parsed from a calendar document.
//!
//! This module defines [`ParsedEvent`], the VEVENT fields the normalizer
//! needs, kept exactly as the document states them. Times stay in their
//! declared form ([`RawEventTime`]) until the normalizer pins them to
//! instants.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// A date or date-time value as written in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEventTime {
    /// A date without time of day (`VALUE=DATE`).
    Date(NaiveDate),
    /// A UTC date-time (`...Z`).
    Utc(DateTime<Utc>),
    /// A date-time with no zone information.
    Floating(NaiveDateTime),
    /// A date-time qualified by a `TZID` parameter.
    Zoned {
        /// Wall-clock time in the named zone.
        local: NaiveDateTime,
        /// The zone identifier as written.
        tzid: String,
    },
}

impl RawEventTime {
    /// Returns true if this is a date value.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Returns the wall-clock value; dates map to midnight.
    pub fn naive_local(&self) -> NaiveDateTime {
        match self {
            Self::Date(date) => date.and_time(NaiveTime::MIN),
            Self::Utc(dt) => dt.naive_utc(),
            Self::Floating(naive) => *naive,
            Self::Zoned { local, .. } => *local,
        }
    }

    /// Returns the zone identifier, if one was declared.
    pub fn tzid(&self) -> Option<&str> {
        match self {
            Self::Zoned { tzid, .. } => Some(tzid),
            _ => None,
        }
    }
}

/// A VEVENT as parsed from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    /// The event UID.
    pub uid: String,
    /// The event summary.
    pub summary: Option<String>,
    /// The event description.
    pub description: Option<String>,
    /// The event location.
    pub location: Option<String>,
    /// The `URL` property.
    pub url: Option<String>,
    /// The raw `STATUS` value, uppercased.
    pub status: Option<String>,
    /// `DTSTART`.
    pub start: RawEventTime,
    /// `DTEND`, if present.
    pub end: Option<RawEventTime>,
    /// `DURATION`, if present.
    pub duration: Option<Duration>,
    /// The `RRULE` value, if present.
    pub rrule: Option<String>,
    /// All `RDATE` values.
    pub rdates: Vec<RawEventTime>,
    /// All `EXDATE` values.
    pub exdates: Vec<RawEventTime>,
    /// `RECURRENCE-ID`, set on overrides of a recurring series.
    pub recurrence_id: Option<RawEventTime>,
    /// `CREATED`.
    pub created: Option<DateTime<Utc>>,
    /// `LAST-MODIFIED`.
    pub last_modified: Option<DateTime<Utc>>,
}

impl ParsedEvent {
    /// Creates an event with a UID and start; all other fields empty.
    pub fn new(uid: impl Into<String>, start: RawEventTime) -> Self {
        Self {
            uid: uid.into(),
            summary: None,
            description: None,
            location: None,
            url: None,
            status: None,
            start,
            end: None,
            duration: None,
            rrule: None,
            rdates: Vec::new(),
            exdates: Vec::new(),
            recurrence_id: None,
            created: None,
            last_modified: None,
        }
    }

    /// Returns true if this event defines more than one instance.
    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some() || !self.rdates.is_empty()
    }

    /// Returns true if the event is marked `STATUS:CANCELLED`.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("CANCELLED")
    }

    /// Returns true if this is a date-based event.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// Returns the summary, or an empty string.
    pub fn name(&self) -> &str {
        self.summary.as_deref().unwrap_or_default()
    }
}
