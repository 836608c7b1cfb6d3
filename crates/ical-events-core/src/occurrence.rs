//! The occurrence record returned to API callers.
//!
//! An [`Occurrence`] is one concrete, dated instance of a calendar event. A
//! recurring series produces one occurrence per expanded instance; a single
//! event produces exactly one. Occurrences are built once during
//! normalization and never mutated afterwards.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// One concrete instance of a calendar event.
///
/// `start` and `end` always carry an explicit UTC offset, so they serialize
/// as RFC 3339 timestamps that round-trip without ambiguity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// The event summary, empty if the source has none.
    pub name: String,
    /// When this occurrence starts.
    pub start: DateTime<FixedOffset>,
    /// When this occurrence ends.
    pub end: DateTime<FixedOffset>,
    /// Whether the source event is date-based (no time of day).
    pub all_day: bool,
    /// Seconds between normalization time and `start`; negative for past events.
    #[serde(rename = "secondsUntilStart")]
    pub seconds_until_start: i64,
    /// The event's `URL` property.
    pub url: Option<String>,
    /// The event's description.
    pub description: Option<String>,
    /// The event's location.
    pub location: Option<String>,
    /// The raw iCalendar status (e.g. `CONFIRMED`, `TENTATIVE`).
    pub status: Option<String>,
    /// When the event was created.
    pub created: Option<DateTime<Utc>>,
    /// When the event was last modified.
    pub last_modified: Option<DateTime<Utc>>,
    /// Identifier of the parent event series.
    pub uid: String,
    /// Identifies this instance within a recurring series.
    pub recurrence_id: Option<String>,
}

impl Occurrence {
    /// Creates an occurrence, computing `seconds_until_start` against `now`.
    pub fn new(
        uid: impl Into<String>,
        name: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            all_day: false,
            seconds_until_start: (start.with_timezone(&Utc) - now).num_seconds(),
            url: None,
            description: None,
            location: None,
            status: None,
            created: None,
            last_modified: None,
            uid: uid.into(),
            recurrence_id: None,
        }
    }

    /// Builder method to mark as all-day.
    pub fn with_all_day(mut self, all_day: bool) -> Self {
        self.all_day = all_day;
        self
    }

    /// Builder method to set the URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Builder method to set the creation timestamp.
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    /// Builder method to set the last-modified timestamp.
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Builder method to set the recurrence identifier.
    pub fn with_recurrence_id(mut self, recurrence_id: impl Into<String>) -> Self {
        self.recurrence_id = Some(recurrence_id.into());
        self
    }
}
