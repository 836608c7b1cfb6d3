//! Final ordering and truncation of occurrences.

use serde::{Deserialize, Serialize};

use crate::occurrence::Occurrence;

/// The response body for a successful events query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsResponse {
    /// Occurrences ordered by start time.
    pub events: Vec<Occurrence>,
}

/// Orders occurrences by start and applies the optional limit.
///
/// The sort is stable, so occurrences sharing a start instant keep the order
/// the normalizer produced them in. That keeps repeated requests against an
/// unchanged feed deterministic. A limit of zero yields an empty list.
pub fn assemble(mut occurrences: Vec<Occurrence>, limit: Option<usize>) -> EventsResponse {
    occurrences.sort_by(|a, b| a.start.cmp(&b.start));

    if let Some(limit) = limit {
        occurrences.truncate(limit);
    }

    EventsResponse {
        events: occurrences,
    }
}
