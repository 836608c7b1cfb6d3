//! Calendar feed retrieval and normalization.
//!
//! This crate turns a calendar URL into a list of [`Occurrence`]s:
//!
//! - [`CalendarSource`] - A validated feed URL
//! - [`FeedFetcher`] - The trait feed retrieval goes through
//! - [`parse_document`] - Lenient iCalendar parsing into [`ParsedEvent`]s
//! - [`expand_event`] - Recurrence expansion within a window
//! - [`normalize_feed`] - The full pipeline from body to occurrences
//! - [`FeedError`] - Typed failures, classified for HTTP mapping
//!
//! # Architecture
//!
//! ```text
//!        ┌──────────────────┐
//!        │  CalendarSource  │
//!        └────────┬─────────┘
//!                 │ FeedFetcher::fetch()
//!                 ▼
//!        ┌──────────────────┐
//!        │     RawFeed      │
//!        └────────┬─────────┘
//!                 │ parse_document()
//!                 ▼
//!        ┌──────────────────┐
//!        │   ParsedEvent    │
//!        └────────┬─────────┘
//!                 │ expand_event() + overrides
//!                 ▼
//!        ┌──────────────────┐
//!        │    Occurrence    │
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ical_events_feed::{CalendarSource, FeedFetcher, NormalizeOptions, normalize_feed};
//!
//! async fn upcoming(fetcher: &dyn FeedFetcher, url: &str) -> FeedResult<Vec<Occurrence>> {
//!     let source = CalendarSource::parse(url)?;
//!     let feed = fetcher.fetch(&source).await?;
//!     normalize_feed(&feed, &NormalizeOptions::new(), Utc::now())
//! }
//! ```

pub mod error;
pub mod expand;
#[cfg(feature = "http")]
pub mod http;
pub mod ics;
pub mod normalize;
pub mod provider;
pub mod raw_event;
pub mod source;

// Re-export main types at crate root
pub use error::{FeedError, FeedErrorCode, FeedResult};
pub use expand::{ExpandError, Expansion, expand_event, resolve_time};
pub use ical_events_core::Occurrence;
pub use ics::{CalendarDocument, parse_document};
pub use normalize::{NormalizeOptions, normalize_document, normalize_feed};
pub use provider::{BoxFuture, FeedFetcher, RawFeed};
pub use raw_event::{ParsedEvent, RawEventTime};
pub use source::{CalendarSource, InvalidUrl};
