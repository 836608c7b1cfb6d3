//! HTTP feed fetcher implementation.
//!
//! This module provides a [`FeedClient`] that retrieves calendar documents
//! over HTTP(S).
//!
//! # Features
//!
//! - One streamed GET per feed, with content sniffing on the first bytes
//! - Separate sniff and overall timeouts
//! - Body size limit
//! - Typed classification of DNS, TLS, connection and timeout failures
//! - TLS configuration (can be disabled for testing)
//!
//! # Example
//!
//! ```ignore
//! use ical_events_feed::http::{FeedClient, FeedConfig};
//!
//! let client = FeedClient::new(FeedConfig::new())?;
//! let feed = client.get(&CalendarSource::parse("https://example.com/cal.ics")?).await?;
//! ```

mod client;
mod config;
mod dns;
mod sniff;

pub use client::FeedClient;
pub use config::FeedConfig;
pub use dns::{DnsLookupError, SystemResolver};
pub use sniff::{ContentKind, sniff};
