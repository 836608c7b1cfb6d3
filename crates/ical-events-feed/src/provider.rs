//! FeedFetcher trait definition.
//!
//! This module defines the [`FeedFetcher`] trait, the seam between the HTTP
//! surface and whatever retrieves calendar documents. The production
//! implementation is [`FeedClient`](crate::http::FeedClient); tests plug in
//! canned responders.

use std::future::Future;
use std::pin::Pin;

use crate::error::FeedResult;
use crate::source::CalendarSource;

/// A calendar document as retrieved from its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFeed {
    /// The URL the document was fetched from.
    pub source: CalendarSource,
    /// The declared `Content-Type`, if the upstream sent one.
    pub content_type: Option<String>,
    /// The document text.
    pub body: String,
}

impl RawFeed {
    /// Creates a raw feed from a source and its body.
    pub fn new(source: CalendarSource, body: impl Into<String>) -> Self {
        Self {
            source,
            content_type: None,
            body: body.into(),
        }
    }

    /// Builder method to set the declared content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A boxed future for async trait methods.
///
/// Boxing keeps the trait object-safe so it can be shared as
/// `Arc<dyn FeedFetcher>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Retrieves calendar documents.
///
/// Implementations must classify every failure into a
/// [`FeedErrorCode`](crate::error::FeedErrorCode); they never retry.
pub trait FeedFetcher: Send + Sync {
    /// Returns a short name for this fetcher, used in logs.
    fn name(&self) -> &str;

    /// Fetches the document at `source`.
    ///
    /// # Errors
    ///
    /// Returns a [`FeedError`](crate::error::FeedError) for transport
    /// failures, upstream error statuses, and payloads that are evidently not
    /// calendars.
    fn fetch<'a>(&'a self, source: &'a CalendarSource) -> BoxFuture<'a, FeedResult<RawFeed>>;
}
