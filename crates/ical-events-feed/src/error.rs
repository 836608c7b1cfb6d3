//! Error types for feed retrieval and normalization.
//!
//! Every failure the fetcher or normalizer can produce is classified into a
//! [`FeedErrorCode`] at the point where it happens. Callers map codes to
//! outcomes; they never inspect message text.

use std::fmt;
use thiserror::Error;

/// The category of a feed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedErrorCode {
    /// The upstream served something that is not a calendar (e.g. HTML).
    NotACalendar,
    /// Connection refused, reset or unreachable.
    ConnectionFailed,
    /// The upstream did not answer within the configured timeout.
    Timeout,
    /// TLS handshake or certificate validation failed.
    TlsError,
    /// The upstream host name could not be resolved.
    DnsError,
    /// The upstream answered with a client or server error status.
    UpstreamHttpError {
        /// The HTTP status code returned by the upstream.
        status: u16,
    },
    /// Any other transport-level failure.
    NetworkError,
    /// The feed body exceeds the configured size limit.
    PayloadTooLarge,
    /// The document is not a parseable iCalendar document.
    ParseError,
    /// Unexpected state inside the pipeline.
    InternalError,
}

impl FeedErrorCode {
    /// Returns a stable snake_case name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotACalendar => "not_a_calendar",
            Self::ConnectionFailed => "connection_failed",
            Self::Timeout => "timeout",
            Self::TlsError => "tls_error",
            Self::DnsError => "dns_error",
            Self::UpstreamHttpError { .. } => "upstream_http_error",
            Self::NetworkError => "network_error",
            Self::PayloadTooLarge => "payload_too_large",
            Self::ParseError => "parse_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for FeedErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpstreamHttpError { status } => write!(f, "{}({})", self.as_str(), status),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// An error that occurred while fetching or normalizing a feed.
#[derive(Debug, Error)]
pub struct FeedError {
    code: FeedErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FeedError {
    /// Creates a new feed error with the given code and message.
    pub fn new(code: FeedErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a not-a-calendar error.
    pub fn not_a_calendar(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::NotACalendar, message)
    }

    /// Creates a connection error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::ConnectionFailed, message)
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::Timeout, message)
    }

    /// Creates a TLS error.
    pub fn tls(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::TlsError, message)
    }

    /// Creates a DNS resolution error.
    pub fn dns(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::DnsError, message)
    }

    /// Creates an upstream HTTP status error.
    pub fn upstream_http(status: u16, message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::UpstreamHttpError { status }, message)
    }

    /// Creates a generic network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::NetworkError, message)
    }

    /// Creates a payload-too-large error.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::PayloadTooLarge, message)
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::ParseError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::InternalError, message)
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> FeedErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;
