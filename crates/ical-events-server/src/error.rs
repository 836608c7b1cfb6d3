//! Server error types.

use std::io;

use ical_events_core::TracingError;
use ical_events_feed::{FeedError, FeedErrorCode, InvalidUrl};
use salvo::http::StatusCode;
use salvo::prelude::Json;
use salvo::{Response, Scribe};
use serde::Serialize;
use thiserror::Error;

/// Result type for server startup operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (config file, signal handlers, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The listen address could not be bound.
    #[error("Failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },

    /// The feed client could not be built.
    #[error("Feed client error: {0}")]
    Feed(#[from] FeedError),

    /// Tracing could not be initialized.
    #[error(transparent)]
    Tracing(#[from] TracingError),
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a bind error.
    pub fn bind(addr: impl Into<String>, message: impl ToString) -> Self {
        Self::Bind {
            addr: addr.into(),
            message: message.to_string(),
        }
    }
}

/// Errors returned to API callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The `url` query parameter is absent or empty.
    #[error("No URL provided")]
    MissingParameter,

    /// The `url` query parameter is not a usable feed URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] InvalidUrl),

    /// Another query parameter has an invalid value.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Fetching or parsing the feed failed.
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// Unexpected failure inside the server.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter | Self::InvalidUrl(_) | Self::InvalidParameter { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Feed(err) => feed_status(err.code()),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the response body for this error.
    ///
    /// Validation errors carry only `error`; feed and internal failures also
    /// carry `details`.
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::MissingParameter | Self::InvalidUrl(_) | Self::InvalidParameter { .. } => {
                ErrorBody {
                    error: self.to_string(),
                    details: None,
                }
            }
            Self::Feed(err) => ErrorBody {
                error: feed_summary(err.code()),
                details: Some(err.message().to_string()),
            },
            Self::Internal(message) => ErrorBody {
                error: "Internal error".to_string(),
                details: Some(message.clone()),
            },
        }
    }
}

impl Scribe for ApiError {
    fn render(self, res: &mut Response) {
        res.status_code(self.status());
        res.render(Json(self.body()));
    }
}

fn feed_status(code: FeedErrorCode) -> StatusCode {
    match code {
        FeedErrorCode::NotACalendar | FeedErrorCode::ParseError => StatusCode::BAD_REQUEST,
        FeedErrorCode::ConnectionFailed => StatusCode::SERVICE_UNAVAILABLE,
        FeedErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FeedErrorCode::TlsError
        | FeedErrorCode::DnsError
        | FeedErrorCode::UpstreamHttpError { .. }
        | FeedErrorCode::NetworkError
        | FeedErrorCode::PayloadTooLarge => StatusCode::BAD_GATEWAY,
        FeedErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn feed_summary(code: FeedErrorCode) -> String {
    match code {
        FeedErrorCode::NotACalendar => "URL does not point to a calendar".to_string(),
        FeedErrorCode::ParseError => "Failed to parse calendar".to_string(),
        FeedErrorCode::ConnectionFailed => "Could not connect to calendar server".to_string(),
        FeedErrorCode::Timeout => "Timed out fetching calendar".to_string(),
        FeedErrorCode::TlsError => "TLS error while fetching calendar".to_string(),
        FeedErrorCode::DnsError => "Could not resolve calendar host".to_string(),
        FeedErrorCode::UpstreamHttpError { status } => {
            format!("Calendar server returned HTTP {}", status)
        }
        FeedErrorCode::NetworkError => "Network error while fetching calendar".to_string(),
        FeedErrorCode::PayloadTooLarge => "Calendar is too large".to_string(),
        FeedErrorCode::InternalError => "Internal error".to_string(),
    }
}
