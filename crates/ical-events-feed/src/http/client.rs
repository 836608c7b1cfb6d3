//! HTTP client for feed retrieval.
//!
//! This module provides the client that handles:
//! - A single streamed GET per feed
//! - Content sniffing on the first bytes of the body
//! - Body size limits
//! - Classification of transport failures into [`FeedErrorCode`]s

use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

use reqwest::{Client, Response, header};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{FeedError, FeedErrorCode, FeedResult};
use crate::provider::{BoxFuture, FeedFetcher, RawFeed};
use crate::source::CalendarSource;

use super::config::FeedConfig;
use super::dns::{DnsLookupError, SystemResolver};
use super::sniff::sniff;

/// HTTP client for fetching calendar feeds.
pub struct FeedClient {
    /// The underlying HTTP client.
    client: Client,
    /// Configuration.
    config: FeedConfig,
}

/// A response whose headers and leading bytes have been received.
struct Opened {
    response: Response,
    content_type: Option<String>,
    body: Vec<u8>,
    complete: bool,
}

impl FeedClient {
    /// Creates a new feed client with the given configuration.
    pub fn new(config: FeedConfig) -> FeedResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .dns_resolver(Arc::new(SystemResolver))
            .build()
            .map_err(|e| FeedError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self { client, config })
    }

    /// Fetches the document at `source`.
    ///
    /// Headers and the first [`FeedConfig::SNIFF_BYTES`] bytes must arrive
    /// within the sniff timeout. HTML responses are rejected at that point,
    /// before the rest of the body is downloaded.
    pub async fn get(&self, source: &CalendarSource) -> FeedResult<RawFeed> {
        debug!(url = %source, "Fetching feed");

        let sniff_timeout = self.config.effective_sniff_timeout();
        let mut opened = timeout(sniff_timeout, self.open(source))
            .await
            .map_err(|_| {
                FeedError::timeout(format!(
                    "{} did not respond within {}s",
                    source.host(),
                    sniff_timeout.as_secs_f32()
                ))
            })??;

        let kind = sniff(opened.content_type.as_deref(), &opened.body);
        trace!(url = %source, kind = ?kind, content_type = ?opened.content_type, "Sniffed feed");
        if !kind.should_proceed() {
            return Err(FeedError::not_a_calendar("html content"));
        }

        if !opened.complete {
            self.read_remaining(source, &mut opened).await?;
        }

        debug!(url = %source, bytes = opened.body.len(), "Fetched feed");

        let body = String::from_utf8_lossy(&opened.body).into_owned();
        let mut feed = RawFeed::new(source.clone(), body);
        feed.content_type = opened.content_type;
        Ok(feed)
    }

    /// Sends the request and reads up to the sniff prefix.
    async fn open(&self, source: &CalendarSource) -> FeedResult<Opened> {
        let response = self
            .client
            .get(source.url().clone())
            .send()
            .await
            .map_err(|e| classify(e, source))?;

        let status = response.status();
        trace!(status = %status, "Received response");

        if status.is_client_error() || status.is_server_error() {
            return Err(FeedError::upstream_http(
                status.as_u16(),
                format!("{} returned {}", source.host(), status),
            ));
        }

        if let Some(length) = response.content_length() {
            self.check_size(usize::try_from(length).unwrap_or(usize::MAX))?;
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut opened = Opened {
            response,
            content_type,
            body: Vec::new(),
            complete: false,
        };

        while opened.body.len() < FeedConfig::SNIFF_BYTES {
            match opened.response.chunk().await.map_err(|e| classify(e, source))? {
                Some(chunk) => {
                    opened.body.extend_from_slice(&chunk);
                    self.check_size(opened.body.len())?;
                }
                None => {
                    opened.complete = true;
                    break;
                }
            }
        }

        Ok(opened)
    }

    /// Reads the rest of the body, bounded by the client's overall timeout.
    async fn read_remaining(&self, source: &CalendarSource, opened: &mut Opened) -> FeedResult<()> {
        while let Some(chunk) = opened.response.chunk().await.map_err(|e| classify(e, source))? {
            opened.body.extend_from_slice(&chunk);
            self.check_size(opened.body.len())?;
        }
        opened.complete = true;
        Ok(())
    }

    fn check_size(&self, bytes: usize) -> FeedResult<()> {
        if bytes > self.config.max_body_bytes {
            return Err(FeedError::payload_too_large(format!(
                "feed exceeds {} bytes",
                self.config.max_body_bytes
            )));
        }
        Ok(())
    }
}

impl FeedFetcher for FeedClient {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch<'a>(&'a self, source: &'a CalendarSource) -> BoxFuture<'a, FeedResult<RawFeed>> {
        Box::pin(self.get(source))
    }
}

/// Converts a reqwest error into a classified feed error.
fn classify(err: reqwest::Error, source: &CalendarSource) -> FeedError {
    let code = classify_code(&err);
    let message = match code {
        FeedErrorCode::Timeout => format!("request to {} timed out", source.host()),
        FeedErrorCode::DnsError => format!("could not resolve {}", source.host()),
        FeedErrorCode::TlsError => format!("TLS handshake with {} failed", source.host()),
        FeedErrorCode::ConnectionFailed => format!("could not connect to {}", source.host()),
        _ => format!("request to {} failed", source.host()),
    };
    FeedError::new(code, message).with_source(err)
}

/// Picks an error code by walking the typed source chain.
fn classify_code(err: &reqwest::Error) -> FeedErrorCode {
    if err.is_timeout() {
        return FeedErrorCode::Timeout;
    }
    if let Some(code) = classify_chain(err) {
        return code;
    }
    if err.is_connect() {
        FeedErrorCode::ConnectionFailed
    } else {
        FeedErrorCode::NetworkError
    }
}

/// Classifies the deepest recognizable cause below `root`.
///
/// DNS and TLS errors win over io kinds, since hyper reports a failed
/// handshake as an io error wrapping the rustls one.
fn classify_chain(root: &(dyn StdError + 'static)) -> Option<FeedErrorCode> {
    let chain = causes(root);
    chain
        .iter()
        .find_map(|cause| typed_cause(*cause))
        .or_else(|| chain.iter().find_map(|cause| io_cause(*cause)))
}

/// Lists `root` and everything below it.
///
/// `io::Error::source` skips the error it wraps, so io layers are unwrapped
/// with `get_ref` instead.
fn causes<'a>(root: &'a (dyn StdError + 'static)) -> Vec<&'a (dyn StdError + 'static)> {
    let mut found = Vec::new();
    let mut next = Some(root);
    while let Some(current) = next {
        found.push(current);
        next = match current.downcast_ref::<io::Error>().and_then(|e| e.get_ref()) {
            Some(inner) => Some(inner as &(dyn StdError + 'static)),
            None => current.source(),
        };
    }
    found
}

fn typed_cause(cause: &(dyn StdError + 'static)) -> Option<FeedErrorCode> {
    if cause.is::<DnsLookupError>() {
        Some(FeedErrorCode::DnsError)
    } else if cause.is::<rustls::Error>() {
        Some(FeedErrorCode::TlsError)
    } else {
        None
    }
}

fn io_cause(cause: &(dyn StdError + 'static)) -> Option<FeedErrorCode> {
    let io_err = cause.downcast_ref::<io::Error>()?;
    match io_err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::AddrNotAvailable => Some(FeedErrorCode::ConnectionFailed),
        io::ErrorKind::TimedOut => Some(FeedErrorCode::Timeout),
        _ => None,
    }
}
