//! Feed client configuration.

use std::time::Duration;

/// Configuration for the HTTP feed client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Overall request timeout, covering connect, headers and body.
    pub timeout: Duration,

    /// Timeout for receiving headers and the sniffed body prefix.
    pub sniff_timeout: Duration,

    /// Largest body accepted, in bytes.
    pub max_body_bytes: usize,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// User agent string.
    pub user_agent: String,
}

impl FeedConfig {
    /// Default overall timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default sniff timeout in seconds.
    pub const DEFAULT_SNIFF_TIMEOUT_SECS: u64 = 10;

    /// Default body size limit (10 MiB).
    pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

    /// Number of leading body bytes inspected before committing to a download.
    pub const SNIFF_BYTES: usize = 1024;

    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            sniff_timeout: Duration::from_secs(Self::DEFAULT_SNIFF_TIMEOUT_SECS),
            max_body_bytes: Self::DEFAULT_MAX_BODY_BYTES,
            verify_tls: true,
            user_agent: Self::default_user_agent(),
        }
    }

    /// Returns the user agent sent when none is configured.
    pub fn default_user_agent() -> String {
        format!("ical-events/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Sets the overall request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the sniff timeout.
    pub fn with_sniff_timeout(mut self, timeout: Duration) -> Self {
        self.sniff_timeout = timeout;
        self
    }

    /// Sets the body size limit.
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Disables TLS verification (for testing only).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the timeout that applies to the sniffing phase.
    ///
    /// Never longer than the overall timeout.
    pub fn effective_sniff_timeout(&self) -> Duration {
        self.sniff_timeout.min(self.timeout)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::new()
    }
}
