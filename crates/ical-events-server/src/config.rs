//! Server configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/ical-events/config.toml` by default. Every section and key is
//! optional.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ical_events_core::{TracingConfig, TracingOutputFormat};
use ical_events_feed::NormalizeOptions;
use ical_events_feed::http::FeedConfig;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::{ServerError, ServerResult};

/// Configuration for the ical-events server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener settings.
    pub server: ListenSettings,

    /// Feed fetching settings.
    pub feed: FeedSettings,

    /// Event window and expansion settings.
    pub events: NormalizeOptions,

    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenSettings {
    /// Address to listen on.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Seconds in-flight requests get to finish on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8076,
            shutdown_grace_secs: 10,
        }
    }
}

impl ListenSettings {
    /// Returns the `host:port` string to bind.
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Returns the shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Feed fetching settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Overall fetch timeout in seconds.
    pub timeout_secs: u64,

    /// Timeout for receiving the first bytes, in seconds.
    pub sniff_timeout_secs: u64,

    /// Largest accepted feed body.
    pub max_body_bytes: usize,

    /// User-Agent header; defaults to `ical-events/<version>`.
    pub user_agent: Option<String>,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            timeout_secs: FeedConfig::DEFAULT_TIMEOUT_SECS,
            sniff_timeout_secs: FeedConfig::DEFAULT_SNIFF_TIMEOUT_SECS,
            max_body_bytes: FeedConfig::DEFAULT_MAX_BODY_BYTES,
            user_agent: None,
            verify_tls: true,
        }
    }
}

impl FeedSettings {
    /// Converts to feed client configuration.
    pub fn to_feed_config(&self) -> FeedConfig {
        let mut config = FeedConfig::new()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_sniff_timeout(Duration::from_secs(self.sniff_timeout_secs))
            .with_max_body_bytes(self.max_body_bytes);
        if let Some(ref user_agent) = self.user_agent {
            config = config.with_user_agent(user_agent);
        }
        if !self.verify_tls {
            config = config.with_insecure_tls();
        }
        config
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,

    /// Output format.
    pub format: TracingOutputFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: TracingOutputFormat::Pretty,
        }
    }
}

impl LoggingSettings {
    /// Builds the tracing configuration. `debug` forces the debug level.
    pub fn tracing_config(&self, debug: bool) -> ServerResult<TracingConfig> {
        let level = if debug {
            Level::DEBUG
        } else {
            Level::from_str(&self.level).map_err(|_| {
                ServerError::config(format!("invalid log level '{}'", self.level))
            })?
        };
        Ok(TracingConfig::new(level, self.format))
    }
}

impl ServerConfig {
    /// Loads configuration from the default path, or defaults if it is absent.
    pub fn load() -> ServerResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServerError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ServerError::config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ServerError::config(format!("failed to serialize config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ical-events")
            .join("config.toml")
    }
}
