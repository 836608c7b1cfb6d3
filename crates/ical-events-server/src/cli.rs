//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ical_events_core::TracingOutputFormat;

use crate::config::ServerConfig;
use crate::error::ServerResult;

/// ical-events - Upcoming events from iCalendar feeds over HTTP
#[derive(Debug, Parser)]
#[command(name = "ical-events")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "ICAL_EVENTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "ICAL_EVENTS_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, short, env = "ICAL_EVENTS_PORT")]
    pub port: Option<u16>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format (pretty, compact, json)
    #[arg(long, env = "ICAL_EVENTS_LOG_FORMAT")]
    pub log_format: Option<TracingOutputFormat>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Print the effective configuration as TOML and exit
    CheckConfig,
}

impl Cli {
    /// Loads the configuration file and applies command-line overrides.
    ///
    /// An explicit `--config` path must exist; the default path may be absent.
    pub fn load_config(&self) -> ServerResult<ServerConfig> {
        let mut config = match self.config {
            Some(ref path) => ServerConfig::load_from(path)?,
            None => ServerConfig::load()?,
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    /// Applies command-line values on top of `config`.
    pub fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if self.debug {
            config.logging.level = "debug".to_string();
        }
    }
}
