//! HTTP API serving upcoming events from iCalendar feeds.
//!
//! This crate provides the ical-events server that handles:
//! - Request validation for `GET /events`
//! - Mapping feed failures to HTTP statuses
//! - Configuration file and command-line handling
//! - Graceful shutdown on SIGINT/SIGTERM
//!
//! # Example
//!
//! ```rust,no_run
//! use ical_events_server::{ServerConfig, serve};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     serve(config).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
mod config;
mod error;
mod handler;
mod server;
mod signals;
mod validate;

pub use config::{FeedSettings, ListenSettings, LoggingSettings, ServerConfig};
pub use error::{ApiError, ErrorBody, ServerError, ServerResult};
pub use handler::{AppState, StateInjector, routes};
pub use server::{build_router, build_state, serve};
pub use signals::shutdown_signal;
pub use validate::{EventsQuery, validate_query};
