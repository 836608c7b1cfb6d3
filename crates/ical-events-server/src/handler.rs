//! HTTP routes and request handlers.
//!
//! Routes:
//! - `GET /` - usage information
//! - `GET /healthz` - liveness probe
//! - `GET /events?url=<calendar-url>&limit=<N>` - upcoming events of a feed

use std::sync::Arc;

use chrono::Utc;
use ical_events_core::{EventsResponse, assemble};
use ical_events_feed::{FeedFetcher, NormalizeOptions, normalize_feed};
use salvo::prelude::Json;
use salvo::{Depot, FlowCtrl, Handler, Request, Response, Router, async_trait, handler};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::ApiError;
use crate::validate::validate_query;

/// State shared by all requests.
#[derive(Clone)]
pub struct AppState {
    fetcher: Arc<dyn FeedFetcher>,
    options: NormalizeOptions,
}

impl AppState {
    /// Creates state from a fetcher and normalization options.
    pub fn new(fetcher: Arc<dyn FeedFetcher>, options: NormalizeOptions) -> Self {
        Self { fetcher, options }
    }

    /// Returns the feed fetcher.
    pub fn fetcher(&self) -> &dyn FeedFetcher {
        self.fetcher.as_ref()
    }

    /// Returns the normalization options.
    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("fetcher", &self.fetcher.name())
            .field("options", &self.options)
            .finish()
    }
}

/// Hoop that makes [`AppState`] available to handlers through the depot.
pub struct StateInjector {
    state: AppState,
}

impl StateInjector {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Handler for StateInjector {
    async fn handle(
        &self,
        _req: &mut Request,
        depot: &mut Depot,
        _res: &mut Response,
        _ctrl: &mut FlowCtrl,
    ) {
        depot.inject(self.state.clone());
    }
}

fn state_from_depot(depot: &Depot) -> Result<AppState, ApiError> {
    depot
        .obtain::<AppState>()
        .cloned()
        .map_err(|_| ApiError::internal("application state not found in depot"))
}

#[derive(Debug, Serialize)]
struct Usage {
    service: &'static str,
    version: &'static str,
    usage: &'static str,
}

#[handler]
async fn index() -> Json<Usage> {
    Json(Usage {
        service: "ical-events",
        version: env!("CARGO_PKG_VERSION"),
        usage: "GET /events?url=<calendar-url>&limit=<N>",
    })
}

#[handler]
async fn healthz() -> &'static str {
    "OK"
}

/// `GET /events`: fetch, expand and return the events of a feed.
#[handler]
async fn events(req: &mut Request, depot: &mut Depot) -> Result<Json<EventsResponse>, ApiError> {
    let state = state_from_depot(depot)?;
    let url = req.query::<String>("url");
    let limit = req.query::<String>("limit");
    let query = validate_query(url.as_deref(), limit.as_deref())?;

    debug!(
        url = %query.source,
        limit = ?query.limit,
        fetcher = state.fetcher().name(),
        "Fetching feed"
    );
    let feed = state.fetcher().fetch(&query.source).await.inspect_err(|e| {
        warn!(url = %query.source, code = %e.code(), error = %e, "Feed fetch failed");
    })?;

    let options = *state.options();
    let now = Utc::now();
    let occurrences = tokio::task::spawn_blocking(move || normalize_feed(&feed, &options, now))
        .await
        .map_err(|e| {
            error!(url = %query.source, error = %e, "Normalization task failed");
            ApiError::internal("event processing failed")
        })?
        .inspect_err(|e| {
            warn!(url = %query.source, code = %e.code(), error = %e, "Feed could not be parsed");
        })?;

    let response = assemble(occurrences, query.limit);
    info!(url = %query.source, events = response.events.len(), "Served events");
    Ok(Json(response))
}

/// Builds the router with `state` injected for every request.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .hoop(StateInjector::new(state))
        .get(index)
        .push(Router::with_path("healthz").get(healthz))
        .push(Router::with_path("events").get(events))
}
