//! HTTP server lifecycle: bind, serve, shut down gracefully.

use std::sync::Arc;

use ical_events_feed::http::FeedClient;
use salvo::conn::TcpListener;
use salvo::logging::Logger;
use salvo::{Listener, Router, Server};
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{AppState, routes};
use crate::signals::shutdown_signal;

/// Builds the application state from configuration.
pub fn build_state(config: &ServerConfig) -> ServerResult<AppState> {
    let client = FeedClient::new(config.feed.to_feed_config())?;
    Ok(AppState::new(Arc::new(client), config.events))
}

/// Builds the full router, access logging included.
pub fn build_router(state: AppState) -> Router {
    Router::new().hoop(Logger::new()).push(routes(state))
}

/// Runs the server until SIGINT or SIGTERM.
pub async fn serve(config: ServerConfig) -> ServerResult<()> {
    let state = build_state(&config)?;
    let addr = config.server.bind_addr();

    let shutdown = shutdown_signal()?;

    let acceptor = TcpListener::new(addr.clone())
        .try_bind()
        .await
        .map_err(|e| ServerError::bind(&addr, e))?;

    info!(
        addr = %addr,
        window_days = config.events.window_days,
        floating_time = config.events.floating_time.as_str(),
        "Listening"
    );

    let server = Server::new(acceptor);
    let handle = server.handle();
    let grace = config.server.shutdown_grace();
    tokio::spawn(async move {
        shutdown.await;
        info!(grace_secs = grace.as_secs(), "Shutting down");
        handle.stop_graceful(grace);
    });

    server.serve(build_router(state)).await;
    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvo::http::StatusCode;
    use salvo::test::TestClient;

    #[tokio::test]
    async fn state_from_default_config() {
        let state = build_state(&ServerConfig::default()).unwrap();
        assert_eq!(state.fetcher().name(), "http");
        assert_eq!(state.options().window_days, 365);
    }

    #[tokio::test]
    async fn router_serves_health() {
        let state = build_state(&ServerConfig::default()).unwrap();
        let res = TestClient::get("http://127.0.0.1:5800/healthz")
            .send(build_router(state))
            .await;
        assert_eq!(res.status_code, Some(StatusCode::OK));
    }
}
