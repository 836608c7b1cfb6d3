//! Shutdown signals.
//!
//! SIGTERM and SIGINT request a graceful shutdown (Ctrl+C on non-Unix
//! platforms).

use std::future::Future;
use std::io;

use tracing::info;

/// Installs the signal handlers and returns a future that completes on the
/// first shutdown signal.
///
/// Handlers are installed before this returns, so a signal arriving before
/// the future is polled is not lost. Must be called within a Tokio runtime.
#[cfg(unix)]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    })
}

#[cfg(not(unix))]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
        }
    })
}
