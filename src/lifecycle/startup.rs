//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the listener on the configured port
//! - Log the effective configuration
//! - Install signal handlers and forward the first signal to the server
//! - Run the server and report how it stopped

use std::future::Future;

use crate::config::ServiceConfig;
use crate::http::server::{HttpServer, ServerError, ShutdownOutcome};
use crate::lifecycle::shutdown::{Shutdown, ShutdownReason};
use crate::lifecycle::signals::ShutdownSignals;
use crate::net::listener::{Listener, ListenerError};

/// Errors that end the process with a non-zero status.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Serve until SIGINT/SIGTERM or a fatal listener error.
pub async fn run(config: ServiceConfig) -> Result<ShutdownOutcome, StartupError> {
    let mut signals = ShutdownSignals::install().map_err(StartupError::Signals)?;
    run_until(config, async move { ShutdownReason::Signal(signals.recv().await) }).await
}

/// Serve until `shutdown` resolves or a fatal listener error.
///
/// The listener is bound before `shutdown` is polled, so a bind failure is
/// reported even if the trigger is already complete.
pub async fn run_until<F>(
    config: ServiceConfig,
    shutdown: F,
) -> Result<ShutdownOutcome, StartupError>
where
    F: Future<Output = ShutdownReason> + Send + 'static,
{
    let listener = Listener::bind(&config.bind_address()).await?;

    tracing::info!(
        port = %config.port,
        "Starting web server on http://localhost:{} ...",
        config.port
    );
    tracing::info!(
        read_timeout = ?config.read_timeout,
        write_timeout = ?config.write_timeout,
        idle_timeout = ?config.idle_timeout,
        shutdown_timeout = ?config.shutdown_timeout,
        "Server configuration"
    );

    let coordinator = Shutdown::new();
    let server_shutdown = coordinator.subscribe();
    tokio::spawn(async move {
        let reason = shutdown.await;
        coordinator.trigger(reason);
    });

    let outcome = HttpServer::new(config).run(listener, server_shutdown).await?;
    match outcome {
        ShutdownOutcome::Forced { dropped } => {
            tracing::warn!(dropped_connections = dropped, "Server stopped after forced close");
        }
        ShutdownOutcome::Graceful | ShutdownOutcome::ListenerClosed => {}
    }
    tracing::info!("Server stopped successfully");
    Ok(outcome)
}
