//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Hold the application state shared by handlers and middleware
//! - Run the accept loop on a background task
//! - Race the accept loop against the shutdown signal
//! - Drain connections within the shutdown timeout, then force them closed

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use tokio::sync::{broadcast, oneshot};

use crate::config::ServiceConfig;
use crate::http::request::RequestIdCounter;
use crate::lifecycle::shutdown::ShutdownReason;
use crate::net::connection::{serve_connection, ConnectionSettings, ConnectionTracker};
use crate::net::listener::{Listener, ListenerError};
use crate::routing;

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub request_ids: Arc<RequestIdCounter>,
    pub started_at: Instant,
    pub port: Arc<str>,
}

impl AppState {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            request_ids: Arc::new(RequestIdCounter::new()),
            started_at: Instant::now(),
            port: Arc::from(config.port.as_str()),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Fatal server errors. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("listener failed: {0}")]
    Listener(#[from] ListenerError),
    #[error("accept loop terminated unexpectedly")]
    AcceptLoopLost,
}

/// How the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every connection finished within the shutdown timeout.
    Graceful,
    /// The timeout elapsed; `dropped` connections were closed forcibly.
    Forced { dropped: u64 },
    /// The accept loop ended on its own without an error.
    ListenerClosed,
}

/// HTTP server for the status service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a server with the status, health and not-found routes.
    pub fn new(config: ServiceConfig) -> Self {
        let state = AppState::new(&config);
        let router = routing::build_router(state, config.write_timeout);
        Self::with_router(config, router)
    }

    /// Serve an arbitrary router with this server's transport and lifecycle.
    ///
    /// The router is served as given; the write timeout is a pipeline stage.
    pub fn with_router(config: ServiceConfig, router: Router) -> Self {
        Self { router, config }
    }

    /// Serve on `listener` until `shutdown` fires or the accept loop fails.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<ShutdownReason>,
    ) -> Result<ShutdownOutcome, ServerError> {
        let tracker = ConnectionTracker::new();
        let settings = ConnectionSettings {
            read_timeout: self.config.read_timeout,
            idle_timeout: self.config.idle_timeout,
        };

        // Single-slot channel carrying the accept loop's terminal result.
        let (exit_tx, exit_rx) = oneshot::channel();
        let accept_tracker = tracker.clone();
        let router = self.router.clone();
        tokio::spawn(async move {
            let result = accept_loop(listener, router, settings, accept_tracker).await;
            let _ = exit_tx.send(result);
        });

        tokio::select! {
            exit = exit_rx => match exit {
                Ok(Ok(())) => {
                    tracing::info!("Listener closed");
                    Ok(ShutdownOutcome::ListenerClosed)
                }
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ServerError::AcceptLoopLost),
            },
            reason = shutdown.recv() => {
                let reason = reason.unwrap_or(ShutdownReason::Requested);
                tracing::info!(reason = %reason, "Received shutdown signal");
                Ok(self.drain(&tracker).await)
            }
        }
    }

    async fn drain(&self, tracker: &ConnectionTracker) -> ShutdownOutcome {
        let timeout = self.config.shutdown_timeout;
        tracing::info!(
            active_connections = tracker.active_count(),
            timeout = ?timeout,
            "Attempting graceful shutdown"
        );
        tracker.begin_drain();

        match tokio::time::timeout(timeout, tracker.wait_for_drain()).await {
            Ok(()) => ShutdownOutcome::Graceful,
            Err(_) => {
                let dropped = tracker.active_count();
                tracing::warn!(
                    active_connections = dropped,
                    timeout = ?timeout,
                    "Could not gracefully shutdown the server, forcing close"
                );
                tracker.force_close();
                ShutdownOutcome::Forced { dropped }
            }
        }
    }
}

/// Accept connections until the tracker leaves the serving phase.
async fn accept_loop(
    listener: Listener,
    router: Router,
    settings: ConnectionSettings,
    tracker: ConnectionTracker,
) -> Result<(), ServerError> {
    let mut phase = tracker.subscribe();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    let guard = tracker.track();
                    tokio::spawn(serve_connection(
                        stream,
                        remote,
                        router.clone(),
                        settings,
                        guard,
                        tracker.subscribe(),
                    ));
                }
                Err(e) if e.is_connection_error() => {
                    tracing::debug!(error = %e, "Accept failed for a single connection");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Accept loop failed");
                    return Err(e.into());
                }
            },
            _ = phase.changed() => {
                tracing::debug!(phase = ?tracker.phase(), "Listener stopped accepting");
                return Ok(());
            }
        }
    }
}
