//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGTERM and SIGINT handlers up front
//! - Resolve to whichever signal arrives first
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are installed before serving so a registration failure is a
//!   startup error, not a panic in a background task

use std::fmt;
use std::io;

/// Signals that trigger a graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Interrupt,
    Terminate,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Installed shutdown signal handlers.
#[cfg(unix)]
pub struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind as UnixSignal};

        Ok(Self {
            interrupt: signal(UnixSignal::interrupt())?,
            terminate: signal(UnixSignal::terminate())?,
        })
    }

    /// Wait for the next SIGINT or SIGTERM.
    pub async fn recv(&mut self) -> SignalKind {
        tokio::select! {
            _ = self.interrupt.recv() => SignalKind::Interrupt,
            _ = self.terminate.recv() => SignalKind::Terminate,
        }
    }
}

/// Installed shutdown signal handlers.
#[cfg(not(unix))]
pub struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    pub fn install() -> io::Result<Self> {
        Ok(Self)
    }

    /// Wait for Ctrl+C.
    pub async fn recv(&mut self) -> SignalKind {
        match tokio::signal::ctrl_c().await {
            Ok(()) => SignalKind::Interrupt,
            Err(e) => {
                tracing::error!(error = %e, "Ctrl+C handler failed");
                std::future::pending().await
            }
        }
    }
}
