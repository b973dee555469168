//! Shutdown coordination.

use std::fmt;

use tokio::sync::broadcast;

use crate::lifecycle::signals::SignalKind;

/// Why the server is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An operating-system signal arrived.
    Signal(SignalKind),
    /// Shutdown was requested in-process.
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(kind) => write!(f, "{kind}"),
            ShutdownReason::Requested => write!(f, "shutdown requested"),
        }
    }
}

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<ShutdownReason>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self, reason: ShutdownReason) {
        tracing::debug!(
            reason = %reason,
            subscribers = self.receiver_count(),
            "Shutdown triggered"
        );
        // No subscribers means nothing is left to stop.
        let _ = self.tx.send(reason);
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
