//! Connection serving and lifecycle tracking.
//!
//! # Responsibilities
//! - Serve HTTP/1.1 on an accepted stream through the axum router
//! - Enforce the header read timeout and the keep-alive idle timeout
//! - Track live connections and follow the server phase for shutdown
//!
//! # Design Decisions
//! - Connection ids come from the tracker that owns them, not a global
//! - Draining asks hyper for a graceful close: in-flight requests finish,
//!   idle keep-alive connections close at once
//! - Closed drops the connection future, cutting the TCP stream

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::ConnectInfo, Router};
use hyper::{body::Incoming, server::conn::http1, Request};
use hyper_util::{
    rt::{TokioIo, TokioTimer},
    service::TowerToHyperService,
};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tower::ServiceExt;

use crate::observability::metrics;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Server phase as seen by connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    /// Accepting connections and requests.
    Serving,
    /// No new connections; in-flight requests finish, then connections close.
    Draining,
    /// Remaining connections are dropped.
    Closed,
}

/// Tracks active connections for graceful shutdown.
///
/// Clones share the same count and phase.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    /// Current count of active connections.
    active_count: Arc<AtomicU64>,
    /// Last issued connection id.
    last_id: Arc<AtomicU64>,
    /// Phase broadcast to every connection.
    phase: Arc<watch::Sender<ServerPhase>>,
}

impl ConnectionTracker {
    /// Create a new connection tracker in the serving phase.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ServerPhase::Serving);
        Self {
            active_count: Arc::new(AtomicU64::new(0)),
            last_id: Arc::new(AtomicU64::new(0)),
            phase: Arc::new(tx),
        }
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::record_connection_opened();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId(self.last_id.fetch_add(1, Ordering::Relaxed) + 1),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<ServerPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> ServerPhase {
        *self.phase.borrow()
    }

    /// Stop accepting and let connections finish their in-flight requests.
    pub fn begin_drain(&self) {
        self.phase.send_replace(ServerPhase::Draining);
    }

    /// Drop every remaining connection.
    pub fn force_close(&self) {
        self.phase.send_replace(ServerPhase::Closed);
    }

    /// Wait until all connections are closed.
    pub async fn wait_for_drain(&self) {
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        metrics::record_connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Per-connection transport timeouts.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub read_timeout: Duration,
    pub idle_timeout: Duration,
}

impl ConnectionSettings {
    fn idle_check_period(&self) -> Duration {
        self.idle_timeout
            .min(Duration::from_secs(1))
            .max(Duration::from_millis(10))
    }
}

/// Request activity on one connection, used for the idle timeout.
#[derive(Debug)]
struct Activity {
    opened: Instant,
    in_flight: AtomicUsize,
    /// Milliseconds after `opened` at which the last request finished.
    last_active_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            opened: Instant::now(),
            in_flight: AtomicUsize::new(0),
            last_active_ms: AtomicU64::new(0),
        }
    }

    fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight(Arc::clone(self))
    }

    /// How long the connection has had nothing in flight, `None` while busy.
    fn idle_for(&self) -> Option<Duration> {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return None;
        }
        let last = Duration::from_millis(self.last_active_ms.load(Ordering::SeqCst));
        Some(self.opened.elapsed().saturating_sub(last))
    }
}

struct InFlight(Arc<Activity>);

impl Drop for InFlight {
    fn drop(&mut self) {
        let now = u64::try_from(self.0.opened.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.0.last_active_ms.store(now, Ordering::SeqCst);
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serve one accepted connection until it closes or the server drops it.
pub async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    router: Router,
    settings: ConnectionSettings,
    guard: ConnectionGuard,
    mut phase: watch::Receiver<ServerPhase>,
) {
    let activity = Arc::new(Activity::new());
    let service = {
        let activity = Arc::clone(&activity);
        tower::service_fn(move |mut request: Request<Incoming>| {
            request.extensions_mut().insert(ConnectInfo(remote));
            let in_flight = activity.begin();
            let router = router.clone();
            async move {
                let response = router.oneshot(request).await;
                drop(in_flight);
                response
            }
        })
    };

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(settings.read_timeout)
        .keep_alive(true);
    let connection =
        builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(service));
    tokio::pin!(connection);

    let mut draining = false;
    match *phase.borrow_and_update() {
        ServerPhase::Serving => {}
        ServerPhase::Draining => {
            connection.as_mut().graceful_shutdown();
            draining = true;
        }
        ServerPhase::Closed => return,
    }

    let mut idle_check = tokio::time::interval(settings.idle_check_period());
    idle_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(
                        connection_id = %guard.id(),
                        peer_addr = %remote,
                        error = %e,
                        "Connection ended with error"
                    );
                }
                break;
            }
            changed = phase.changed() => {
                let next = match changed {
                    Ok(()) => *phase.borrow_and_update(),
                    Err(_) => ServerPhase::Closed,
                };
                match next {
                    ServerPhase::Serving => {}
                    ServerPhase::Draining => {
                        if !draining {
                            connection.as_mut().graceful_shutdown();
                            draining = true;
                        }
                    }
                    ServerPhase::Closed => {
                        tracing::debug!(
                            connection_id = %guard.id(),
                            peer_addr = %remote,
                            "Dropping connection"
                        );
                        break;
                    }
                }
            }
            _ = idle_check.tick(), if !draining => {
                if activity
                    .idle_for()
                    .is_some_and(|idle| idle >= settings.idle_timeout)
                {
                    tracing::debug!(
                        connection_id = %guard.id(),
                        peer_addr = %remote,
                        "Closing idle connection"
                    );
                    connection.as_mut().graceful_shutdown();
                    draining = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn connection_ids_unique() {
        let tracker = ConnectionTracker::new();
        let guard1 = tracker.track();
        let guard2 = tracker.track();
        assert_ne!(guard1.id(), guard2.id());
        assert_eq!(guard1.id().to_string(), "conn-1");
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn phase_transitions_reach_subscribers() {
        let tracker = ConnectionTracker::new();
        let rx = tracker.subscribe();
        assert_eq!(*rx.borrow(), ServerPhase::Serving);

        tracker.begin_drain();
        assert_eq!(*rx.borrow(), ServerPhase::Draining);

        tracker.force_close();
        assert_eq!(tracker.phase(), ServerPhase::Closed);
    }

    #[tokio::test]
    async fn wait_for_drain_returns_when_guards_drop() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_for_drain().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("drain should complete")
            .unwrap();
    }

    #[test]
    fn activity_tracks_in_flight() {
        let activity = Arc::new(Activity::new());
        assert!(activity.idle_for().is_some());

        let in_flight = activity.begin();
        assert!(activity.idle_for().is_none());

        drop(in_flight);
        assert!(activity.idle_for().unwrap() < Duration::from_secs(1));
    }

    async fn start_connection(
        settings: ConnectionSettings,
    ) -> (SocketAddr, ConnectionTracker, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let tracker = ConnectionTracker::new();
        let router = Router::new().route("/", get(|| async { "ok" }));

        let task = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                let (stream, remote) = listener.accept().await.unwrap();
                let guard = tracker.track();
                serve_connection(stream, remote, router, settings, guard, tracker.subscribe())
                    .await;
            })
        };
        (addr, tracker, task)
    }

    #[tokio::test]
    async fn idle_connection_is_closed() {
        let settings = ConnectionSettings {
            read_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_millis(100),
        };
        let (addr, tracker, task) = start_connection(settings).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("idle connection should close")
            .unwrap();
        assert_eq!(tracker.active_count(), 0);

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn force_close_drops_connection() {
        let settings = ConnectionSettings {
            read_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
        };
        let (addr, tracker, task) = start_connection(settings).await;

        let _client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.active_count(), 1);

        tracker.force_close();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("connection should be dropped")
            .unwrap();
        assert_eq!(tracker.active_count(), 0);
    }
}
