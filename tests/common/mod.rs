//! Shared utilities for integration testing.

use std::net::SocketAddr;

use axum::Router;
use status_service::config::ServiceConfig;
use status_service::http::{HttpServer, ServerError, ShutdownOutcome};
use status_service::lifecycle::{Shutdown, ShutdownReason};
use status_service::net::listener::Listener;
use tokio::task::JoinHandle;

/// A server running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<ShutdownOutcome, ServerError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server to stop.
    #[allow(dead_code)]
    pub async fn stop(self) -> Result<ShutdownOutcome, ServerError> {
        self.shutdown.trigger(ShutdownReason::Requested);
        self.handle.await.expect("server task panicked")
    }
}

/// Start the service with its standard routes.
#[allow(dead_code)]
pub async fn start_server(config: ServiceConfig) -> TestServer {
    start(HttpServer::new(config)).await
}

/// Start an arbitrary router behind the service transport.
#[allow(dead_code)]
pub async fn start_with_router(config: ServiceConfig, router: Router) -> TestServer {
    start(HttpServer::with_router(config, router)).await
}

async fn start(server: HttpServer) -> TestServer {
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    let handle = tokio::spawn(server.run(listener, server_shutdown));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Client that never reuses connections or goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
