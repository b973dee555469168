//! Status service.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client Request
//!   ──────────────▶ net::listener ─▶ net::connection ─▶ CORS ─▶ request log ─▶ handler
//!                                        │                                       │
//!   Client Response                      │                                       │
//!   ◀────────────────────────────────────┴──────────── JSON + X-Request-ID ◀─────┘
//!
//!   lifecycle: SIGINT/SIGTERM ─▶ drain (bounded) ─▶ force close ─▶ exit
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;

use status_service::config;
use status_service::lifecycle::startup;
use status_service::observability::{logging, metrics};

#[tokio::main]
async fn main() -> ExitCode {
    let config = config::load_config();

    if let Err(e) = logging::init_logging(config.log_format) {
        eprintln!("failed to initialize logging: {e}");
    }

    tracing::info!("status-service v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(address) = &config.metrics_address {
        match address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => {
                tracing::error!(metrics_address = %address, "Failed to parse metrics address");
            }
        }
    }

    match startup::run(config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server terminated with a fatal error");
            ExitCode::FAILURE
        }
    }
}
