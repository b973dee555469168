//! Routing subsystem.
//!
//! # Routes
//! ```text
//! /          → handlers::status
//! /health    → handlers::health
//! /healthz   → handlers::health
//! (anything) → handlers::not_found
//! ```
//!
//! # Design Decisions
//! - Exact path matches, any method
//! - The not-found handler is the fallback, so unmatched paths get the JSON
//!   error shape
//! - The middleware pipeline wraps routes and fallback alike

use std::time::Duration;

use axum::{routing::any, Router};

use crate::http::handlers;
use crate::http::middleware::Pipeline;
use crate::http::server::AppState;

/// Build the service router with the standard middleware pipeline.
///
/// Handlers that run longer than `write_timeout` are answered with 408.
pub fn build_router(state: AppState, write_timeout: Duration) -> Router {
    let routes = Router::new()
        .route("/", any(handlers::status))
        .route("/health", any(handlers::health))
        .route("/healthz", any(handlers::health))
        .fallback(handlers::not_found)
        .with_state(state.clone());

    let pipeline = Pipeline::standard(write_timeout);
    tracing::debug!(stages = ?pipeline.stages(), "Router built");
    pipeline.wrap(routes, &state)
}
