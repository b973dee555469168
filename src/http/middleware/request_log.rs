//! Request logging middleware.
//!
//! Assigns the request id, logs the request on the way in and its duration
//! on the way out.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::USER_AGENT,
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;
use crate::observability::metrics;

pub async fn request_log(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let request_id = state.request_ids.next();

    let method = request.method().clone();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        remote_addr = %remote_addr,
        user_agent = %user_agent,
        "Incoming request"
    );

    request.extensions_mut().insert(request_id);
    let response = next.run(request).await;

    let duration = start_time.elapsed();
    metrics::record_request(method.as_str(), response.status().as_u16(), duration);
    tracing::info!(
        request_id = %request_id,
        status = response.status().as_u16(),
        duration = ?duration,
        "Request completed"
    );

    response
}
