//! Route handlers.
//!
//! Every handler runs behind the request log stage and reads its
//! [`RequestId`] through the extractor.

use std::time::Duration;

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::Response,
};
use serde::Serialize;

use crate::http::request::RequestId;
use crate::http::response::{json_response, timestamp_now};
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: &'static str,
    pub message: String,
    pub timestamp: String,
    pub request_id: u64,
    pub path: String,
    pub method: String,
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub uptime: String,
    pub uptime_ms: u64,
    pub timestamp: String,
    pub request_id: u64,
}

#[derive(Debug, Serialize)]
pub struct NotFoundBody {
    pub status: &'static str,
    pub message: &'static str,
    pub path: String,
    pub request_id: u64,
    pub timestamp: String,
}

/// `GET /`: confirms the service is answering on its port.
pub async fn status(
    State(state): State<AppState>,
    request_id: RequestId,
    method: Method,
    uri: Uri,
) -> Response {
    let body = StatusBody {
        status: "success",
        message: format!("Port {} is working fine", state.port),
        timestamp: timestamp_now(),
        request_id: request_id.as_u64(),
        path: uri.path().to_string(),
        method: method.to_string(),
    };
    json_response(StatusCode::OK, request_id, body)
}

/// `GET /health` and `GET /healthz`.
pub async fn health(State(state): State<AppState>, request_id: RequestId) -> Response {
    let uptime = state.uptime();
    let body = HealthBody {
        status: "healthy",
        uptime: format_uptime(uptime),
        uptime_ms: u64::try_from(uptime.as_millis()).unwrap_or(u64::MAX),
        timestamp: timestamp_now(),
        request_id: request_id.as_u64(),
    };
    json_response(StatusCode::OK, request_id, body)
}

/// Router fallback for unmatched paths.
pub async fn not_found(request_id: RequestId, uri: Uri) -> Response {
    let body = NotFoundBody {
        status: "error",
        message: "Resource not found",
        path: uri.path().to_string(),
        request_id: request_id.as_u64(),
        timestamp: timestamp_now(),
    };
    json_response(StatusCode::NOT_FOUND, request_id, body)
}

/// Render an uptime as `1h2m3.456s`, dropping leading zero units.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    let millis = uptime.subsec_millis();

    match (hours, minutes) {
        (0, 0) => format!("{seconds}.{millis:03}s"),
        (0, _) => format!("{minutes}m{seconds}.{millis:03}s"),
        _ => format!("{hours}h{minutes}m{seconds}.{millis:03}s"),
    }
}
