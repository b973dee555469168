//! Response helpers shared by the handlers.
//!
//! # Design Decisions
//! - Every handler answers with JSON
//! - The request id is echoed in `X-Request-ID`
//! - Timestamps are RFC 3339 with second precision in the local offset

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Local, SecondsFormat};
use serde::Serialize;

use crate::http::request::RequestId;

/// Header echoing the request id back to the client.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Current time formatted for response bodies.
pub fn timestamp_now() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build a JSON response carrying the `X-Request-ID` header.
pub fn json_response<T: Serialize>(status: StatusCode, request_id: RequestId, body: T) -> Response {
    (
        status,
        [(X_REQUEST_ID, HeaderValue::from(request_id.as_u64()))],
        Json(body),
    )
        .into_response()
}
