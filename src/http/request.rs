//! Request identifiers.
//!
//! # Responsibilities
//! - Issue a unique, strictly increasing id per request
//! - Carry the id from the request log stage to the handlers
//!
//! # Design Decisions
//! - The counter is owned by the application state, not a process global
//! - The request log stage wraps every route and the fallback, so handlers
//!   can rely on the id being present; a missing id is a wiring bug and is
//!   reported as a 500, never a panic

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// Identifier assigned to a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of request ids.
///
/// Ids start at 1. Relaxed ordering is enough since only uniqueness is needed,
/// `fetch_add` alone guarantees it.
#[derive(Debug, Default)]
pub struct RequestIdCounter {
    last: AtomicU64,
}

impl RequestIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next id.
    pub fn next(&self) -> RequestId {
        RequestId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Number of ids issued so far.
    #[cfg(test)]
    pub fn issued(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = MissingRequestId;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestId>()
            .copied()
            .ok_or(MissingRequestId)
    }
}

/// Rejection for a handler mounted outside the request log stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingRequestId;

impl IntoResponse for MissingRequestId {
    fn into_response(self) -> Response {
        tracing::error!("Request id missing from request extensions");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "status": "error",
                "message": "Request id unavailable",
            })),
        )
            .into_response()
    }
}
