//! Middleware pipeline.
//!
//! # Data Flow
//! ```text
//! request
//!     → cors.rs (CORS headers, OPTIONS short-circuit)
//!     → request_log.rs (assign request id, log, metrics)
//!     → write timeout (408 once the handler overruns)
//!     → route handler
//! ```
//!
//! # Design Decisions
//! - The pipeline is an ordered list of stages; the first stage is outermost
//! - Stages are applied with `Router::layer`, so the fallback is wrapped too
//! - CORS runs before logging: preflight requests are answered without
//!   consuming a request id
//! - The write timeout is innermost, so a 408 still gets CORS headers, a
//!   request id and the completion log line

pub mod cors;
pub mod request_log;

use std::time::Duration;

use axum::{http::StatusCode, middleware, Router};
use tower_http::timeout::TimeoutLayer;

use crate::http::server::AppState;

/// A single transformation applied around the routed handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cors,
    RequestLog,
    /// Answer 408 when the inner handler runs longer than the duration.
    WriteTimeout(Duration),
}

impl Stage {
    fn apply(self, router: Router, state: &AppState) -> Router {
        match self {
            Stage::Cors => router.layer(middleware::from_fn(cors::cors)),
            Stage::RequestLog => router.layer(middleware::from_fn_with_state(
                state.clone(),
                request_log::request_log,
            )),
            Stage::WriteTimeout(limit) => router.layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                limit,
            )),
        }
    }
}

/// Ordered list of stages, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// CORS, then request logging, then the write timeout.
    pub fn standard(write_timeout: Duration) -> Self {
        Self::new(vec![
            Stage::Cors,
            Stage::RequestLog,
            Stage::WriteTimeout(write_timeout),
        ])
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Wrap `router` so a request passes through the stages in order.
    ///
    /// `Router::layer` makes the most recent layer the outermost, hence the
    /// reverse iteration.
    pub fn wrap(&self, router: Router, state: &AppState) -> Router {
        self.stages
            .iter()
            .rev()
            .fold(router, |router, stage| stage.apply(router, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::http::request::RequestId;
    use crate::http::middleware::cors::ALLOW_ORIGIN;
    use axum::{
        body::Body,
        http::{header, Method, Request},
        routing::get,
    };
    use tower::ServiceExt;

    async fn echo_id(id: RequestId) -> String {
        id.to_string()
    }

    fn app(pipeline: &Pipeline, state: &AppState) -> Router {
        pipeline.wrap(Router::new().route("/", get(echo_id)), state)
    }

    #[test]
    fn standard_order() {
        let limit = Duration::from_secs(15);
        assert_eq!(
            Pipeline::standard(limit).stages(),
            &[Stage::Cors, Stage::RequestLog, Stage::WriteTimeout(limit)]
        );
    }

    #[tokio::test]
    async fn preflight_does_not_consume_request_id() {
        let state = AppState::new(&ServiceConfig::default());
        let app = app(&Pipeline::standard(Duration::from_secs(15)), &state);

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(preflight).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.request_ids.issued(), 0);

        let get = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(get).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"1");
    }

    #[tokio::test]
    async fn log_before_cors_logs_preflight() {
        let state = AppState::new(&ServiceConfig::default());
        let pipeline = Pipeline::new(vec![Stage::RequestLog, Stage::Cors]);
        let app = app(&pipeline, &state);

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(preflight).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.request_ids.issued(), 1);
    }

    #[tokio::test]
    async fn missing_request_log_stage_is_a_server_error() {
        let state = AppState::new(&ServiceConfig::default());
        let app = app(&Pipeline::new(vec![Stage::Cors]), &state);

        let get = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(get).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn timed_out_request_keeps_cors_and_request_id() {
        async fn slow(_id: RequestId) -> &'static str {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }

        let state = AppState::new(&ServiceConfig::default());
        let pipeline = Pipeline::standard(Duration::from_millis(50));
        let app = pipeline.wrap(Router::new().route("/", get(slow)), &state);

        let get = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(get).await.unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], ALLOW_ORIGIN);
        assert_eq!(state.request_ids.issued(), 1);
    }
}
