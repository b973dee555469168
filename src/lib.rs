//! Status service library.
//!
//! A small HTTP service answering a status route and two health-check
//! aliases, with request logging, permissive CORS and graceful shutdown.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
