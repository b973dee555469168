//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! net::connection (hyper HTTP/1.1)
//!     → server.rs (router)
//!     → middleware/ (CORS, request log with id assignment, write timeout)
//!     → handlers.rs (status, health, not found)
//!     → response.rs (JSON body, X-Request-ID)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestIdCounter};
pub use response::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServerError, ShutdownOutcome};
