//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept)
//!     → connection.rs (HTTP/1.1 serving, timeouts, lifecycle tracking)
//!     → Hand off to the axum router
//!
//! Server phases (published to every connection):
//!     Serving → Draining → Closed
//! ```
//!
//! # Design Decisions
//! - Each connection is tracked so shutdown can wait for the count to reach zero
//! - Draining lets in-flight requests finish; Closed drops connections outright
//! - Timeouts are enforced here, not by the handlers

pub mod connection;
pub mod listener;
