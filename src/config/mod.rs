//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment (PORT, LOG_FORMAT, METRICS_ADDR)
//!     → loader.rs (read variables, apply defaults)
//!     → ServiceConfig (immutable)
//!     → owned by the lifecycle, cloned into the server
//! ```
//!
//! # Design Decisions
//! - Loading never fails; every field has a default
//! - Timeouts are fixed constants, only the port is operator-tunable
//! - The port string is not validated here; a bad value fails at bind time

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_from};
pub use schema::{LogFormat, ServiceConfig};
