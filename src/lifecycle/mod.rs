//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Bind listener → Log banner → Install signal handlers → Serve
//!
//! Shutdown (shutdown.rs):
//!     Reason broadcast → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: bind and signal installation errors are fatal
//! - Shutdown has a timeout: connections are forced closed after the deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownReason};
