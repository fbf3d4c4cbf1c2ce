//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → accept loops stop → listeners closed
//!     open connections finish on their own and report their close
//! ```
//!
//! # Design Decisions
//! - Stopping a listener never touches per-connection counters

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
