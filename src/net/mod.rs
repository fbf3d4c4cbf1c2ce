//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Raw listener (TCP, Unix, anything implementing transport::Listener)
//!     → listener.rs (TrackedListener::accept)
//!         → metrics: accepted_total++, open++
//!         → tracing: live event "net.ServerConn.<name>"
//!     → connection.rs (TrackedConnection, bytes pass through)
//!     → caller's protocol layer
//!
//! On close() or drop, exactly once:
//!     → metrics: closed_total++, open--
//!     → tracing: event finished
//! ```
//!
//! # Design Decisions
//! - The wrappers never alter transport results, only observe them
//! - Options are fixed at wrap time
//! - Metrics and tracing are independent observers on each connection

pub mod connection;
pub mod listener;
pub mod options;
pub mod transport;

pub use connection::{ConnectionId, TrackedConnection};
pub use listener::TrackedListener;
pub use options::TrackOptions;
pub use transport::{Connection, Listener};
