//! Connection tracking for stream listeners.
//!
//! Wrap a listener in a [`TrackedListener`] and every connection it accepts
//! is counted in Prometheus-style series and, optionally, shown as a live
//! event on the debug page, without touching the code that accepts and
//! closes connections.
//!
//! ```no_run
//! use conntrack::net::{TrackOptions, TrackedListener};
//!
//! # async fn run() -> std::io::Result<()> {
//! let raw = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//! let mut listener = TrackedListener::new(raw, TrackOptions::new().name("svc").with_tracing());
//! let (mut conn, _peer) = listener.accept().await?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod debug;
pub mod echo;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ConntrackConfig;
pub use lifecycle::Shutdown;
pub use net::{TrackOptions, TrackedConnection, TrackedListener};
