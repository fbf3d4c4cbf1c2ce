//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Tracked listeners and connections produce:
//!     → registry.rs (one set of series per tracker name)
//!     → metrics.rs (accepted/closed counters, open gauge)
//!     → tracing.rs → events.rs (live per-connection events)
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → Metrics endpoint (Prometheus scrape, see debug/)
//!     → Live event page (/debug/events)
//!     → Log aggregation (stdout)
//! ```
//!
//! # Design Decisions
//! - Metrics are cheap (atomic increments) and on by default
//! - Tracing is optional to reduce overhead when not needed
//! - A missing backend degrades to a no-op, never to an error on the traffic path

pub mod events;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod tracing;
