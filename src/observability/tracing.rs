//! Per-connection trace events.
//!
//! # Responsibilities
//! - Open a live event when a tracked connection is accepted
//! - Annotate it with the peer and local addresses
//! - Finish it when the connection closes
//!
//! # Design Decisions
//! - Optional: tracing disabled by default, it costs an allocation per connection
//! - Events live in the shared [`EventLog`] under `net.ServerConn.<name>`

use std::sync::Arc;

use crate::observability::events::{EventHandle, EventLog};

pub const FAMILY_PREFIX: &str = "net.ServerConn.";

/// Event family used for connections accepted by the listener called `name`.
pub fn family(name: &str) -> String {
    format!("{}{}", FAMILY_PREFIX, name)
}

/// How a connection's close side effects were triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Explicit close that succeeded.
    Closed,
    /// Explicit close whose underlying shutdown failed.
    Failed(String),
    /// The connection was dropped without an explicit close.
    Dropped,
}

/// Publishes connection lifecycle events for one tracker name.
#[derive(Debug, Clone)]
pub struct TraceTracker {
    family: String,
    log: Arc<EventLog>,
}

impl TraceTracker {
    pub fn new(name: &str) -> Self {
        Self::with_log(name, EventLog::global())
    }

    pub fn with_log(name: &str, log: Arc<EventLog>) -> Self {
        Self {
            family: family(name),
            log,
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Open the live event for a freshly accepted connection.
    pub fn begin_event(&self, peer: &str, local: &str) -> EventHandle {
        let handle = self.log.begin(self.family.clone(), peer);
        handle.printf(format!("accepted: {} -> {}", peer, local));
        handle
    }

    /// Record how the connection ended and take its event out of the live set.
    pub fn finish_event(handle: EventHandle, outcome: &CloseOutcome) {
        match outcome {
            CloseOutcome::Closed => handle.printf("closing"),
            CloseOutcome::Failed(err) => handle.errorf(format!("failed closing: {}", err)),
            CloseOutcome::Dropped => handle.printf("dropped"),
        }
        handle.finish();
    }
}
