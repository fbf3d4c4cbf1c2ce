//! Tracking options applied when a listener is wrapped.
//!
//! Options are independent flags resolved once at construction; the resolved
//! set is shared read-only by the listener and every connection it yields.

use std::time::Duration;

/// Tracker name used when none is given.
pub const DEFAULT_NAME: &str = "default";

/// Options controlling how a [`TrackedListener`](crate::net::TrackedListener)
/// observes its connections.
///
/// ```
/// use conntrack::net::TrackOptions;
///
/// let opts = TrackOptions::new().name("svc").with_tracing();
/// assert_eq!(opts.tracker_name(), "svc");
/// assert!(opts.metrics_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOptions {
    name: String,
    metrics: bool,
    tracing: bool,
    tcp_keepalive: Option<Duration>,
}

impl TrackOptions {
    /// Defaults: name `"default"`, metrics on, tracing off, no keep-alive change.
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            metrics: true,
            tracing: false,
            tcp_keepalive: None,
        }
    }

    /// Set the tracker name used as the metric label and event family suffix.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Publish a live trace event per connection.
    pub fn with_tracing(mut self) -> Self {
        self.tracing = true;
        self
    }

    /// Disable the accepted/closed/open metric series.
    pub fn without_metrics(mut self) -> Self {
        self.metrics = false;
        self
    }

    /// Enable TCP keep-alive on accepted connections with the given idle period.
    ///
    /// A zero period leaves the OS default untouched.
    pub fn tcp_keepalive(mut self, period: Duration) -> Self {
        self.tcp_keepalive = if period.is_zero() { None } else { Some(period) };
        self
    }

    pub fn tracker_name(&self) -> &str {
        &self.name
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics
    }

    pub fn tracing_enabled(&self) -> bool {
        self.tracing
    }

    pub fn keepalive(&self) -> Option<Duration> {
        self.tcp_keepalive
    }
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self::new()
    }
}
