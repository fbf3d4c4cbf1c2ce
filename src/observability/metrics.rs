//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the per-listener connection series
//! - Update them on accept/close with atomic operations only
//! - Install the Prometheus recorder the debug endpoint renders
//!
//! # Metrics
//! - `net_conntrack_listener_conn_accepted_total` (counter): connections accepted, by `listener_name`
//! - `net_conntrack_listener_conn_closed_total` (counter): connections closed, by `listener_name`
//! - `net_conntrack_listener_conn_open` (gauge): connections currently open, by `listener_name`
//!
//! # Design Decisions
//! - Goes through the `metrics` facade: with no recorder installed every update is a no-op
//! - Handles are resolved once per tracker name (see `registry.rs`), so a
//!   recorder must be installed before the first listener is wrapped

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{Counter, Gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::observability::registry::LabelRegistry;

pub const ACCEPTED_TOTAL: &str = "net_conntrack_listener_conn_accepted_total";
pub const CLOSED_TOTAL: &str = "net_conntrack_listener_conn_closed_total";
pub const OPEN: &str = "net_conntrack_listener_conn_open";

/// Label carrying the tracker name on every series.
pub const LISTENER_LABEL: &str = "listener_name";

static RECORDER_READY: AtomicBool = AtomicBool::new(false);

/// Error installing the metrics exporter.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to install Prometheus recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}

/// Install the process-wide Prometheus recorder.
///
/// The returned handle renders the text exposition format; the debug router
/// serves it on `/metrics`.
pub fn install_prometheus() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

/// Attach help text to the connection series.
///
/// [`install_prometheus`] calls this; call it yourself after installing a
/// different recorder. Until it has run, newly registered names log a warning.
pub fn describe_metrics() {
    RECORDER_READY.store(true, Ordering::Release);
    metrics::describe_counter!(
        ACCEPTED_TOTAL,
        "Total number of connections opened to the listener of a given name."
    );
    metrics::describe_counter!(
        CLOSED_TOTAL,
        "Total number of connections closed that were made to the listener of a given name."
    );
    metrics::describe_gauge!(
        OPEN,
        "Number of connections currently open on the listener of a given name."
    );
}

/// Whether a recorder has been installed through this module.
pub fn recorder_ready() -> bool {
    RECORDER_READY.load(Ordering::Acquire)
}

/// The three series belonging to one tracker name.
pub struct ListenerSeries {
    name: String,
    accepted: Counter,
    closed: Counter,
    open: Gauge,
}

impl ListenerSeries {
    /// Resolve the handles for `name` and pin them to zero.
    ///
    /// The handles are bound to whichever recorder is installed right now.
    pub(crate) fn register(name: &str) -> Self {
        if !recorder_ready() {
            tracing::warn!(
                listener_name = %name,
                "No metrics recorder installed; connection series for this name will not be exported"
            );
        }

        let accepted = metrics::counter!(ACCEPTED_TOTAL, LISTENER_LABEL => name.to_string());
        let closed = metrics::counter!(CLOSED_TOTAL, LISTENER_LABEL => name.to_string());
        let open = metrics::gauge!(OPEN, LISTENER_LABEL => name.to_string());

        accepted.increment(0);
        closed.increment(0);
        open.increment(0.0);

        Self {
            name: name.to_string(),
            accepted,
            closed,
            open,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A connection was accepted: bump `accepted_total` and `open`.
    pub fn on_accepted(&self) {
        self.accepted.increment(1);
        self.open.increment(1.0);
    }

    /// A connection closed: bump `closed_total` and drop `open`.
    pub fn on_closed(&self) {
        self.closed.increment(1);
        self.open.decrement(1.0);
    }
}

impl fmt::Debug for ListenerSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSeries").field("name", &self.name).finish()
    }
}

/// Record an accepted connection for `name`, registering its series if needed.
pub fn on_accepted(name: &str) {
    LabelRegistry::global().series(name).on_accepted();
}

/// Record a closed connection for `name`, registering its series if needed.
pub fn on_closed(name: &str) {
    LabelRegistry::global().series(name).on_closed();
}
