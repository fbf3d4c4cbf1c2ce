//! Tracked listener implementation.
//!
//! # Responsibilities
//! - Wrap any [`Listener`] without changing its accept semantics
//! - Pre-register the tracker name's metric series at construction
//! - Count and trace every successfully accepted connection before handing it out
//! - Leave failed accepts untouched: no counters, no events
//!
//! # Design Decisions
//! - Options are resolved once and shared immutably with every connection
//! - Closing consumes the wrapper, so `Closed` is terminal by construction
//! - Per-connection counters are driven only by connection closes

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::net::connection::{CloseGuard, CloseObserver, MetricsObserver, TraceObserver, TrackedConnection};
use crate::net::options::TrackOptions;
use crate::net::transport::{Connection, Listener};
use crate::observability::metrics::ListenerSeries;
use crate::observability::registry::LabelRegistry;
use crate::observability::tracing::TraceTracker;

/// A listener whose connections report accept/close to metrics and trace events.
pub struct TrackedListener<L> {
    inner: L,
    opts: Arc<TrackOptions>,
    name: Arc<str>,
    series: Option<Arc<ListenerSeries>>,
    trace: Option<TraceTracker>,
}

impl<L: Listener> TrackedListener<L> {
    /// Wrap `inner`.
    ///
    /// Wrapping several listeners under the same name is fine: they share,
    /// and add to, the same series.
    ///
    /// The first wrap of a name binds its series to the metrics recorder
    /// installed at that moment. Install the recorder (for example with
    /// [`install_prometheus`](crate::observability::metrics::install_prometheus))
    /// before wrapping; a name first wrapped without one stays unexported for
    /// the life of the process, and a warning is logged.
    pub fn new(inner: L, opts: TrackOptions) -> Self {
        let name: Arc<str> = Arc::from(opts.tracker_name());
        let series = opts
            .metrics_enabled()
            .then(|| LabelRegistry::global().series(&name));
        let trace = opts.tracing_enabled().then(|| TraceTracker::new(&name));

        tracing::debug!(
            listener_name = %name,
            metrics = opts.metrics_enabled(),
            tracing = opts.tracing_enabled(),
            "Tracking listener"
        );

        Self {
            inner,
            opts: Arc::new(opts),
            name,
            series,
            trace,
        }
    }

    /// Accept the next connection and start tracking it.
    ///
    /// Errors from the underlying listener are returned unchanged.
    pub async fn accept(&mut self) -> io::Result<(TrackedConnection<L::Conn>, L::Addr)> {
        let (conn, addr) = self.inner.accept().await?;

        if let Some(period) = self.opts.keepalive() {
            apply_keepalive(&conn, period, &self.name);
        }

        let mut observers: Vec<Box<dyn CloseObserver>> = Vec::with_capacity(2);
        if let Some(series) = &self.series {
            observers.push(Box::new(MetricsObserver::accepted(Arc::clone(series))));
        }
        if let Some(trace) = &self.trace {
            let peer = conn.peer_description();
            let local = conn.local_description();
            observers.push(Box::new(TraceObserver::begin(trace, &peer, &local)));
        }

        let conn = TrackedConnection::new(conn, CloseGuard::new(Arc::clone(&self.name), observers));
        tracing::debug!(
            listener_name = %self.name,
            connection_id = %conn.id(),
            peer_addr = ?addr,
            "Connection accepted"
        );
        Ok((conn, addr))
    }

    pub fn local_addr(&self) -> io::Result<L::Addr> {
        self.inner.local_addr()
    }

    pub fn options(&self) -> &TrackOptions {
        &self.opts
    }

    pub fn get_ref(&self) -> &L {
        &self.inner
    }

    /// Stop accepting. Connections already handed out keep their own lifecycle.
    pub fn close(self) -> io::Result<()> {
        tracing::debug!(listener_name = %self.name, "Closing tracked listener");
        self.inner.close()
    }
}

fn apply_keepalive<C: Connection>(conn: &C, period: Duration, name: &str) {
    if let Err(e) = conn.set_keepalive(period) {
        tracing::warn!(listener_name = %name, error = %e, "Failed to enable TCP keep-alive");
    }
}

impl<L> std::fmt::Debug for TrackedListener<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedListener")
            .field("options", &self.opts)
            .finish()
    }
}

impl<L: Listener> axum::serve::Listener for TrackedListener<L> {
    type Io = TrackedConnection<L::Conn>;
    type Addr = L::Addr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match TrackedListener::accept(self).await {
                Ok(accepted) => return accepted,
                Err(e) => handle_accept_error(&self.name, e).await,
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        TrackedListener::local_addr(self)
    }
}

async fn handle_accept_error(name: &str, e: io::Error) {
    if is_connection_error(&e) {
        return;
    }

    // Most likely out of file descriptors; give open connections a chance to close.
    tracing::error!(listener_name = %name, error = %e, "Accept error");
    tokio::time::sleep(Duration::from_secs(1)).await;
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
