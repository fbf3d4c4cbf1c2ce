//! Tracked connection and its once-only close bookkeeping.
//!
//! # Responsibilities
//! - Forward every byte-stream operation to the wrapped connection unchanged
//! - Run close side effects (metrics, trace event) exactly once per connection
//! - Generate unique connection IDs for logs
//!
//! # Design Decisions
//! - Side effects fire on the first of: explicit `close()`, or drop
//! - `close()` releases the wrapped connection; later I/O fails with `NotConnected`
//! - `poll_shutdown` is a half-close and is forwarded without side effects
//! - Each concern is an independent observer with its own enable flag

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::net::transport::Connection;
use crate::observability::events::EventHandle;
use crate::observability::metrics::ListenerSeries;
use crate::observability::tracing::{CloseOutcome, TraceTracker};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Something that must hear about a connection closing, once.
pub(crate) trait CloseObserver: Send + Sync {
    fn on_close(&self, outcome: &CloseOutcome);
}

/// Drives `closed_total` and `open` for the listener's tracker name.
pub(crate) struct MetricsObserver {
    series: Arc<ListenerSeries>,
}

impl MetricsObserver {
    /// Counts the connection as accepted and returns the observer that will count it closed.
    pub(crate) fn accepted(series: Arc<ListenerSeries>) -> Self {
        series.on_accepted();
        Self { series }
    }
}

impl CloseObserver for MetricsObserver {
    fn on_close(&self, _outcome: &CloseOutcome) {
        self.series.on_closed();
    }
}

/// Holds the connection's live trace event until close.
pub(crate) struct TraceObserver {
    event: Mutex<Option<EventHandle>>,
}

impl TraceObserver {
    pub(crate) fn begin(tracker: &TraceTracker, peer: &str, local: &str) -> Self {
        Self {
            event: Mutex::new(Some(tracker.begin_event(peer, local))),
        }
    }
}

impl CloseObserver for TraceObserver {
    fn on_close(&self, outcome: &CloseOutcome) {
        let event = self
            .event
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(event) = event {
            TraceTracker::finish_event(event, outcome);
        }
    }
}

/// One-shot completion guard shared by every close path of a connection.
pub(crate) struct CloseGuard {
    id: ConnectionId,
    listener_name: Arc<str>,
    finished: AtomicBool,
    observers: Vec<Box<dyn CloseObserver>>,
}

impl CloseGuard {
    pub(crate) fn new(listener_name: Arc<str>, observers: Vec<Box<dyn CloseObserver>>) -> Self {
        Self {
            id: ConnectionId::new(),
            listener_name,
            finished: AtomicBool::new(false),
            observers,
        }
    }

    /// Run the close side effects. Returns `true` only for the call that ran them.
    pub(crate) fn finish(&self, outcome: CloseOutcome) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        for observer in &self.observers {
            observer.on_close(&outcome);
        }
        tracing::debug!(
            listener_name = %self.listener_name,
            connection_id = %self.id,
            outcome = ?outcome,
            "Connection closed"
        );
        true
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// A connection yielded by a [`TrackedListener`](crate::net::TrackedListener).
///
/// Reads and writes pass straight through. Closing, either through
/// [`close`](Self::close) or by dropping, reports the connection as closed
/// exactly once no matter how many times it happens. After `close` the
/// underlying connection is released and further I/O fails.
pub struct TrackedConnection<C> {
    inner: Option<C>,
    guard: CloseGuard,
}

impl<C: Connection> TrackedConnection<C> {
    pub(crate) fn new(inner: C, guard: CloseGuard) -> Self {
        Self {
            inner: Some(inner),
            guard,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id
    }

    /// Tracker name of the listener that accepted this connection.
    pub fn listener_name(&self) -> &str {
        &self.guard.listener_name
    }

    /// The underlying connection, or `None` once closed.
    pub fn get_ref(&self) -> Option<&C> {
        self.inner.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut C> {
        self.inner.as_mut()
    }

    pub fn peer_description(&self) -> String {
        self.inner
            .as_ref()
            .map_or_else(|| "<closed>".to_string(), |inner| inner.peer_description())
    }

    pub fn local_description(&self) -> String {
        self.inner
            .as_ref()
            .map_or_else(|| "<closed>".to_string(), |inner| inner.local_description())
    }

    /// Whether the close side effects have already run.
    pub fn is_closed(&self) -> bool {
        self.guard.is_finished()
    }

    /// Shut the connection down, release it, and report it closed.
    ///
    /// The first call returns the result of the underlying shutdown; later
    /// calls fail with [`io::ErrorKind::NotConnected`]. Only the first call
    /// updates metrics and finishes the trace event.
    pub async fn close(&mut self) -> io::Result<()> {
        let result = match self.inner.as_mut() {
            Some(inner) => {
                let result = inner.shutdown().await;
                self.inner = None;
                result
            }
            None => Err(closed_error()),
        };
        let outcome = match &result {
            Ok(()) => CloseOutcome::Closed,
            Err(e) => CloseOutcome::Failed(e.to_string()),
        };
        self.guard.finish(outcome);
        result
    }

    fn project(&mut self) -> io::Result<Pin<&mut C>> {
        self.inner.as_mut().map(Pin::new).ok_or_else(closed_error)
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection already closed")
}

impl<C> Drop for TrackedConnection<C> {
    fn drop(&mut self) {
        self.guard.finish(CloseOutcome::Dropped);
    }
}

impl<C> std::fmt::Debug for TrackedConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedConnection")
            .field("id", &self.guard.id)
            .field("listener_name", &self.guard.listener_name)
            .field("closed", &self.guard.is_finished())
            .finish()
    }
}

impl<C: Connection> AsyncRead for TrackedConnection<C> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            Ok(inner) => inner.poll_read(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl<C: Connection> AsyncWrite for TrackedConnection<C> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            Ok(inner) => inner.poll_write(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            Ok(inner) => inner.poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            Ok(inner) => inner.poll_shutdown(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            Ok(inner) => inner.poll_write_vectored(cx, bufs),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.as_ref().is_some_and(|inner| inner.is_write_vectored())
    }
}
