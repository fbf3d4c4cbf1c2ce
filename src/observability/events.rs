//! In-process live event log.
//!
//! # Responsibilities
//! - Hold one live event per in-progress unit of work (here: a connection)
//! - Group events into families (`net.ServerConn.<name>`)
//! - Keep a short history of finished events per family for the debug page
//!
//! # Design Decisions
//! - Live events are keyed by a process-unique id in a `DashMap`, so begin/finish
//!   from different tasks never contend on a single lock
//! - An event leaves the live set the moment it is finished; history is separate

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;

/// Finished events retained per family.
pub const FINISHED_PER_FAMILY: usize = 10;

/// One line recorded against an event.
#[derive(Debug, Clone, Serialize)]
pub struct EventEntry {
    /// Milliseconds since the event began.
    pub offset_ms: u64,
    pub message: String,
    pub is_error: bool,
}

/// Point-in-time copy of an event.
#[derive(Debug, Clone, Serialize)]
pub struct EventSnapshot {
    pub id: u64,
    pub family: String,
    pub title: String,
    /// Wall-clock start, milliseconds since the unix epoch.
    pub started_unix_ms: u64,
    /// How long the event has been (or was) open.
    pub elapsed_ms: u64,
    pub finished: bool,
    pub entries: Vec<EventEntry>,
}

impl EventSnapshot {
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.is_error)
    }
}

#[derive(Debug)]
struct LiveEvent {
    id: u64,
    family: String,
    title: String,
    started_unix_ms: u64,
    started: Instant,
    entries: Mutex<Vec<EventEntry>>,
}

impl LiveEvent {
    fn entries(&self) -> MutexGuard<'_, Vec<EventEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, message: String, is_error: bool) {
        let offset_ms = self.started.elapsed().as_millis() as u64;
        self.entries().push(EventEntry {
            offset_ms,
            message,
            is_error,
        });
    }

    fn snapshot(&self, finished: bool) -> EventSnapshot {
        EventSnapshot {
            id: self.id,
            family: self.family.clone(),
            title: self.title.clone(),
            started_unix_ms: self.started_unix_ms,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            finished,
            entries: self.entries().clone(),
        }
    }
}

/// A registry of live and recently finished events.
#[derive(Debug, Default)]
pub struct EventLog {
    next_id: AtomicU64,
    live: DashMap<u64, Arc<LiveEvent>>,
    finished: Mutex<HashMap<String, VecDeque<EventSnapshot>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The log shared by every tracked listener in the process.
    pub fn global() -> Arc<EventLog> {
        static GLOBAL: OnceLock<Arc<EventLog>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(EventLog::new())))
    }

    /// Start a live event. It stays in the live set until the handle is finished or dropped.
    pub fn begin(self: &Arc<Self>, family: impl Into<String>, title: impl Into<String>) -> EventHandle {
        let started_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let event = Arc::new(LiveEvent {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            family: family.into(),
            title: title.into(),
            started_unix_ms,
            started: Instant::now(),
            entries: Mutex::new(Vec::new()),
        });
        self.live.insert(event.id, Arc::clone(&event));

        EventHandle {
            log: Arc::clone(self),
            event: Some(event),
        }
    }

    /// Live events, optionally restricted to one family, oldest first.
    pub fn live(&self, family: Option<&str>) -> Vec<EventSnapshot> {
        let mut events: Vec<EventSnapshot> = self
            .live
            .iter()
            .filter(|e| family.map_or(true, |f| e.value().family == f))
            .map(|e| e.value().snapshot(false))
            .collect();
        events.sort_by_key(|e| e.id);
        events
    }

    /// Number of live events in `family`.
    pub fn live_count(&self, family: &str) -> usize {
        self.live.iter().filter(|e| e.value().family == family).count()
    }

    /// Recently finished events, optionally restricted to one family, oldest first.
    pub fn finished(&self, family: Option<&str>) -> Vec<EventSnapshot> {
        let finished = self.finished_lock();
        let mut events: Vec<EventSnapshot> = finished
            .iter()
            .filter(|(f, _)| family.map_or(true, |want| f.as_str() == want))
            .flat_map(|(_, events)| events.iter().cloned())
            .collect();
        events.sort_by_key(|e| e.id);
        events
    }

    /// Every family that has a live or finished event, sorted.
    pub fn families(&self) -> Vec<String> {
        let mut families: Vec<String> = self.live.iter().map(|e| e.value().family.clone()).collect();
        families.extend(self.finished_lock().keys().cloned());
        families.sort();
        families.dedup();
        families
    }

    fn finish(&self, event: &LiveEvent) {
        self.live.remove(&event.id);

        let snapshot = event.snapshot(true);
        let mut finished = self.finished_lock();
        let history = finished.entry(event.family.clone()).or_default();
        if history.len() == FINISHED_PER_FAMILY {
            history.pop_front();
        }
        history.push_back(snapshot);
    }

    fn finished_lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<EventSnapshot>>> {
        self.finished.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owner of one live event.
///
/// Finishing consumes the handle; dropping an unfinished handle finishes it too.
#[derive(Debug)]
pub struct EventHandle {
    log: Arc<EventLog>,
    event: Option<Arc<LiveEvent>>,
}

impl EventHandle {
    pub fn id(&self) -> u64 {
        self.event.as_ref().map_or(0, |e| e.id)
    }

    /// Append an informational line.
    pub fn printf(&self, message: impl Into<String>) {
        if let Some(event) = &self.event {
            event.push(message.into(), false);
        }
    }

    /// Append a line flagged as an error.
    pub fn errorf(&self, message: impl Into<String>) {
        if let Some(event) = &self.event {
            event.push(message.into(), true);
        }
    }

    /// Remove the event from the live set.
    pub fn finish(mut self) {
        self.finish_inner();
    }

    fn finish_inner(&mut self) {
        if let Some(event) = self.event.take() {
            self.log.finish(&event);
        }
    }
}

impl Drop for EventHandle {
    fn drop(&mut self) {
        self.finish_inner();
    }
}
