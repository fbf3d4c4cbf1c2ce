//! Process-wide registry of tracker names whose metric series exist.
//!
//! Registration for a name happens at most once per process. Repeat lookups
//! return the same handles, so existing counter values are never reset.

use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::observability::metrics::ListenerSeries;

/// Outcome of [`LabelRegistry::ensure_registered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// This call created the series.
    Newly,
    /// The series already existed; nothing was changed.
    Already,
}

#[derive(Debug, Default)]
pub struct LabelRegistry {
    series: DashMap<String, Arc<ListenerSeries>>,
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every tracked listener in the process.
    pub fn global() -> &'static LabelRegistry {
        static GLOBAL: OnceLock<LabelRegistry> = OnceLock::new();
        GLOBAL.get_or_init(LabelRegistry::new)
    }

    /// Make sure the series for `name` exist, creating them at zero on first use.
    pub fn ensure_registered(&self, name: &str) -> Registration {
        self.resolve(name).1
    }

    /// Handles for `name`, registering them first if needed.
    pub fn series(&self, name: &str) -> Arc<ListenerSeries> {
        self.resolve(name).0
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// Names registered so far, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn resolve(&self, name: &str) -> (Arc<ListenerSeries>, Registration) {
        if let Some(existing) = self.series.get(name) {
            return (Arc::clone(existing.value()), Registration::Already);
        }

        // The shard lock is held across registration so racing callers see one winner.
        match self.series.entry(name.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), Registration::Already),
            Entry::Vacant(entry) => {
                let series = Arc::new(ListenerSeries::register(name));
                entry.insert(Arc::clone(&series));
                tracing::info!(listener_name = %name, "Registered connection metrics");
                (series, Registration::Newly)
            }
        }
    }
}
