//! Debug endpoint: metrics scrape and live connection events.
//!
//! # Routes
//! - `GET /metrics` Prometheus text exposition
//! - `GET /debug/events` live and recently finished events as text (`?family=` filter)
//! - `GET /debug/events.json` the same as JSON

pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::observability::events::EventLog;
use self::handlers::*;

/// Shared state for the debug handlers.
#[derive(Clone)]
pub struct DebugState {
    /// `None` when no recorder was installed; `/metrics` then answers 503.
    pub prometheus: Option<PrometheusHandle>,
    pub events: Arc<EventLog>,
}

impl DebugState {
    pub fn new(prometheus: Option<PrometheusHandle>) -> Self {
        Self {
            prometheus,
            events: EventLog::global(),
        }
    }
}

pub fn router(state: DebugState) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/debug/events", get(get_events))
        .route("/debug/events.json", get(get_events_json))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
