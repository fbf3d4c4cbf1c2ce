use std::fmt::Write;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::debug::DebugState;
use crate::observability::events::EventSnapshot;
use crate::observability::registry::LabelRegistry;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub family: Option<String>,
}

#[derive(Serialize)]
pub struct EventsPage {
    pub families: Vec<String>,
    pub listeners: Vec<String>,
    pub live: Vec<EventSnapshot>,
    pub finished: Vec<EventSnapshot>,
}

pub async fn get_metrics(State(state): State<DebugState>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

pub async fn get_events(
    State(state): State<DebugState>,
    Query(query): Query<EventsQuery>,
) -> String {
    render_text(&events_page(&state, query.family.as_deref()))
}

pub async fn get_events_json(
    State(state): State<DebugState>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsPage> {
    Json(events_page(&state, query.family.as_deref()))
}

fn events_page(state: &DebugState, family: Option<&str>) -> EventsPage {
    EventsPage {
        families: state.events.families(),
        listeners: LabelRegistry::global().names(),
        live: state.events.live(family),
        finished: state.events.finished(family),
    }
}

fn render_text(page: &EventsPage) -> String {
    let mut out = String::new();
    for family in &page.families {
        let live: Vec<_> = page.live.iter().filter(|e| &e.family == family).collect();
        let finished: Vec<_> = page.finished.iter().filter(|e| &e.family == family).collect();
        if live.is_empty() && finished.is_empty() {
            continue;
        }

        let _ = writeln!(out, "{}: {} live, {} recently finished", family, live.len(), finished.len());
        for event in live.into_iter().chain(finished) {
            let state = if event.finished { "done" } else { "live" };
            let _ = writeln!(
                out,
                "  [{}] #{} {} ({}ms)",
                state, event.id, event.title, event.elapsed_ms
            );
            for entry in &event.entries {
                let marker = if entry.is_error { "!" } else { " " };
                let _ = writeln!(out, "    {}+{}ms {}", marker, entry.offset_ms, entry.message);
            }
        }
    }
    out
}
