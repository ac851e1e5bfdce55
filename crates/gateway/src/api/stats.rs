use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// GET /stats — broadcaster counters. `decisions_by_reason`, `memory_*`,
/// `observations_received`, and `enabled_personas` are reported by
/// chatstorm-persona-worker instead; this service only sees `ingest` and
/// client fan-out.
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.stats.snapshot(&state.clients))
}
