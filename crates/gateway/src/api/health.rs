use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// GET /healthz — 200 when the bus is reachable and the broadcaster has
/// joined its consumer group, 503 otherwise.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let degraded = state.bus.is_degraded();
    let group_joined = state.group_joined.load(Ordering::Relaxed);
    let healthy = !degraded && group_joined;

    let body = Json(serde_json::json!({
        "status": if healthy { "ok" } else { "degraded" },
        "bus_degraded": degraded,
        "group_joined": group_joined,
    }));

    if healthy {
        (StatusCode::OK, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body)
    }
}
