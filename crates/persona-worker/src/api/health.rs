use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use crate::context::ServiceContext;

/// GET /healthz — 200 when the bus is reachable and the firehose
/// dispatcher has joined its consumer group, 503 otherwise.
pub async fn healthz(State(ctx): State<Arc<ServiceContext>>) -> impl IntoResponse {
    let degraded = ctx.bus.is_degraded() || ctx.memory.is_degraded();
    let group_joined = ctx.group_joined.load(Ordering::Relaxed);
    let healthy = !degraded && group_joined;

    let body = Json(serde_json::json!({
        "status": if healthy { "ok" } else { "degraded" },
        "bus_degraded": ctx.bus.is_degraded(),
        "memory_degraded": ctx.memory.is_degraded(),
        "group_joined": group_joined,
    }));

    if healthy {
        (StatusCode::OK, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body)
    }
}
