use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::context::ServiceContext;

/// GET /stats — per-persona decision/memory/observation counters. Mirrors
/// the subset of the contract the gateway doesn't already report.
pub async fn stats(State(ctx): State<Arc<ServiceContext>>) -> impl IntoResponse {
    Json(ctx.stats.snapshot(&ctx))
}
