pub mod health;
pub mod stats;

use axum::routing::{get, Router};

use crate::state::AppState;
use crate::ws::ws_handler;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/stats", get(stats::stats))
        .route("/ws", get(ws_handler))
}
