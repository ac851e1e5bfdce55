pub mod health;
pub mod stats;

use std::sync::Arc;

use axum::routing::{get, Router};

use crate::context::ServiceContext;

pub fn router() -> Router<Arc<ServiceContext>> {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/stats", get(stats::stats))
}
