use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chatstorm_bus::Bus;
use chatstorm_domain::Config;
use chatstorm_safety::SafetyConfig;

use crate::clients::ClientRegistry;

/// Broadcaster counters surfaced on `/stats`. Cheap atomics updated inline
/// with the hot path; no lock contention with the fan-out loop.
#[derive(Default)]
pub struct Stats {
    pub messages_published: AtomicU64,
    pub messages_dropped_schema_invalid: AtomicU64,
    pub messages_dropped_safety: AtomicU64,
}

impl Stats {
    pub fn snapshot(&self, clients: &ClientRegistry) -> serde_json::Value {
        serde_json::json!({
            "messages_published": self.messages_published.load(Ordering::Relaxed),
            "messages_dropped_schema_invalid": self.messages_dropped_schema_invalid.load(Ordering::Relaxed),
            "messages_dropped_safety": self.messages_dropped_safety.load(Ordering::Relaxed),
            "clients_connected": clients.total_clients(),
        })
    }
}

/// Shared application state passed to every axum handler.
///
/// Fields are grouped by concern:
/// - **Core services** — config, bus
/// - **Broadcaster working set** — safety config, clients, stats
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub bus: Arc<dyn Bus>,

    // ── Broadcaster working set ──────────────────────────────────────
    pub safety: Arc<SafetyConfig>,
    pub clients: Arc<ClientRegistry>,
    pub stats: Arc<Stats>,
    /// Set once the broadcaster has joined its consumer group on `ingest`.
    pub group_joined: Arc<AtomicBool>,
}
