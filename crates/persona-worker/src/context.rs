//! `ServiceContext`: every dependency a persona's loops need, constructed
//! once in `main` and `Arc`-cloned into each task instead of reached for
//! through a global.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chatstorm_bus::Bus;
use chatstorm_buffers::{ChatWindow, ObservationBuffer};
use chatstorm_domain::{Clock, Config, PersonaConfig, RoomConfig};
use chatstorm_generator::{Generator, LlmProvider};
use chatstorm_memory::MemoryProvider;
use chatstorm_policy::PolicyConfig;
use chatstorm_safety::SafetyConfig;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::state::PersonaState;

/// Read-only snapshotted counters backing `GET /stats`. `decisions_by_reason`
/// is a `DashMap` so every persona task can bump its own entry without
/// contending on a single lock.
#[derive(Default)]
pub struct Stats {
    pub messages_published: AtomicU64,
    pub observations_received: AtomicU64,
    pub memory_reads_succeeded: AtomicU64,
    pub memory_writes_accepted: AtomicU64,
    pub memory_items_total: AtomicU64,
    pub decisions_by_reason: DashMap<String, AtomicU64>,
}

impl Stats {
    pub fn record_decision(&self, reason: &str) {
        self.decisions_by_reason
            .entry(reason.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, ctx: &ServiceContext) -> serde_json::Value {
        let decisions: serde_json::Map<String, serde_json::Value> = self
            .decisions_by_reason
            .iter()
            .map(|e| (e.key().clone(), serde_json::json!(e.value().load(Ordering::Relaxed))))
            .collect();
        serde_json::json!({
            "room_id": ctx.room.room_id,
            "enabled_personas": ctx.room.enabled_personas,
            "messages_published": self.messages_published.load(Ordering::Relaxed),
            "decisions_by_reason": decisions,
            "memory_enabled": !ctx.config.memory.base_url.is_empty(),
            "memory_reads_succeeded": self.memory_reads_succeeded.load(Ordering::Relaxed),
            "memory_writes_accepted": self.memory_writes_accepted.load(Ordering::Relaxed),
            "memory_items_total": self.memory_items_total.load(Ordering::Relaxed),
            "observations_received": self.observations_received.load(Ordering::Relaxed),
        })
    }
}

pub struct ServiceContext {
    pub config: Arc<Config>,
    pub room: Arc<RoomConfig>,
    pub personas: Arc<HashMap<String, PersonaConfig>>,
    pub policy_config: Arc<PolicyConfig>,
    pub bus: Arc<dyn Bus>,
    pub safety: Arc<SafetyConfig>,
    pub memory: Arc<dyn MemoryProvider>,
    pub generator: Arc<dyn Generator>,
    /// Only `Some` when `generation.mode = litellm`; reflection falls back
    /// to a deterministic drift nudge otherwise.
    pub reflection_provider: Option<Arc<dyn LlmProvider>>,
    pub clock: Arc<dyn Clock>,
    pub chat_window: Arc<ChatWindow>,
    pub observation_buffer: Arc<ObservationBuffer>,
    pub states: Arc<HashMap<String, Mutex<PersonaState>>>,
    pub mem_semaphore: Arc<Semaphore>,
    pub stats: Arc<Stats>,
    pub group_joined: Arc<std::sync::atomic::AtomicBool>,
}

impl ServiceContext {
    pub fn persona_state(&self, persona_id: &str) -> Option<&Mutex<PersonaState>> {
        self.states.get(persona_id)
    }
}
