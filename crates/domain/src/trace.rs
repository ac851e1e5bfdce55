use serde::{Deserialize, Serialize};

/// Provenance stamped onto every [`crate::model::ChatMessage`].
///
/// `producer` identifies who created the record (`"persona_worker"`,
/// `"persona_worker_auto"`, or a human-facing publisher name); the
/// broadcaster never overwrites it, only appends itself to `processed_by`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    #[serde(default)]
    pub producer: Option<String>,
    #[serde(default)]
    pub processed_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ts: Option<i64>,
}

impl Trace {
    pub fn producer_or_unknown(&self) -> &str {
        self.producer.as_deref().unwrap_or("unknown")
    }
}

/// Structured trace events emitted across all chatstorm crates, logged as
/// one JSON line via `tracing::info!(trace_event = %json, ...)`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    BroadcasterAccepted {
        room_id: String,
        id: String,
        action: String,
    },
    BroadcasterDropped {
        room_id: String,
        id: String,
        reason: String,
    },
    PolicyDecision {
        room_id: String,
        persona_id: String,
        trigger_id: String,
        decision: String,
        reason: String,
        p_used: f64,
    },
    GenerationFailed {
        room_id: String,
        persona_id: String,
        mode: String,
        reason: String,
    },
    MemoryDegraded {
        namespace: String,
        operation: String,
        reason: String,
    },
    ClientDropped {
        room_id: String,
        dropped_total: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "chatstorm_event");
    }
}
