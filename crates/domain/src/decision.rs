use serde::{Deserialize, Serialize};

/// Whether the Policy Engine decided to post or skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Post,
    Skip,
}

/// The reason recorded alongside a [`Decision`]. Mirrors the `decisions_by_reason`
/// stats keys and the `reason` field on [`DecisionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    E2eForced,
    BotOrigin,
    Cooldown,
    Budget,
    ProbabilityGate,
    GenEmpty,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::E2eForced => "e2e_forced",
            DecisionReason::BotOrigin => "bot_origin",
            DecisionReason::Cooldown => "cooldown",
            DecisionReason::Budget => "budget",
            DecisionReason::ProbabilityGate => "probability_gate",
            DecisionReason::GenEmpty => "gen_empty",
        }
    }
}

/// Debug/telemetry tags attached to every policy evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionTags {
    pub p_base: f64,
    pub p_used: f64,
    pub rate_10s: f64,
    pub h_value: f64,
    pub boosts_applied: Vec<String>,
}

/// A single Policy Engine evaluation, written to telemetry (not persisted
/// beyond metrics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub room_id: String,
    pub persona_id: String,
    pub trigger_id: String,
    pub decision: Decision,
    pub reason: DecisionReason,
    pub tags: DecisionTags,
}
