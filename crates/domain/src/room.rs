use serde::{Deserialize, Serialize};

/// Per-room configuration: enabled personas, probability weights, and
/// posting budgets. Loaded at startup, treated as immutable during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub room_id: String,
    #[serde(default)]
    pub enabled_personas: Vec<String>,
    #[serde(default = "d_hype_multiplier")]
    pub hype_multiplier: f64,
    #[serde(default = "d_probability_ceiling")]
    pub probability_ceiling: f64,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default = "d_cooldown_ms")]
    pub cooldown_ms: i64,
    #[serde(default)]
    pub feature_flags: Vec<String>,
}

fn d_hype_multiplier() -> f64 {
    1.0
}
fn d_probability_ceiling() -> f64 {
    0.95
}
fn d_cooldown_ms() -> i64 {
    8_000
}

/// A sliding-window posting budget: at most `n` posts per `window_s`
/// seconds, per (room, persona).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "d_budget_n")]
    pub n: u32,
    #[serde(default = "d_window_s")]
    pub window_s: u64,
}

fn d_budget_n() -> u32 {
    5
}
fn d_window_s() -> u64 {
    60
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            n: d_budget_n(),
            window_s: d_window_s(),
        }
    }
}

impl RoomConfig {
    pub fn is_persona_enabled(&self, persona_id: &str) -> bool {
        self.enabled_personas.iter().any(|p| p == persona_id)
    }
}
