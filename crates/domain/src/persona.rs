use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable voice anchors and slowly-drifting traits for one persona.
///
/// Anchors (`display_name`, `voice_rules`, `hard_never`) are loaded at
/// startup and never mutated; `drift` is mutated only by the reflection
/// loop, bounded per step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub voice_rules: Vec<String>,
    /// Categories this persona must never talk about, regardless of drift.
    #[serde(default)]
    pub hard_never: Vec<String>,
    #[serde(default)]
    pub catchphrases: Vec<String>,
    #[serde(default)]
    pub drift: DriftKnobs,
    #[serde(default = "d_auto_cooldown_ms")]
    pub auto_cooldown_ms: i64,
    #[serde(default = "d_hype_threshold")]
    pub auto_hype_threshold: f64,
    /// Run a reflection cycle at least this often, regardless of how many
    /// own messages have accumulated.
    #[serde(default = "d_reflection_interval_s")]
    pub reflection_interval_s: u64,
    /// Also run a reflection cycle after this many own messages, whichever
    /// comes first.
    #[serde(default = "d_reflection_message_count")]
    pub reflection_message_count: u32,
}

fn d_auto_cooldown_ms() -> i64 {
    30_000
}
fn d_hype_threshold() -> f64 {
    0.6
}
fn d_reflection_interval_s() -> u64 {
    300
}
fn d_reflection_message_count() -> u32 {
    20
}

/// Bounded, slowly-drifting persona traits. Each field is clamped to
/// `[bounds.0, bounds.1]`; the reflection loop changes any single knob by
/// at most ±0.02 per cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftKnobs {
    #[serde(default)]
    pub values: HashMap<String, f64>,
    #[serde(default = "d_bounds")]
    pub bounds: HashMap<String, (f64, f64)>,
}

fn d_bounds() -> HashMap<String, (f64, f64)> {
    let mut m = HashMap::new();
    m.insert("talkativeness".to_string(), (0.0, 1.0));
    m
}

impl Default for DriftKnobs {
    fn default() -> Self {
        let mut values = HashMap::new();
        values.insert("talkativeness".to_string(), 0.5);
        Self {
            values,
            bounds: d_bounds(),
        }
    }
}

impl DriftKnobs {
    pub fn talkativeness(&self) -> f64 {
        *self.values.get("talkativeness").unwrap_or(&0.5)
    }

    /// Apply a bounded delta to a knob, clamping to its configured bounds
    /// (or `[0, 1]` if the knob has no bounds entry) and to at most ±0.02
    /// magnitude regardless of the requested delta.
    pub fn apply_delta(&mut self, knob: &str, delta: f64) {
        let clamped_delta = delta.clamp(-0.02, 0.02);
        let (lo, hi) = self.bounds.get(knob).copied().unwrap_or((0.0, 1.0));
        let current = *self.values.get(knob).unwrap_or(&((lo + hi) / 2.0));
        let next = (current + clamped_delta).clamp(lo, hi);
        self.values.insert(knob.to_string(), next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_delta_is_bounded_per_step() {
        let mut drift = DriftKnobs::default();
        drift.apply_delta("talkativeness", 5.0);
        assert!((drift.talkativeness() - 0.52).abs() < 1e-9);
    }

    #[test]
    fn drift_respects_configured_bounds() {
        let mut drift = DriftKnobs::default();
        drift.bounds.insert("talkativeness".to_string(), (0.4, 0.6));
        for _ in 0..20 {
            drift.apply_delta("talkativeness", 0.02);
        }
        assert!(drift.talkativeness() <= 0.6 + 1e-9);
    }
}
