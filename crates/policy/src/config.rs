use serde::{Deserialize, Serialize};

/// Tunables for the probability computation in step 5 of
/// [`crate::engine::PolicyEngine::evaluate`]. Defaults match the reference
/// weights; rooms may override per-deployment via `RoomConfig.feature_flags`
/// in a later iteration, but a single global `PolicyConfig` is sufficient
/// for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Any of these prefixes appearing in `trigger_msg.content` forces a
    /// post, subject to the other deterministic-force conditions.
    #[serde(default = "d_marker_prefixes")]
    pub marker_prefixes: Vec<String>,
    #[serde(default = "d_max_trigger_age_ms")]
    pub max_trigger_age_ms: i64,
    #[serde(default = "d_mention_window_s")]
    pub mention_window_s: u64,
    #[serde(default = "d_p_base")]
    pub p_base: f64,
    #[serde(default = "d_alpha_event")]
    pub alpha_event: f64,
    #[serde(default = "d_beta_mention")]
    pub beta_mention: f64,
    #[serde(default = "d_alpha_trend")]
    pub alpha_trend: f64,
    #[serde(default = "d_gamma_bot")]
    pub gamma_bot: f64,
    #[serde(default = "d_p_cap")]
    pub p_cap: f64,
    /// Window used to compute `rate_10s`/trend velocity normalization.
    #[serde(default = "d_trend_window_s")]
    pub trend_window_s: u64,
    /// Reference rate (msgs/sec) treated as "normal" when normalizing
    /// velocity into `normalized_velocity`.
    #[serde(default = "d_reference_rate")]
    pub reference_rate: f64,
}

fn d_marker_prefixes() -> Vec<String> {
    vec![
        "E2E_TEST_BOTLOOP_".into(),
        "E2E_TEST_".into(),
        "E2E_MARKER_".into(),
    ]
}
fn d_max_trigger_age_ms() -> i64 {
    5_000
}
fn d_mention_window_s() -> u64 {
    30
}
fn d_p_base() -> f64 {
    0.08
}
fn d_alpha_event() -> f64 {
    1.5
}
fn d_beta_mention() -> f64 {
    3.0
}
fn d_alpha_trend() -> f64 {
    0.8
}
fn d_gamma_bot() -> f64 {
    0.7
}
fn d_p_cap() -> f64 {
    0.95
}
fn d_trend_window_s() -> u64 {
    10
}
fn d_reference_rate() -> f64 {
    1.0
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            marker_prefixes: d_marker_prefixes(),
            max_trigger_age_ms: d_max_trigger_age_ms(),
            mention_window_s: d_mention_window_s(),
            p_base: d_p_base(),
            alpha_event: d_alpha_event(),
            beta_mention: d_beta_mention(),
            alpha_trend: d_alpha_trend(),
            gamma_bot: d_gamma_bot(),
            p_cap: d_p_cap().min(0.95),
            trend_window_s: d_trend_window_s(),
            reference_rate: d_reference_rate(),
        }
    }
}
