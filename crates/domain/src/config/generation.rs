use serde::{Deserialize, Serialize};

/// How the Generator produces persona replies. Selected by `GENERATION_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Deterministic,
    Stub,
    Litellm,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_max_reply_chars")]
    pub max_reply_chars: usize,
}

fn d_timeout_ms() -> u64 {
    3_000
}
fn d_max_reply_chars() -> usize {
    320
}

impl GenerationConfig {
    pub fn timeout_ms_default() -> u64 {
        d_timeout_ms()
    }
}

/// Toggle and config path for the idle "auto commentary" behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCommentaryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_auto_config_path")]
    pub config_path: String,
}

fn d_auto_config_path() -> String {
    "config/auto_commentary.toml".into()
}

impl Default for AutoCommentaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            config_path: d_auto_config_path(),
        }
    }
}
