use serde::{Deserialize, Serialize};

/// OpenAI-compatible endpoint used by the `litellm` generation mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_max_concurrency")]
    pub max_concurrency: usize,
}

fn d_model() -> String {
    "gpt-4o-mini".into()
}
fn d_max_concurrency() -> usize {
    4
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model: d_model(),
            max_concurrency: d_max_concurrency(),
        }
    }
}
