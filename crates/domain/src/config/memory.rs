use serde::{Deserialize, Serialize};

/// REST memory service connection. Empty `base_url` means the memory
/// adapter runs permanently degraded (search returns empty, add is a no-op).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_max_results")]
    pub max_results: usize,
    /// Process-wide cap on concurrent search/add calls.
    #[serde(default = "d_max_concurrency")]
    pub max_concurrency: usize,
}

fn d_timeout_ms() -> u64 {
    1_500
}
fn d_max_results() -> usize {
    8
}
fn d_max_concurrency() -> usize {
    8
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_ms: d_timeout_ms(),
            max_results: d_max_results(),
            max_concurrency: d_max_concurrency(),
        }
    }
}
