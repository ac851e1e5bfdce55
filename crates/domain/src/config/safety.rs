use serde::{Deserialize, Serialize};

/// Blocklist and length limits the gateway hands to the Safety Filter.
/// Kept in `domain` (rather than the `chatstorm-safety` crate) so it can be
/// loaded and validated alongside the rest of [`super::Config`] without a
/// dependency from domain onto safety.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    #[serde(default)]
    pub blocklist: Vec<String>,
    #[serde(default = "d_max_chars")]
    pub max_chars: usize,
}

fn d_max_chars() -> usize {
    320
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            blocklist: Vec::new(),
            max_chars: d_max_chars(),
        }
    }
}
