mod bus;
mod generation;
mod llm;
mod memory;
mod safety;
mod server;

pub use bus::*;
pub use generation::*;
pub use llm::*;
pub use memory::*;
pub use safety::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub streams: StreamsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub auto_commentary: AutoCommentaryConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Path to the room config file (TOML).
    #[serde(default = "d_room_config_path")]
    pub room_config_path: String,
    /// Directory containing one TOML file per persona.
    #[serde(default = "d_persona_config_dir")]
    pub persona_config_dir: String,
}

fn d_room_config_path() -> String {
    "config/room.toml".into()
}
fn d_persona_config_dir() -> String {
    "config/personas".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.bus.redis_url.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "bus.redis_url".into(),
                message: "redis_url must not be empty".into(),
            });
        }
        if self.streams.ingest.is_empty() || self.streams.firehose.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "streams".into(),
                message: "ingest and firehose stream names must not be empty".into(),
            });
        }
        if matches!(self.generation.mode, GenerationMode::Litellm)
            && self.llm.base_url.is_empty()
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "llm.base_url".into(),
                message: "generation.mode=litellm requires llm.base_url".into(),
            });
        }
        if self.llm.max_concurrency == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "llm.max_concurrency".into(),
                message: "max_concurrency must be greater than 0".into(),
            });
        }
        if self.memory.base_url.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "memory.base_url".into(),
                message: "no memory base_url configured; memory adapter will run degraded".into(),
            });
        }

        issues
    }
}
