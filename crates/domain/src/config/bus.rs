use serde::{Deserialize, Serialize};

/// Connection and retry parameters for the Redis Streams bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "d_redis_url")]
    pub redis_url: String,
    #[serde(default = "d_backoff_min_ms")]
    pub backoff_min_ms: u64,
    #[serde(default = "d_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "d_consumer_group")]
    pub consumer_group: String,
    #[serde(default = "d_block_ms")]
    pub block_ms: u64,
}

fn d_redis_url() -> String {
    "redis://127.0.0.1:6379".into()
}
fn d_backoff_min_ms() -> u64 {
    100
}
fn d_backoff_max_ms() -> u64 {
    5_000
}
fn d_consumer_group() -> String {
    "chatstorm".into()
}
fn d_block_ms() -> u64 {
    5_000
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            redis_url: d_redis_url(),
            backoff_min_ms: d_backoff_min_ms(),
            backoff_max_ms: d_backoff_max_ms(),
            consumer_group: d_consumer_group(),
            block_ms: d_block_ms(),
        }
    }
}

/// Stream names, kept together since gateway and persona-worker must agree
/// on them exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    #[serde(default = "d_ingest")]
    pub ingest: String,
    #[serde(default = "d_firehose")]
    pub firehose: String,
    #[serde(default = "d_observations")]
    pub observations: String,
}

fn d_ingest() -> String {
    "chat.ingest".into()
}
fn d_firehose() -> String {
    "chat.firehose".into()
}
fn d_observations() -> String {
    "stream.observations".into()
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            ingest: d_ingest(),
            firehose: d_firehose(),
            observations: d_observations(),
        }
    }
}
