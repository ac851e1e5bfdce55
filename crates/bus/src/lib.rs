//! Redis Streams abstraction used as the at-least-once event bus between the
//! gateway and persona workers. Every stream entry carries a single `payload`
//! field holding a JSON-encoded domain message; callers never see raw field
//! maps.

pub mod redis_bus;
pub mod testing;

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus connection error: {0}")]
    Connection(String),
    #[error("bus command error: {0}")]
    Command(String),
    #[error("payload was not valid JSON: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, BusError>;

/// A single entry read back from a stream.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: String,
    pub payload: Value,
}

/// Minimal at-least-once pub/sub abstraction over a Redis stream. Implemented
/// by [`redis_bus::RedisBus`] in production and [`testing::MemoryBus`] in
/// tests.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Append `payload` to `stream`, returning the entry id Redis assigned.
    /// Takes an already-encoded [`Value`] (rather than a generic `Serialize`)
    /// so the trait stays object-safe for `Arc<dyn Bus>` callers.
    async fn publish(&self, stream: &str, payload: &Value) -> Result<String>;

    /// Create `group` on `stream` starting from the beginning, if it doesn't
    /// already exist. Idempotent.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()>;

    /// Read up to `count` new entries for `consumer` in `group`, blocking for
    /// at most `block_ms` milliseconds if none are immediately available.
    async fn group_read(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamEntry>>;

    /// Acknowledge processed entries so they leave the group's pending list.
    async fn ack(&self, stream: &str, group: &str, ids: &[String]) -> Result<()>;

    /// Return the most recent `count` entries on `stream`, newest last.
    /// Used by the observation buffer to reload recent frames on startup.
    async fn tail_range(&self, stream: &str, count: usize) -> Result<Vec<StreamEntry>>;

    /// True once the bus has observed enough consecutive failures that
    /// callers should treat reads/writes as temporarily unavailable.
    fn is_degraded(&self) -> bool {
        false
    }
}
