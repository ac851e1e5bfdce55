use crate::{Bus, BusError, Result, StreamEntry};
use async_trait::async_trait;
use rand::Rng;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, error, warn};

const PAYLOAD_FIELD: &str = "payload";
const DEGRADED_AFTER_FAILURES: u32 = 3;

impl From<RedisError> for BusError {
    fn from(err: RedisError) -> Self {
        BusError::Command(err.to_string())
    }
}

/// Redis Streams-backed [`Bus`]. Connects through a
/// [`ConnectionManager`], which reconnects transparently; consecutive
/// command failures are tracked so callers can surface a degraded health
/// status instead of hard-failing.
pub struct RedisBus {
    conn: ConnectionManager,
    backoff_min_ms: u64,
    backoff_max_ms: u64,
    consecutive_failures: AtomicU32,
    degraded: AtomicBool,
}

impl RedisBus {
    pub async fn connect(redis_url: &str, backoff_min_ms: u64, backoff_max_ms: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| BusError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        Ok(Self {
            conn,
            backoff_min_ms,
            backoff_max_ms,
            consecutive_failures: AtomicU32::new(0),
            degraded: AtomicBool::new(false),
        })
    }

    fn note_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.degraded.store(false, Ordering::SeqCst);
    }

    fn note_failure(&self) {
        let n = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= DEGRADED_AFTER_FAILURES {
            self.degraded.store(true, Ordering::SeqCst);
        }
    }

    /// Exponential backoff with +/-20% jitter, clamped to `backoff_max_ms`.
    /// Callers use this between retries of a failed `group_read`/`publish`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.backoff_min_ms.saturating_mul(1u64 << attempt.min(16));
        let capped = base.min(self.backoff_max_ms);
        let jitter_frac = rand::thread_rng().gen_range(-0.2..=0.2);
        let jittered = (capped as f64) * (1.0 + jitter_frac);
        Duration::from_millis(jittered.max(0.0) as u64)
    }

    fn decode_entry(id: String, fields: Vec<(String, String)>) -> Option<StreamEntry> {
        let raw = fields
            .into_iter()
            .find(|(k, _)| k == PAYLOAD_FIELD)
            .map(|(_, v)| v)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(payload) => Some(StreamEntry { id, payload }),
            Err(e) => {
                warn!(entry_id = %id, error = %e, "dropping stream entry with invalid payload");
                None
            }
        }
    }
}

#[async_trait]
impl Bus for RedisBus {
    async fn publish(&self, stream: &str, payload: &Value) -> Result<String> {
        let encoded = serde_json::to_string(payload)
            .map_err(|e| BusError::Decode(e.to_string()))?;
        let mut conn = self.conn.clone();
        let result: std::result::Result<String, RedisError> = conn
            .xadd(stream, "*", &[(PAYLOAD_FIELD, encoded.as_str())])
            .await;
        match result {
            Ok(id) => {
                self.note_success();
                Ok(id)
            }
            Err(e) => {
                self.note_failure();
                error!(%stream, error = %e, "xadd failed");
                Err(e.into())
            }
        }
    }

    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let result: std::result::Result<(), RedisError> = conn
            .xgroup_create_mkstream(stream, group, "0")
            .await;
        match result {
            Ok(()) => {
                self.note_success();
                Ok(())
            }
            // BUSYGROUP means the group already exists, which is fine.
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                self.note_success();
                Ok(())
            }
            Err(e) => {
                self.note_failure();
                Err(e.into())
            }
        }
    }

    async fn group_read(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamEntry>> {
        let mut conn = self.conn.clone();
        let opts = redis::streams::StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block_ms as usize);
        let result: std::result::Result<redis::streams::StreamReadReply, RedisError> = conn
            .xread_options(&[stream], &[">"], &opts)
            .await;
        match result {
            Ok(reply) => {
                self.note_success();
                let mut entries = Vec::new();
                for key in reply.keys {
                    for id in key.ids {
                        let fields: Vec<(String, String)> = id
                            .map
                            .into_iter()
                            .filter_map(|(k, v)| match v {
                                redis::Value::BulkString(bytes) => {
                                    String::from_utf8(bytes).ok().map(|s| (k, s))
                                }
                                _ => None,
                            })
                            .collect();
                        if let Some(entry) = Self::decode_entry(id.id, fields) {
                            entries.push(entry);
                        }
                    }
                }
                debug!(%stream, %group, count = entries.len(), "group_read");
                Ok(entries)
            }
            Err(e) => {
                self.note_failure();
                Err(e.into())
            }
        }
    }

    async fn ack(&self, stream: &str, group: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let result: std::result::Result<i64, RedisError> = conn.xack(stream, group, ids).await;
        match result {
            Ok(_) => {
                self.note_success();
                Ok(())
            }
            Err(e) => {
                self.note_failure();
                Err(e.into())
            }
        }
    }

    async fn tail_range(&self, stream: &str, count: usize) -> Result<Vec<StreamEntry>> {
        let mut conn = self.conn.clone();
        let result: std::result::Result<Vec<(String, Vec<(String, String)>)>, RedisError> = conn
            .xrevrange_count(stream, "+", "-", count)
            .await;
        match result {
            Ok(rows) => {
                self.note_success();
                let mut entries: Vec<StreamEntry> = rows
                    .into_iter()
                    .filter_map(|(id, fields)| Self::decode_entry(id, fields))
                    .collect();
                entries.reverse();
                Ok(entries)
            }
            Err(e) => {
                self.note_failure();
                Err(e.into())
            }
        }
    }

    fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }
}
