//! In-memory [`Bus`] used by gateway and persona-worker integration tests so
//! they don't need a running Redis instance.

use crate::{Bus, Result, StreamEntry};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct StreamState {
    entries: Vec<StreamEntry>,
    groups: HashMap<String, GroupState>,
}

#[derive(Default)]
struct GroupState {
    next_unread: usize,
    pending: HashSet<String>,
}

/// Single-process stand-in for Redis Streams. Entries are never evicted, so
/// tests can freely call `tail_range` after a sequence of `publish`es.
pub struct MemoryBus {
    streams: Mutex<HashMap<String, StreamState>>,
    next_id: AtomicU64,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Bus for MemoryBus {
    async fn publish(&self, stream: &str, payload: &Value) -> Result<String> {
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("{seq}-0");
        let mut streams = self.streams.lock();
        streams
            .entry(stream.to_string())
            .or_default()
            .entries
            .push(StreamEntry {
                id: id.clone(),
                payload: payload.clone(),
            });
        Ok(id)
    }

    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut streams = self.streams.lock();
        streams
            .entry(stream.to_string())
            .or_default()
            .groups
            .entry(group.to_string())
            .or_default();
        Ok(())
    }

    async fn group_read(
        &self,
        stream: &str,
        group: &str,
        _consumer: &str,
        count: usize,
        _block_ms: u64,
    ) -> Result<Vec<StreamEntry>> {
        let mut streams = self.streams.lock();
        let state = streams.entry(stream.to_string()).or_default();
        let total = state.entries.len();
        let group_state = state.groups.entry(group.to_string()).or_default();
        let start = group_state.next_unread.min(total);
        let end = (start + count).min(total);
        let batch: Vec<StreamEntry> = state.entries[start..end].to_vec();
        group_state.next_unread = end;
        for entry in &batch {
            group_state.pending.insert(entry.id.clone());
        }
        Ok(batch)
    }

    async fn ack(&self, stream: &str, group: &str, ids: &[String]) -> Result<()> {
        let mut streams = self.streams.lock();
        if let Some(state) = streams.get_mut(stream) {
            if let Some(group_state) = state.groups.get_mut(group) {
                for id in ids {
                    group_state.pending.remove(id);
                }
            }
        }
        Ok(())
    }

    async fn tail_range(&self, stream: &str, count: usize) -> Result<Vec<StreamEntry>> {
        let streams = self.streams.lock();
        let Some(state) = streams.get(stream) else {
            return Ok(Vec::new());
        };
        let total = state.entries.len();
        let start = total.saturating_sub(count);
        Ok(state.entries[start..].to_vec())
    }
}

/// Convenience constructor for tests that need shared ownership.
pub fn shared_memory_bus() -> Arc<MemoryBus> {
    Arc::new(MemoryBus::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_then_group_read_returns_entry() {
        let bus = MemoryBus::new();
        bus.ensure_group("s", "g").await.unwrap();
        bus.publish("s", &json!({"a": 1})).await.unwrap();
        let batch = bus.group_read("s", "g", "c1", 10, 0).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].payload, json!({"a": 1}));
    }

    #[tokio::test]
    async fn group_read_does_not_redeliver_without_new_entries() {
        let bus = MemoryBus::new();
        bus.ensure_group("s", "g").await.unwrap();
        bus.publish("s", &json!({"a": 1})).await.unwrap();
        let first = bus.group_read("s", "g", "c1", 10, 0).await.unwrap();
        let second = bus.group_read("s", "g", "c1", 10, 0).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn two_groups_each_see_all_entries() {
        let bus = MemoryBus::new();
        bus.ensure_group("s", "g1").await.unwrap();
        bus.ensure_group("s", "g2").await.unwrap();
        bus.publish("s", &json!({"a": 1})).await.unwrap();
        let g1 = bus.group_read("s", "g1", "c", 10, 0).await.unwrap();
        let g2 = bus.group_read("s", "g2", "c", 10, 0).await.unwrap();
        assert_eq!(g1.len(), 1);
        assert_eq!(g2.len(), 1);
    }

    #[tokio::test]
    async fn tail_range_returns_most_recent_entries_in_order() {
        let bus = MemoryBus::new();
        for i in 0..5 {
            bus.publish("s", &json!({"i": i})).await.unwrap();
        }
        let tail = bus.tail_range("s", 2).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].payload, json!({"i": 3}));
        assert_eq!(tail[1].payload, json!({"i": 4}));
    }
}
