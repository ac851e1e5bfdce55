//! Observation Buffer: per-room ring of the most recent [`StreamObservation`]
//! snapshots, bounded by count (`K`) and age (`ttl_ms`).

use chatstorm_domain::StreamObservation;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

const DEFAULT_K: usize = 32;
const DEFAULT_TTL_MS: i64 = 120_000;

struct RoomRing {
    entries: VecDeque<StreamObservation>,
}

impl RoomRing {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

pub struct ObservationBuffer {
    k: usize,
    ttl_ms: i64,
    rooms: RwLock<HashMap<String, RoomRing>>,
}

impl Default for ObservationBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_K, DEFAULT_TTL_MS)
    }
}

impl ObservationBuffer {
    pub fn new(k: usize, ttl_ms: i64) -> Self {
        Self {
            k,
            ttl_ms,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a validated observation, evicting anything older than `ttl_ms`
    /// relative to `now_ms` and trimming to `k` entries.
    pub fn insert(&self, obs: StreamObservation, now_ms: i64) {
        let mut rooms = self.rooms.write();
        let ring = rooms
            .entry(obs.room_id.clone())
            .or_insert_with(RoomRing::new);
        ring.entries.push_back(obs);
        while ring.entries.len() > self.k {
            ring.entries.pop_front();
        }
        let cutoff = now_ms - self.ttl_ms;
        while ring
            .entries
            .front()
            .map(|o| o.ts < cutoff)
            .unwrap_or(false)
        {
            ring.entries.pop_front();
        }
    }

    /// Newest-first slice of up to `n` live observations for `room_id`.
    pub fn latest(&self, room_id: &str, n: usize, now_ms: i64) -> Vec<StreamObservation> {
        let rooms = self.rooms.read();
        let Some(ring) = rooms.get(room_id) else {
            return Vec::new();
        };
        let cutoff = now_ms - self.ttl_ms;
        ring.entries
            .iter()
            .rev()
            .filter(|o| o.ts >= cutoff)
            .take(n)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatstorm_domain::{STREAM_OBSERVATION_SCHEMA, STREAM_OBSERVATION_SCHEMA_VERSION};

    fn obs(room: &str, id: &str, ts: i64) -> StreamObservation {
        StreamObservation {
            schema_name: STREAM_OBSERVATION_SCHEMA.into(),
            schema_version: STREAM_OBSERVATION_SCHEMA_VERSION,
            id: id.into(),
            ts,
            room_id: room.into(),
            frame_id: "f".into(),
            frame_sha256: "sha".into(),
            transcript_ids: vec![],
            summary: "something happened".into(),
            tags: vec![],
            entities: vec![],
            hype_level: 0.5,
            safety: vec![],
            trace: None,
        }
    }

    #[test]
    fn latest_returns_newest_first() {
        let buf = ObservationBuffer::new(32, 120_000);
        buf.insert(obs("room:a", "o1", 1_000), 1_000);
        buf.insert(obs("room:a", "o2", 2_000), 2_000);
        let latest = buf.latest("room:a", 2, 2_000);
        assert_eq!(latest[0].id, "o2");
        assert_eq!(latest[1].id, "o1");
    }

    #[test]
    fn entries_beyond_k_are_evicted() {
        let buf = ObservationBuffer::new(2, 120_000);
        buf.insert(obs("room:a", "o1", 1_000), 1_000);
        buf.insert(obs("room:a", "o2", 1_000), 1_000);
        buf.insert(obs("room:a", "o3", 1_000), 1_000);
        let latest = buf.latest("room:a", 10, 1_000);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].id, "o3");
    }

    #[test]
    fn entries_past_ttl_are_excluded() {
        let buf = ObservationBuffer::new(32, 1_000);
        buf.insert(obs("room:a", "o1", 1_000), 1_000);
        let latest = buf.latest("room:a", 10, 5_000);
        assert!(latest.is_empty());
    }

    #[test]
    fn unknown_room_returns_empty() {
        let buf = ObservationBuffer::default();
        assert!(buf.latest("room:nope", 5, 0).is_empty());
    }
}
