//! Per-persona worker state: posting history, reflection bookkeeping, and
//! the dedupe set that lets a persona survive at-least-once redelivery of
//! the same `firehose` entry.

use std::collections::{HashSet, VecDeque};

use chatstorm_domain::{ChatMessage, DriftKnobs};

use chatstorm_policy::PersonaPostingState;

const SEEN_TRIGGER_CAPACITY: usize = 4_096;
const OWN_MESSAGE_WINDOW: usize = 32;

/// Work handed to a persona's inbox by the firehose/observation dispatchers.
#[derive(Debug, Clone)]
pub enum WorkerInbox {
    Trigger(ChatMessage),
    AutoFire(chatstorm_domain::StreamObservation),
}

/// Everything one persona's loops need to remember between messages.
/// Guarded by a single mutex per the concurrency model: held only while
/// counters are read or updated, never across generation or bus I/O.
pub struct PersonaState {
    pub last_post_ts: i64,
    pub last_auto_post_ts: i64,
    post_times: VecDeque<i64>,
    seen_trigger_ids: VecDeque<String>,
    seen_trigger_set: HashSet<String>,
    pub own_messages: VecDeque<String>,
    pub own_messages_since_reflection: u32,
    pub last_reflection_ts: i64,
    pub drift: DriftKnobs,
}

impl PersonaState {
    pub fn new(drift: DriftKnobs, now_ms: i64) -> Self {
        Self {
            last_post_ts: 0,
            last_auto_post_ts: 0,
            post_times: VecDeque::new(),
            seen_trigger_ids: VecDeque::new(),
            seen_trigger_set: HashSet::new(),
            own_messages: VecDeque::new(),
            own_messages_since_reflection: 0,
            last_reflection_ts: now_ms,
            drift,
        }
    }

    /// `true` if `trigger_id` was already processed; otherwise records it
    /// and returns `false`.
    pub fn mark_seen(&mut self, trigger_id: &str) -> bool {
        if self.seen_trigger_set.contains(trigger_id) {
            return true;
        }
        self.seen_trigger_set.insert(trigger_id.to_string());
        self.seen_trigger_ids.push_back(trigger_id.to_string());
        while self.seen_trigger_ids.len() > SEEN_TRIGGER_CAPACITY {
            if let Some(oldest) = self.seen_trigger_ids.pop_front() {
                self.seen_trigger_set.remove(&oldest);
            }
        }
        false
    }

    /// Number of posts within the trailing `window_s` seconds, trimming
    /// anything older as a side effect.
    pub fn posts_in_window(&mut self, now_ms: i64, window_s: u64) -> u32 {
        let cutoff = now_ms - (window_s as i64) * 1_000;
        while self.post_times.front().map(|t| *t < cutoff).unwrap_or(false) {
            self.post_times.pop_front();
        }
        self.post_times.len() as u32
    }

    pub fn posting_state(&mut self, now_ms: i64, window_s: u64) -> PersonaPostingState {
        PersonaPostingState {
            last_post_ts: self.last_post_ts,
            posts_in_window: self.posts_in_window(now_ms, window_s),
            talkativeness: self.drift.talkativeness(),
        }
    }

    pub fn record_post(&mut self, now_ms: i64, content: &str) {
        self.last_post_ts = now_ms;
        self.post_times.push_back(now_ms);
        self.own_messages.push_back(content.to_string());
        while self.own_messages.len() > OWN_MESSAGE_WINDOW {
            self.own_messages.pop_front();
        }
        self.own_messages_since_reflection += 1;
    }

    pub fn record_auto_post(&mut self, now_ms: i64) {
        self.last_auto_post_ts = now_ms;
    }

    pub fn due_for_reflection(&self, now_ms: i64, interval_s: u64, message_count: u32) -> bool {
        let elapsed_s = (now_ms - self.last_reflection_ts).max(0) / 1_000;
        elapsed_s as u64 >= interval_s || self.own_messages_since_reflection >= message_count
    }

    pub fn reset_reflection(&mut self, now_ms: i64) {
        self.last_reflection_ts = now_ms;
        self.own_messages_since_reflection = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_seen_reports_duplicates() {
        let mut state = PersonaState::new(DriftKnobs::default(), 0);
        assert!(!state.mark_seen("t1"));
        assert!(state.mark_seen("t1"));
    }

    #[test]
    fn posts_in_window_trims_old_entries() {
        let mut state = PersonaState::new(DriftKnobs::default(), 0);
        state.record_post(1_000, "hi");
        state.record_post(2_000, "yo");
        assert_eq!(state.posts_in_window(2_000, 60), 2);
        assert_eq!(state.posts_in_window(100_000, 60), 0);
    }

    #[test]
    fn due_for_reflection_on_message_count() {
        let mut state = PersonaState::new(DriftKnobs::default(), 0);
        for i in 0..20 {
            state.record_post(i, "x");
        }
        assert!(state.due_for_reflection(0, 300, 20));
    }

    #[test]
    fn due_for_reflection_on_interval() {
        let state = PersonaState::new(DriftKnobs::default(), 0);
        assert!(state.due_for_reflection(300_000, 300, 20));
        assert!(!state.due_for_reflection(1_000, 300, 20));
    }
}
