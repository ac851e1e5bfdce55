//! Chat Window: per-room ring of recent `firehose` messages, bounded by both
//! count (`M`) and age (`T`) — whichever bound is reached first wins.

use chatstorm_domain::{ChatMessage, Origin};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

const DEFAULT_M: usize = 200;
const DEFAULT_T_MS: i64 = 10_000;

struct RoomWindow {
    entries: VecDeque<ChatMessage>,
}

impl RoomWindow {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

pub struct ChatWindow {
    m: usize,
    t_ms: i64,
    rooms: RwLock<HashMap<String, RoomWindow>>,
}

impl Default for ChatWindow {
    fn default() -> Self {
        Self::new(DEFAULT_M, DEFAULT_T_MS)
    }
}

impl ChatWindow {
    pub fn new(m: usize, t_ms: i64) -> Self {
        Self {
            m,
            t_ms,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    fn trim(&self, window: &mut RoomWindow, now_ms: i64) {
        while window.entries.len() > self.m {
            window.entries.pop_front();
        }
        let cutoff = now_ms - self.t_ms;
        while window
            .entries
            .front()
            .map(|m| m.ts < cutoff)
            .unwrap_or(false)
        {
            window.entries.pop_front();
        }
    }

    pub fn insert(&self, msg: ChatMessage, now_ms: i64) {
        let mut rooms = self.rooms.write();
        let window = rooms
            .entry(msg.room_id.clone())
            .or_insert_with(RoomWindow::new);
        window.entries.push_back(msg);
        self.trim(window, now_ms);
    }

    /// Newest-first slice of up to `n` messages currently in the window.
    pub fn recent(&self, room_id: &str, n: usize) -> Vec<ChatMessage> {
        let rooms = self.rooms.read();
        let Some(window) = rooms.get(room_id) else {
            return Vec::new();
        };
        window.entries.iter().rev().take(n).cloned().collect()
    }

    /// Messages per second over the trailing `window_s` seconds.
    pub fn rate_per_sec(&self, room_id: &str, window_s: u64, now_ms: i64) -> f64 {
        let rooms = self.rooms.read();
        let Some(window) = rooms.get(room_id) else {
            return 0.0;
        };
        let cutoff = now_ms - (window_s as i64) * 1_000;
        let count = window.entries.iter().filter(|m| m.ts >= cutoff).count();
        count as f64 / window_s.max(1) as f64
    }

    /// Fraction of messages in the trailing `window_s` seconds whose origin
    /// is `bot`. Returns 0.0 when the window is empty.
    pub fn bot_fraction(&self, room_id: &str, window_s: u64, now_ms: i64) -> f64 {
        let rooms = self.rooms.read();
        let Some(window) = rooms.get(room_id) else {
            return 0.0;
        };
        let cutoff = now_ms - (window_s as i64) * 1_000;
        let in_window: Vec<&ChatMessage> = window.entries.iter().filter(|m| m.ts >= cutoff).collect();
        if in_window.is_empty() {
            return 0.0;
        }
        let bot_count = in_window.iter().filter(|m| m.origin == Origin::Bot).count();
        bot_count as f64 / in_window.len() as f64
    }

    /// Count of messages in the trailing `within_s` seconds that mention
    /// `persona_display`.
    pub fn mention_hits(&self, room_id: &str, persona_display: &str, within_s: u64, now_ms: i64) -> usize {
        let rooms = self.rooms.read();
        let Some(window) = rooms.get(room_id) else {
            return 0;
        };
        let cutoff = now_ms - (within_s as i64) * 1_000;
        window
            .entries
            .iter()
            .filter(|m| m.ts >= cutoff && m.mentions_persona(persona_display))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(room: &str, origin: Origin, content: &str, ts: i64) -> ChatMessage {
        let mut m = ChatMessage::new(room, origin, "u1", "Viewer", content);
        m.ts = ts;
        m
    }

    #[test]
    fn recent_returns_newest_first() {
        let w = ChatWindow::new(200, 10_000);
        w.insert(msg("room:a", Origin::Human, "one", 1_000), 1_000);
        w.insert(msg("room:a", Origin::Human, "two", 1_500), 1_500);
        let recent = w.recent("room:a", 5);
        assert_eq!(recent[0].content, "two");
        assert_eq!(recent[1].content, "one");
    }

    #[test]
    fn entries_beyond_m_are_evicted() {
        let w = ChatWindow::new(2, 100_000);
        for i in 0..5 {
            w.insert(msg("room:a", Origin::Human, "x", 1_000 + i), 1_000 + i);
        }
        assert_eq!(w.recent("room:a", 10).len(), 2);
    }

    #[test]
    fn entries_past_t_are_evicted() {
        let w = ChatWindow::new(200, 1_000);
        w.insert(msg("room:a", Origin::Human, "old", 1_000), 1_000);
        w.insert(msg("room:a", Origin::Human, "new", 5_000), 5_000);
        assert_eq!(w.recent("room:a", 10).len(), 1);
    }

    #[test]
    fn rate_per_sec_counts_within_window() {
        let w = ChatWindow::new(200, 100_000);
        for i in 0..10 {
            w.insert(msg("room:a", Origin::Human, "x", i * 100), i * 100);
        }
        let rate = w.rate_per_sec("room:a", 1, 900);
        assert!(rate > 0.0);
    }

    #[test]
    fn bot_fraction_computed_over_window() {
        let w = ChatWindow::new(200, 100_000);
        w.insert(msg("room:a", Origin::Bot, "b", 1_000), 1_000);
        w.insert(msg("room:a", Origin::Human, "h", 1_000), 1_000);
        let frac = w.bot_fraction("room:a", 60, 1_000);
        assert_eq!(frac, 0.5);
    }

    #[test]
    fn mention_hits_counts_matches() {
        let w = ChatWindow::new(200, 100_000);
        w.insert(msg("room:a", Origin::Human, "hey @ClipGoblin", 1_000), 1_000);
        w.insert(msg("room:a", Origin::Human, "no mention", 1_000), 1_000);
        assert_eq!(w.mention_hits("room:a", "ClipGoblin", 60, 1_000), 1);
    }
}
