//! Wire entities shared by every stream: `ChatMessage`, `StreamObservation`,
//! and the opaque perceptor inputs. Every record carries `schema_name`,
//! `schema_version`, a globally unique `id`, a UTC millisecond `ts`, and a
//! `room_id` — the envelope the Schema Validator checks at every boundary.

use serde::{Deserialize, Serialize};

use crate::trace::Trace;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Origin of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Human,
    Bot,
    System,
}

/// Outcome of the Safety Filter pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyAction {
    Allow,
    Redact,
    Drop,
}

/// Moderation metadata stamped onto a [`ChatMessage`] by the Safety Filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModerationMeta {
    pub action: Option<SafetyAction>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub redactions: Vec<String>,
}

/// A single chat line flowing through `ingest` / `firehose`.
///
/// `content` must be exactly one line (no embedded newlines) and at most
/// `max_chars`; this is enforced by the Safety Filter's normalize step, not
/// by this struct's constructor, so that invalid wire payloads can still be
/// deserialized and rejected with a structured [`crate::error::Error`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub schema_name: String,
    pub schema_version: u32,
    pub id: String,
    pub ts: i64,
    pub room_id: String,

    pub origin: Origin,
    pub user_id: String,
    pub display_name: String,
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub emotes: Vec<String>,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderation: Option<ModerationMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Trace>,
}

pub const CHAT_MESSAGE_SCHEMA: &str = "chat.message";
pub const CHAT_MESSAGE_SCHEMA_VERSION: u32 = 1;

impl ChatMessage {
    /// Build a new human/bot/system chat message with a fresh id and
    /// current timestamp, ready for `publish` to `ingest`.
    pub fn new(room_id: impl Into<String>, origin: Origin, user_id: impl Into<String>, display_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            schema_name: CHAT_MESSAGE_SCHEMA.to_string(),
            schema_version: CHAT_MESSAGE_SCHEMA_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            ts: now_ms(),
            room_id: room_id.into(),
            origin,
            user_id: user_id.into(),
            display_name: display_name.into(),
            content: content.into(),
            mentions: Vec::new(),
            emotes: Vec::new(),
            badges: Vec::new(),
            style: None,
            moderation: None,
            trace: None,
        }
    }

    /// `true` when `content` mentions (or replies to) `persona_display`,
    /// matched case-insensitively against an `@name` token or the
    /// `mentions` list.
    pub fn mentions_persona(&self, persona_display: &str) -> bool {
        let needle = persona_display.to_lowercase();
        if self
            .mentions
            .iter()
            .any(|m| m.trim_start_matches('@').to_lowercase() == needle)
        {
            return true;
        }
        self.content
            .split_whitespace()
            .any(|tok| tok.trim_start_matches('@').trim_end_matches(|c: char| !c.is_alphanumeric()).to_lowercase() == needle)
    }
}

/// A periodic structured snapshot of what is happening on stream, produced
/// by the (out-of-scope) perceptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamObservation {
    pub schema_name: String,
    pub schema_version: u32,
    pub id: String,
    pub ts: i64,
    pub room_id: String,

    pub frame_id: String,
    pub frame_sha256: String,
    #[serde(default)]
    pub transcript_ids: Vec<String>,
    /// Human-readable summary, capped at 512 chars; marker tokens (e.g.
    /// `E2E_TEST_...`) are preserved verbatim so downstream policy can see
    /// them if a test drives an observation directly.
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Mentions without the leading `@`.
    #[serde(default)]
    pub entities: Vec<String>,
    pub hype_level: f64,
    #[serde(default)]
    pub safety: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Trace>,
}

pub const STREAM_OBSERVATION_SCHEMA: &str = "stream.observation";
pub const STREAM_OBSERVATION_SCHEMA_VERSION: u32 = 1;

impl StreamObservation {
    pub fn hype_level_clamped(&self) -> f64 {
        self.hype_level.clamp(0.0, 1.0)
    }
}

/// Opaque perceptor input — metadata only, never interpreted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFrame {
    pub schema_name: String,
    pub schema_version: u32,
    pub id: String,
    pub ts: i64,
    pub room_id: String,
    pub path: String,
    pub sha256: String,
}

/// Opaque perceptor input — metadata only, never interpreted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamTranscriptSegment {
    pub schema_name: String,
    pub schema_version: u32,
    pub id: String,
    pub ts: i64,
    pub room_id: String,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_persona_matches_at_token() {
        let msg = ChatMessage::new("room:demo", Origin::Human, "u1", "Viewer", "hey @ClipGoblin sup");
        assert!(msg.mentions_persona("ClipGoblin"));
        assert!(!msg.mentions_persona("OtherBot"));
    }

    #[test]
    fn mentions_persona_matches_mentions_list() {
        let mut msg = ChatMessage::new("room:demo", Origin::Human, "u1", "Viewer", "no at-token here");
        msg.mentions.push("@ClipGoblin".to_string());
        assert!(msg.mentions_persona("ClipGoblin"));
    }

    #[test]
    fn hype_level_is_clamped() {
        let obs = StreamObservation {
            schema_name: STREAM_OBSERVATION_SCHEMA.into(),
            schema_version: STREAM_OBSERVATION_SCHEMA_VERSION,
            id: "o1".into(),
            ts: 0,
            room_id: "room:demo".into(),
            frame_id: "f1".into(),
            frame_sha256: "deadbeef".into(),
            transcript_ids: vec![],
            summary: "lava rises!!!".into(),
            tags: vec![],
            entities: vec![],
            hype_level: 1.5,
            safety: vec![],
            trace: None,
        };
        assert_eq!(obs.hype_level_clamped(), 1.0);
    }
}
