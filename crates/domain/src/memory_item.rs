use serde::{Deserialize, Serialize};

/// Confidence level attached to an extracted memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Med,
    High,
}

/// Kind of durable fact extracted about a room/persona relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryItemType {
    Relationship,
    Catchphrase,
    Preference,
    LoreEvent,
    PersonaDrift,
    Note,
}

/// A single durable fact written only by reflection/extraction, scoped to
/// `(room, persona)`. Never stores raw chat lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    pub scope_room: String,
    pub scope_persona: String,
    #[serde(rename = "type")]
    pub item_type: MemoryItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub confidence: Confidence,
    pub source: String,
    pub content: String,
}

/// Build the memory-adapter namespace string for a `(room, persona)` scope.
pub fn namespace(room_id: &str, persona_id: &str) -> String {
    format!("room:{room_id}|agent:{persona_id}")
}
