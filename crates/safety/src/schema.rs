//! Schema Validator: the one place every stream entry is checked against its
//! declared `schema_name`/`schema_version` before anything downstream trusts
//! it.

use chatstorm_domain::{
    Error, Result, ChatMessage, StreamObservation, CHAT_MESSAGE_SCHEMA, CHAT_MESSAGE_SCHEMA_VERSION,
    STREAM_OBSERVATION_SCHEMA, STREAM_OBSERVATION_SCHEMA_VERSION,
};
use serde_json::Value;

fn envelope_fields<'a>(raw: &'a Value) -> Option<(&'a str, u32, &'a str, &'a str)> {
    let schema_name = raw.get("schema_name")?.as_str()?;
    let schema_version = raw.get("schema_version")?.as_u64()? as u32;
    let id = raw.get("id")?.as_str()?;
    let room_id = raw.get("room_id")?.as_str()?;
    Some((schema_name, schema_version, id, room_id))
}

fn schema_invalid(schema_name: &str, schema_version: u32, path: &str, message: impl Into<String>) -> Error {
    Error::SchemaInvalid {
        schema_name: schema_name.to_string(),
        schema_version,
        path: path.to_string(),
        message: message.into(),
    }
}

/// Parse and validate a raw bus payload as a [`ChatMessage`]. Rejects
/// anything whose envelope doesn't match `chat.message` v1, or whose `id`
/// or `room_id` is empty.
pub fn validate_chat_message(raw: &Value) -> Result<ChatMessage> {
    let (schema_name, schema_version, id, room_id) = envelope_fields(raw).ok_or_else(|| {
        schema_invalid(
            "unknown",
            0,
            "$",
            "missing one of schema_name/schema_version/id/room_id",
        )
    })?;
    if schema_name != CHAT_MESSAGE_SCHEMA || schema_version != CHAT_MESSAGE_SCHEMA_VERSION {
        return Err(schema_invalid(
            schema_name,
            schema_version,
            "$",
            format!(
                "expected {CHAT_MESSAGE_SCHEMA} v{CHAT_MESSAGE_SCHEMA_VERSION}, got {schema_name} v{schema_version}"
            ),
        ));
    }
    if id.is_empty() {
        return Err(schema_invalid(schema_name, schema_version, "$.id", "id must not be empty"));
    }
    if room_id.is_empty() {
        return Err(schema_invalid(
            schema_name,
            schema_version,
            "$.room_id",
            "room_id must not be empty",
        ));
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| schema_invalid(schema_name, schema_version, "$", e.to_string()))
}

/// Parse and validate a raw bus payload as a [`StreamObservation`].
pub fn validate_stream_observation(raw: &Value) -> Result<StreamObservation> {
    let (schema_name, schema_version, id, room_id) = envelope_fields(raw).ok_or_else(|| {
        schema_invalid(
            "unknown",
            0,
            "$",
            "missing one of schema_name/schema_version/id/room_id",
        )
    })?;
    if schema_name != STREAM_OBSERVATION_SCHEMA || schema_version != STREAM_OBSERVATION_SCHEMA_VERSION {
        return Err(schema_invalid(
            schema_name,
            schema_version,
            "$",
            format!(
                "expected {STREAM_OBSERVATION_SCHEMA} v{STREAM_OBSERVATION_SCHEMA_VERSION}, got {schema_name} v{schema_version}"
            ),
        ));
    }
    if id.is_empty() || room_id.is_empty() {
        return Err(schema_invalid(
            schema_name,
            schema_version,
            "$",
            "id and room_id must not be empty",
        ));
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| schema_invalid(schema_name, schema_version, "$", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatstorm_domain::Origin;
    use serde_json::json;

    #[test]
    fn valid_chat_message_round_trips() {
        let msg = ChatMessage::new("room:demo", Origin::Human, "u1", "Viewer", "hi");
        let raw = serde_json::to_value(&msg).unwrap();
        let parsed = validate_chat_message(&raw).unwrap();
        assert_eq!(parsed.id, msg.id);
    }

    #[test]
    fn wrong_schema_name_is_rejected() {
        let raw = json!({
            "schema_name": "something.else",
            "schema_version": 1,
            "id": "x",
            "room_id": "room:demo",
        });
        let err = validate_chat_message(&raw).unwrap_err();
        assert!(matches!(err, Error::SchemaInvalid { .. }));
    }

    #[test]
    fn empty_room_id_is_rejected() {
        let mut raw = serde_json::to_value(ChatMessage::new(
            "room:demo",
            Origin::Human,
            "u1",
            "Viewer",
            "hi",
        ))
        .unwrap();
        raw["room_id"] = json!("");
        let err = validate_chat_message(&raw).unwrap_err();
        assert!(matches!(err, Error::SchemaInvalid { .. }));
    }
}
