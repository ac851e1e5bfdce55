//! Bridges `chat.ingest` to WebSocket subscribers and `chat.firehose`.
//!
//! Algorithm, run once per group-read batch:
//! 1. consume `ingest` under a durable consumer group
//! 2. validate schema; drop + ack on failure
//! 3. run the Safety Filter; `drop` acks without publishing anywhere
//! 4. stamp `trace` (preserve producer, append `chat_gateway`, set `gateway_ts`)
//! 5. fan out to WebSocket subscribers of `room_id`
//! 6. publish the finalized record on `firehose`
//! 7. ack `ingest`

use std::sync::atomic::Ordering;
use std::time::Duration;

use chatstorm_domain::{ChatMessage, TraceEvent, Trace};
use chatstorm_protocol::ServerMessage;
use chatstorm_safety::{schema, filter};
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

const CONSUMER_NAME: &str = "chatstorm-gateway";
const BATCH_SIZE: usize = 32;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Runs until `shutdown` is cancelled.
pub async fn run(state: AppState, shutdown: CancellationToken) {
    let stream = &state.config.streams.ingest;
    let group = &state.config.bus.consumer_group;

    if let Err(e) = state.bus.ensure_group(stream, group).await {
        tracing::error!(error = %e, stream, group, "failed to ensure consumer group; broadcaster exiting");
        return;
    }
    state.group_joined.store(true, Ordering::Relaxed);

    tracing::info!(stream, group, "broadcaster started");

    loop {
        if shutdown.is_cancelled() {
            tracing::info!("broadcaster shutting down");
            return;
        }

        let entries = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!("broadcaster shutting down");
                return;
            }
            result = state.bus.group_read(
                stream,
                group,
                CONSUMER_NAME,
                BATCH_SIZE,
                state.config.bus.block_ms,
            ) => match result {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(error = %e, "ingest group_read failed, backing off");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    continue;
                }
            },
        };

        for entry in entries {
            process_one(&state, &entry.id, &entry.payload).await;
            if let Err(e) = state.bus.ack(stream, group, &[entry.id.clone()]).await {
                tracing::warn!(error = %e, entry_id = %entry.id, "failed to ack ingest entry");
            }
        }
    }
}

async fn process_one(state: &AppState, entry_id: &str, raw: &serde_json::Value) {
    let mut msg = match schema::validate_chat_message(raw) {
        Ok(msg) => msg,
        Err(e) => {
            state
                .stats
                .messages_dropped_schema_invalid
                .fetch_add(1, Ordering::Relaxed);
            TraceEvent::BroadcasterDropped {
                room_id: raw.get("room_id").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                id: entry_id.to_string(),
                reason: "schema_invalid".to_string(),
            }
            .emit();
            tracing::warn!(error = %e, entry_id, "dropping invalid ingest record");
            return;
        }
    };

    let outcome = filter::run(&msg.content, &state.safety);
    if matches!(outcome.meta.action, Some(chatstorm_domain::SafetyAction::Drop)) {
        state.stats.messages_dropped_safety.fetch_add(1, Ordering::Relaxed);
        TraceEvent::BroadcasterDropped {
            room_id: msg.room_id.clone(),
            id: msg.id.clone(),
            reason: "safety_drop".to_string(),
        }
        .emit();
        return;
    }
    msg.content = outcome.content;
    msg.moderation = Some(outcome.meta);

    stamp_trace(&mut msg);

    let delivered = state.clients.fan_out(
        &msg.room_id,
        ServerMessage::Chat { message: Box::new(msg.clone()) },
    );

    let payload = match serde_json::to_value(&msg) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, id = %msg.id, "failed to encode firehose payload");
            return;
        }
    };
    if let Err(e) = state.bus.publish(&state.config.streams.firehose, &payload).await {
        tracing::error!(error = %e, id = %msg.id, "failed to publish to firehose");
        return;
    }

    state.stats.messages_published.fetch_add(1, Ordering::Relaxed);
    TraceEvent::BroadcasterAccepted {
        room_id: msg.room_id.clone(),
        id: msg.id.clone(),
        action: "published".to_string(),
    }
    .emit();
    tracing::debug!(id = %msg.id, room_id = %msg.room_id, delivered, "broadcast complete");
}

fn stamp_trace(msg: &mut ChatMessage) {
    let trace = msg.trace.get_or_insert_with(Trace::default);
    if trace.producer.is_none() {
        trace.producer = Some("unknown".to_string());
    }
    if !trace.processed_by.iter().any(|p| p == "chat_gateway") {
        trace.processed_by.push("chat_gateway".to_string());
    }
    if trace.gateway_ts.is_none() {
        trace.gateway_ts = Some(now_ms());
    }
}
