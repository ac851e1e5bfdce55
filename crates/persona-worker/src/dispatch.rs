//! Fans `firehose` and `observations` entries out to every enrolled
//! persona's inbox. Each dispatcher owns the shared per-room buffer
//! (`ChatWindow`/`ObservationBuffer`) and updates it exactly once per
//! entry, before fanning out.

use std::sync::atomic::Ordering;
use std::time::Duration;

use chatstorm_safety::schema;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::context::ServiceContext;
use crate::state::WorkerInbox;

const BATCH_SIZE: usize = 32;

/// Consumer names are per-dispatcher so the firehose and observations
/// groups each track their own pending-entry list independently.
const FIREHOSE_CONSUMER: &str = "chatstorm-persona-worker-firehose";
const OBSERVATIONS_CONSUMER: &str = "chatstorm-persona-worker-observations";

pub async fn run_firehose_dispatch(
    ctx: std::sync::Arc<ServiceContext>,
    senders: std::collections::HashMap<String, mpsc::Sender<WorkerInbox>>,
    shutdown: CancellationToken,
) {
    let stream = &ctx.config.streams.firehose;
    let group = &ctx.config.bus.consumer_group;

    if let Err(e) = ctx.bus.ensure_group(stream, group).await {
        tracing::error!(error = %e, stream, "firehose dispatcher failed to join consumer group");
        return;
    }
    ctx.group_joined.store(true, Ordering::Relaxed);

    loop {
        if shutdown.is_cancelled() {
            return;
        }
        let entries = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            result = ctx.bus.group_read(stream, group, FIREHOSE_CONSUMER, BATCH_SIZE, ctx.config.bus.block_ms) => match result {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(error = %e, "firehose group_read failed, backing off");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    continue;
                }
            },
        };

        for entry in entries {
            if let Ok(msg) = schema::validate_chat_message(&entry.payload) {
                ctx.chat_window.insert(msg.clone(), ctx.clock.now_ms());
                for persona_id in &ctx.room.enabled_personas {
                    if let Some(tx) = senders.get(persona_id) {
                        if tx.try_send(WorkerInbox::Trigger(msg.clone())).is_err() {
                            tracing::warn!(%persona_id, entry_id = %entry.id, "persona inbox full, dropping trigger");
                        }
                    }
                }
            }
            if let Err(e) = ctx.bus.ack(stream, group, &[entry.id.clone()]).await {
                tracing::warn!(error = %e, entry_id = %entry.id, "failed to ack firehose entry");
            }
        }
    }
}

pub async fn run_observation_dispatch(
    ctx: std::sync::Arc<ServiceContext>,
    senders: std::collections::HashMap<String, mpsc::Sender<WorkerInbox>>,
    shutdown: CancellationToken,
) {
    let stream = &ctx.config.streams.observations;
    let group = &ctx.config.bus.consumer_group;

    if let Err(e) = ctx.bus.ensure_group(stream, group).await {
        tracing::error!(error = %e, stream, "observation dispatcher failed to join consumer group");
        return;
    }

    loop {
        if shutdown.is_cancelled() {
            return;
        }
        let entries = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            result = ctx.bus.group_read(stream, group, OBSERVATIONS_CONSUMER, BATCH_SIZE, ctx.config.bus.block_ms) => match result {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(error = %e, "observation group_read failed, backing off");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    continue;
                }
            },
        };

        for entry in entries {
            if let Ok(obs) = schema::validate_stream_observation(&entry.payload) {
                ctx.stats.observations_received.fetch_add(1, Ordering::Relaxed);
                ctx.observation_buffer.insert(obs.clone(), ctx.clock.now_ms());
                if ctx.config.auto_commentary.enabled {
                    for persona_id in &ctx.room.enabled_personas {
                        if let Some(tx) = senders.get(persona_id) {
                            if tx.try_send(WorkerInbox::AutoFire(obs.clone())).is_err() {
                                tracing::warn!(%persona_id, entry_id = %entry.id, "persona inbox full, dropping observation");
                            }
                        }
                    }
                }
            }
            if let Err(e) = ctx.bus.ack(stream, group, &[entry.id.clone()]).await {
                tracing::warn!(error = %e, entry_id = %entry.id, "failed to ack observation entry");
            }
        }
    }
}
