//! Reactive loop: one task per enrolled persona, draining its inbox.
//! `Trigger` entries run the Policy Engine and (on `post`) the Generator;
//! `AutoFire` entries are handled by [`crate::auto`].

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chatstorm_domain::{namespace, ChatMessage, Decision, Origin, Trace, TraceEvent};
use chatstorm_generator::GenerationContext;
use chatstorm_policy::EvaluationInput;
use chatstorm_safety::filter;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::context::ServiceContext;
use crate::state::WorkerInbox;

const RECENT_CHAT_SAMPLE: usize = 12;
const MEMORY_TOP_K: usize = 8;
const MEMORY_SEARCH_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(500);

/// Upper bound of the per-cycle jitter every persona loop sleeps before
/// acting on an inbox item, so a fleet of personas doesn't all fire in
/// lockstep off the same trigger.
const CYCLE_JITTER_MS: u64 = 250;

pub async fn run_persona_loop(
    ctx: Arc<ServiceContext>,
    persona_id: String,
    mut rx: mpsc::Receiver<WorkerInbox>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            maybe = rx.recv() => match maybe {
                Some(WorkerInbox::Trigger(msg)) => {
                    tokio::time::sleep(std::time::Duration::from_millis(rand::thread_rng().gen_range(0..=CYCLE_JITTER_MS))).await;
                    handle_trigger(&ctx, &persona_id, msg).await;
                }
                Some(WorkerInbox::AutoFire(obs)) => {
                    tokio::time::sleep(std::time::Duration::from_millis(rand::thread_rng().gen_range(0..=CYCLE_JITTER_MS))).await;
                    crate::auto::handle_auto_fire(&ctx, &persona_id, obs).await;
                }
                None => return,
            }
        }
    }
}

async fn handle_trigger(ctx: &ServiceContext, persona_id: &str, trigger: ChatMessage) {
    let Some(persona) = ctx.personas.get(persona_id) else { return };
    let Some(state_lock) = ctx.persona_state(persona_id) else { return };

    let now_ms = ctx.clock.now_ms();
    let (snapshot, already_seen) = {
        let mut state = state_lock.lock();
        let already_seen = state.mark_seen(&trigger.id);
        let snapshot = state.posting_state(now_ms, ctx.room.budget.window_s);
        (snapshot, already_seen)
    };
    if already_seen {
        return;
    }

    let marker_hit = ctx
        .policy_config
        .marker_prefixes
        .iter()
        .find(|p| trigger.content.contains(p.as_str()))
        .map(String::as_str);

    let latest_obs = ctx.observation_buffer.latest(&ctx.room.room_id, 1, now_ms).into_iter().next();

    let input = EvaluationInput {
        room_id: &ctx.room.room_id,
        persona_id,
        persona_display: &persona.display_name,
        trigger: &trigger,
        chat_window: &ctx.chat_window,
        latest_observation: latest_obs.as_ref(),
        persona_state: snapshot,
        budget_n: ctx.room.budget.n,
        budget_window_s: ctx.room.budget.window_s,
        cooldown_ms: ctx.room.cooldown_ms,
        hype_multiplier: ctx.room.hype_multiplier,
        probability_ceiling: ctx.room.probability_ceiling,
        now_ms,
    };

    let decision = chatstorm_policy::evaluate(&input, &ctx.policy_config);
    ctx.stats.record_decision(decision.reason.as_str());
    TraceEvent::PolicyDecision {
        room_id: ctx.room.room_id.clone(),
        persona_id: persona_id.to_string(),
        trigger_id: trigger.id.clone(),
        decision: format!("{:?}", decision.decision).to_lowercase(),
        reason: decision.reason.as_str().to_string(),
        p_used: decision.tags.p_used,
    }
    .emit();

    if decision.decision != Decision::Post {
        return;
    }

    let ns = namespace(&ctx.room.room_id, persona_id);
    let memory_hits = {
        let _permit = ctx.mem_semaphore.clone().acquire_owned().await.ok();
        match tokio::time::timeout(MEMORY_SEARCH_TIMEOUT, ctx.memory.search(&ns, &trigger.content, MEMORY_TOP_K)).await {
            Ok(hits) => {
                ctx.stats.memory_reads_succeeded.fetch_add(1, Ordering::Relaxed);
                hits
            }
            Err(_) => {
                TraceEvent::MemoryDegraded {
                    namespace: ns.clone(),
                    operation: "search".to_string(),
                    reason: "timeout".to_string(),
                }
                .emit();
                Vec::new()
            }
        }
    };

    let recent_chat = ctx.chat_window.recent(&ctx.room.room_id, RECENT_CHAT_SAMPLE);
    let observation_summary = ctx
        .observation_buffer
        .latest(&ctx.room.room_id, 1, now_ms)
        .first()
        .map(|o| o.summary.clone());

    let gen_ctx = GenerationContext {
        persona,
        is_auto: false,
        trigger: &trigger,
        trigger_is_forced_marker: marker_hit,
        recent_chat: &recent_chat,
        observation_summary: observation_summary.as_deref(),
        memory_hits: &memory_hits,
        max_chars: ctx.config.generation.max_reply_chars,
    };

    let Some(content) = ctx.generator.generate(&gen_ctx).await else {
        TraceEvent::GenerationFailed {
            room_id: ctx.room.room_id.clone(),
            persona_id: persona_id.to_string(),
            mode: "reactive".to_string(),
            reason: "empty".to_string(),
        }
        .emit();
        return;
    };

    publish_post(ctx, persona_id, &persona.display_name, content, "persona_worker").await;
}

/// Runs the Safety Filter on a persona's own output, publishes to `ingest`
/// with the given `producer`, and updates per-persona posting state.
pub async fn publish_post(ctx: &ServiceContext, persona_id: &str, display_name: &str, content: String, producer: &str) {
    let outcome = filter::run(&content, &ctx.safety);
    if matches!(outcome.meta.action, Some(chatstorm_domain::SafetyAction::Drop)) {
        TraceEvent::GenerationFailed {
            room_id: ctx.room.room_id.clone(),
            persona_id: persona_id.to_string(),
            mode: producer.to_string(),
            reason: "safety_drop".to_string(),
        }
        .emit();
        return;
    }

    let mut msg = ChatMessage::new(&ctx.room.room_id, Origin::Bot, persona_id, display_name, outcome.content.clone());
    msg.moderation = Some(outcome.meta);
    msg.trace = Some(Trace {
        producer: Some(producer.to_string()),
        processed_by: Vec::new(),
        gateway_ts: None,
    });

    let payload = match serde_json::to_value(&msg) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, persona_id, "failed to encode persona post");
            return;
        }
    };
    if let Err(e) = ctx.bus.publish(&ctx.config.streams.ingest, &payload).await {
        tracing::error!(error = %e, persona_id, "failed to publish persona post");
        return;
    }

    if let Some(state_lock) = ctx.persona_state(persona_id) {
        let mut state = state_lock.lock();
        state.record_post(ctx.clock.now_ms(), &outcome.content);
    }
    ctx.stats.messages_published.fetch_add(1, Ordering::Relaxed);
}
