//! Auto-commentary path: fires when a persona's hype threshold and
//! per-persona cooldown both clear. Output is checked against a set of
//! forbidden patterns so observation metadata never leaks into chat.

use std::sync::LazyLock;

use chatstorm_domain::{ChatMessage, Origin, StreamObservation, TraceEvent};
use chatstorm_generator::GenerationContext;
use regex::Regex;

use crate::context::ServiceContext;
use crate::reactive::publish_post;

const AUTO_PRODUCER: &str = "persona_worker_auto";

/// Timestamps (`HH:MM:SS`, epoch-looking 10+ digit runs) and the `OBS:`
/// prefix used internally for observation summaries must never appear in
/// generated auto-commentary.
static FORBIDDEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bOBS:").unwrap(),
        Regex::new(r"\b\d{2}:\d{2}:\d{2}\b").unwrap(),
        Regex::new(r"\b\d{10,}\b").unwrap(),
    ]
});

fn leaks_observation_metadata(content: &str) -> bool {
    FORBIDDEN_PATTERNS.iter().any(|re| re.is_match(content))
}

pub async fn handle_auto_fire(ctx: &ServiceContext, persona_id: &str, obs: StreamObservation) {
    if !ctx.config.auto_commentary.enabled {
        return;
    }
    let Some(persona) = ctx.personas.get(persona_id) else { return };
    if obs.hype_level_clamped() < persona.auto_hype_threshold {
        return;
    }

    let now_ms = ctx.clock.now_ms();
    let Some(state_lock) = ctx.persona_state(persona_id) else { return };
    {
        let mut state = state_lock.lock();
        if now_ms - state.last_auto_post_ts < persona.auto_cooldown_ms {
            return;
        }
        state.record_auto_post(now_ms);
    }

    let synthetic_trigger = ChatMessage::new(&ctx.room.room_id, Origin::System, "system", "stream", "");
    let gen_ctx = GenerationContext {
        persona,
        is_auto: true,
        trigger: &synthetic_trigger,
        trigger_is_forced_marker: None,
        recent_chat: &[],
        observation_summary: Some(&obs.summary),
        memory_hits: &[],
        max_chars: ctx.config.generation.max_reply_chars,
    };

    let Some(content) = ctx.generator.generate(&gen_ctx).await else {
        TraceEvent::GenerationFailed {
            room_id: ctx.room.room_id.clone(),
            persona_id: persona_id.to_string(),
            mode: "auto".to_string(),
            reason: "empty".to_string(),
        }
        .emit();
        return;
    };

    if leaks_observation_metadata(&content) {
        TraceEvent::GenerationFailed {
            room_id: ctx.room.room_id.clone(),
            persona_id: persona_id.to_string(),
            mode: "auto".to_string(),
            reason: "metadata_leak".to_string(),
        }
        .emit();
        return;
    }

    publish_post(ctx, persona_id, &persona.display_name, content, AUTO_PRODUCER).await;
}
