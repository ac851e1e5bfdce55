//! Policy Engine: the single function that decides whether a persona posts
//! in response to a trigger. Every branch before the probability gate is a
//! deterministic suppress/force; the gate itself draws from an RNG seeded
//! by `(room, persona, trigger.id)` so tests can reproduce any outcome
//! without mocking randomness.

use crate::config::PolicyConfig;
use chatstorm_buffers::ChatWindow;
use chatstorm_domain::{ChatMessage, Decision, DecisionReason, DecisionRecord, DecisionTags, Origin, StreamObservation};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hash::{Hash, Hasher};

/// Read-only view of a persona's posting state within a room, as tracked by
/// the persona worker.
#[derive(Debug, Clone, Copy)]
pub struct PersonaPostingState {
    pub last_post_ts: i64,
    pub posts_in_window: u32,
    pub talkativeness: f64,
}

/// Everything the engine needs to evaluate one trigger.
pub struct EvaluationInput<'a> {
    pub room_id: &'a str,
    pub persona_id: &'a str,
    pub persona_display: &'a str,
    pub trigger: &'a ChatMessage,
    pub chat_window: &'a ChatWindow,
    pub latest_observation: Option<&'a StreamObservation>,
    pub persona_state: PersonaPostingState,
    pub budget_n: u32,
    pub budget_window_s: u64,
    pub cooldown_ms: i64,
    pub hype_multiplier: f64,
    pub probability_ceiling: f64,
    pub now_ms: i64,
}

fn seed_from(room_id: &str, persona_id: &str, trigger_id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    room_id.hash(&mut hasher);
    persona_id.hash(&mut hasher);
    trigger_id.hash(&mut hasher);
    hasher.finish()
}

/// Evaluate the six-step policy order described in the component design:
/// deterministic force, bot-origin suppression, cooldown, budget,
/// probability computation, then the deterministic probability gate.
pub fn evaluate(input: &EvaluationInput, config: &PolicyConfig) -> DecisionRecord {
    let age_ms = input.now_ms - input.trigger.ts;

    // 1. Deterministic force.
    let marker_hit = config
        .marker_prefixes
        .iter()
        .find(|prefix| input.trigger.content.contains(prefix.as_str()));
    if let Some(marker) = marker_hit {
        if input.trigger.origin != Origin::Bot && age_ms <= config.max_trigger_age_ms {
            return record(
                input,
                Decision::Post,
                DecisionReason::E2eForced,
                DecisionTags {
                    boosts_applied: vec![format!("marker:{marker}")],
                    ..Default::default()
                },
            );
        }
    }

    // 2. Bot-origin suppression.
    let mentions_this_persona = input.trigger.mentions_persona(input.persona_display);
    if input.trigger.origin == Origin::Bot && !mentions_this_persona {
        return record(input, Decision::Skip, DecisionReason::BotOrigin, DecisionTags::default());
    }

    // 3. Cooldown.
    if input.now_ms - input.persona_state.last_post_ts < input.cooldown_ms {
        return record(input, Decision::Skip, DecisionReason::Cooldown, DecisionTags::default());
    }

    // 4. Budget.
    if input.persona_state.posts_in_window >= input.budget_n {
        return record(input, Decision::Skip, DecisionReason::Budget, DecisionTags::default());
    }

    // 5. Probability computation.
    let mut boosts = Vec::new();

    let p_base = config.p_base * input.persona_state.talkativeness.max(0.0);
    let mut p = p_base * input.hype_multiplier;

    let event_strength = input.latest_observation.map(|o| o.hype_level_clamped()).unwrap_or(0.0);
    if event_strength > 0.0 {
        p *= 1.0 + config.alpha_event * event_strength;
        boosts.push("event".to_string());
    }

    let mention_hits = input.chat_window.mention_hits(
        input.room_id,
        input.persona_display,
        config.mention_window_s,
        input.now_ms,
    );
    if mention_hits > 0 || mentions_this_persona {
        p *= config.beta_mention;
        boosts.push("mention".to_string());
    }

    let rate_10s = input
        .chat_window
        .rate_per_sec(input.room_id, config.trend_window_s, input.now_ms);
    let normalized_velocity = if config.reference_rate > 0.0 {
        (rate_10s / config.reference_rate - 1.0).max(0.0)
    } else {
        0.0
    };
    if normalized_velocity > 0.0 {
        p *= 1.0 + config.alpha_trend * normalized_velocity;
        boosts.push("trend".to_string());
    }

    let bot_fraction_weighted = input
        .chat_window
        .bot_fraction(input.room_id, config.trend_window_s, input.now_ms);
    if bot_fraction_weighted > 0.0 {
        p *= 1.0 - config.gamma_bot * bot_fraction_weighted;
    }

    let cap = config.p_cap.min(input.probability_ceiling).min(0.95);
    let p_used = p.clamp(0.0, cap);

    let tags = DecisionTags {
        p_base,
        p_used,
        rate_10s,
        h_value: event_strength,
        boosts_applied: boosts,
    };

    // 6. Probability gate: deterministic draw seeded by (room, persona, trigger.id).
    let seed = seed_from(input.room_id, input.persona_id, &input.trigger.id);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let draw: f64 = rng.gen_range(0.0..1.0);

    if draw < p_used {
        record(input, Decision::Post, DecisionReason::ProbabilityGate, tags_for_post(tags))
    } else {
        record(input, Decision::Skip, DecisionReason::ProbabilityGate, tags)
    }
}

/// `reason=probability_gate` is used for both outcomes of step 6; callers
/// distinguish by `decision`. Kept as a separate helper so the tags survive
/// unchanged on the `post` path.
fn tags_for_post(tags: DecisionTags) -> DecisionTags {
    tags
}

fn record(
    input: &EvaluationInput,
    decision: Decision,
    reason: DecisionReason,
    tags: DecisionTags,
) -> DecisionRecord {
    DecisionRecord {
        room_id: input.room_id.to_string(),
        persona_id: input.persona_id.to_string(),
        trigger_id: input.trigger.id.clone(),
        decision,
        reason,
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatstorm_domain::ChatMessage;

    fn base_trigger(content: &str, origin: Origin, ts: i64) -> ChatMessage {
        let mut m = ChatMessage::new("room:demo", origin, "u1", "Viewer", content);
        m.ts = ts;
        m
    }

    fn base_input<'a>(
        trigger: &'a ChatMessage,
        window: &'a ChatWindow,
        state: PersonaPostingState,
        now_ms: i64,
    ) -> EvaluationInput<'a> {
        EvaluationInput {
            room_id: "room:demo",
            persona_id: "persona:clip",
            persona_display: "ClipGoblin",
            trigger,
            chat_window: window,
            latest_observation: None,
            persona_state: state,
            budget_n: 5,
            budget_window_s: 60,
            cooldown_ms: 8_000,
            hype_multiplier: 1.0,
            probability_ceiling: 0.95,
            now_ms,
        }
    }

    #[test]
    fn marker_prefix_forces_post() {
        let window = ChatWindow::default();
        let trigger = base_trigger("E2E_TEST_force_this", Origin::Human, 1_000);
        let state = PersonaPostingState {
            last_post_ts: 0,
            posts_in_window: 0,
            talkativeness: 0.5,
        };
        let input = base_input(&trigger, &window, state, 1_500);
        let decision = evaluate(&input, &PolicyConfig::default());
        assert_eq!(decision.decision, Decision::Post);
        assert_eq!(decision.reason, DecisionReason::E2eForced);
    }

    #[test]
    fn marker_from_bot_origin_is_not_forced() {
        let window = ChatWindow::default();
        let trigger = base_trigger("E2E_TEST_x", Origin::Bot, 1_000);
        let state = PersonaPostingState {
            last_post_ts: 0,
            posts_in_window: 0,
            talkativeness: 0.5,
        };
        let input = base_input(&trigger, &window, state, 1_500);
        let decision = evaluate(&input, &PolicyConfig::default());
        assert_eq!(decision.decision, Decision::Skip);
        assert_eq!(decision.reason, DecisionReason::BotOrigin);
    }

    #[test]
    fn old_marker_trigger_is_not_forced() {
        let window = ChatWindow::default();
        let trigger = base_trigger("E2E_TEST_x", Origin::Human, 1_000);
        let state = PersonaPostingState {
            last_post_ts: 0,
            posts_in_window: 0,
            talkativeness: 0.5,
        };
        let input = base_input(&trigger, &window, state, 1_000 + 10_000);
        let decision = evaluate(&input, &PolicyConfig::default());
        assert_ne!(decision.reason, DecisionReason::E2eForced);
    }

    #[test]
    fn unmentioned_bot_origin_is_suppressed() {
        let window = ChatWindow::default();
        let trigger = base_trigger("just chatting", Origin::Bot, 1_000);
        let state = PersonaPostingState {
            last_post_ts: 0,
            posts_in_window: 0,
            talkativeness: 0.9,
        };
        let input = base_input(&trigger, &window, state, 1_000);
        let decision = evaluate(&input, &PolicyConfig::default());
        assert_eq!(decision.decision, Decision::Skip);
        assert_eq!(decision.reason, DecisionReason::BotOrigin);
    }

    #[test]
    fn mentioned_bot_origin_is_not_suppressed_by_step_2() {
        let window = ChatWindow::default();
        let trigger = base_trigger("hey @ClipGoblin", Origin::Bot, 1_000);
        let state = PersonaPostingState {
            last_post_ts: 0,
            posts_in_window: 0,
            talkativeness: 0.9,
        };
        let input = base_input(&trigger, &window, state, 1_000);
        let decision = evaluate(&input, &PolicyConfig::default());
        assert_ne!(decision.reason, DecisionReason::BotOrigin);
    }

    #[test]
    fn cooldown_suppresses_recent_poster() {
        let window = ChatWindow::default();
        let trigger = base_trigger("hello", Origin::Human, 9_000);
        let state = PersonaPostingState {
            last_post_ts: 5_000,
            posts_in_window: 0,
            talkativeness: 0.9,
        };
        let input = base_input(&trigger, &window, state, 9_000);
        let decision = evaluate(&input, &PolicyConfig::default());
        assert_eq!(decision.decision, Decision::Skip);
        assert_eq!(decision.reason, DecisionReason::Cooldown);
    }

    #[test]
    fn budget_suppresses_over_quota_persona() {
        let window = ChatWindow::default();
        let trigger = base_trigger("hello", Origin::Human, 100_000);
        let state = PersonaPostingState {
            last_post_ts: 0,
            posts_in_window: 5,
            talkativeness: 0.9,
        };
        let input = base_input(&trigger, &window, state, 100_000);
        let decision = evaluate(&input, &PolicyConfig::default());
        assert_eq!(decision.decision, Decision::Skip);
        assert_eq!(decision.reason, DecisionReason::Budget);
    }

    #[test]
    fn gate_is_deterministic_for_same_seed() {
        let window = ChatWindow::default();
        let trigger = base_trigger("hello", Origin::Human, 100_000);
        let state = PersonaPostingState {
            last_post_ts: 0,
            posts_in_window: 0,
            talkativeness: 0.9,
        };
        let input = base_input(&trigger, &window, state, 100_000);
        let config = PolicyConfig::default();
        let first = evaluate(&input, &config);
        let second = evaluate(&input, &config);
        assert_eq!(first.decision, second.decision);
        assert_eq!(first.tags.p_used, second.tags.p_used);
    }

    #[test]
    fn probability_never_exceeds_cap() {
        let window = ChatWindow::default();
        let trigger = base_trigger("hello", Origin::Human, 100_000);
        let state = PersonaPostingState {
            last_post_ts: 0,
            posts_in_window: 0,
            talkativeness: 50.0,
        };
        let input = base_input(&trigger, &window, state, 100_000);
        let decision = evaluate(&input, &PolicyConfig::default());
        assert!(decision.tags.p_used <= 0.95);
    }
}
