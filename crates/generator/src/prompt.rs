//! Prompt assembly for the Live generator. Canonicalizes the assembled
//! prompt and hashes it so operators can detect drift between the persona
//! config on disk and what was actually sent.

use crate::context::GenerationContext;
use chatstorm_domain::Origin;
use sha2::{Digest, Sha256};

const MAX_CHAT_LINES: usize = 12;
const MAX_MEMORY_BULLETS: usize = 8;

pub struct AssembledPrompt {
    pub system: String,
    pub user: String,
    pub sha256: String,
}

/// Build the system + user prompt for one generation call. Human chat lines
/// are preferred over bot lines when sampling down to `MAX_CHAT_LINES`.
pub fn assemble(ctx: &GenerationContext<'_>) -> AssembledPrompt {
    let system = system_prompt(ctx);
    let user = user_prompt(ctx);
    let sha256 = canonical_hash(&system, &user);
    AssembledPrompt { system, user, sha256 }
}

fn system_prompt(ctx: &GenerationContext<'_>) -> String {
    let mut lines = vec![format!("You are {}.", ctx.persona.display_name)];
    for rule in &ctx.persona.voice_rules {
        lines.push(format!("Voice rule: {rule}"));
    }
    for never in &ctx.persona.hard_never {
        lines.push(format!("Never discuss: {never}"));
    }
    lines.push(format!(
        "Reply with exactly one chat line, at most {} characters, no newlines.",
        ctx.max_chars
    ));
    if ctx.is_auto {
        lines.push(
            "Do not quote or reference stream metadata, timestamps, or observation identifiers."
                .to_string(),
        );
    }
    lines.join("\n")
}

fn sampled_chat(ctx: &GenerationContext<'_>) -> Vec<&chatstorm_domain::ChatMessage> {
    let mut humans: Vec<&chatstorm_domain::ChatMessage> = ctx
        .recent_chat
        .iter()
        .filter(|m| m.origin == Origin::Human)
        .collect();
    if humans.len() >= MAX_CHAT_LINES {
        humans.truncate(MAX_CHAT_LINES);
        return humans;
    }
    let mut rest: Vec<&chatstorm_domain::ChatMessage> = ctx
        .recent_chat
        .iter()
        .filter(|m| m.origin != Origin::Human)
        .collect();
    let remaining = MAX_CHAT_LINES - humans.len();
    rest.truncate(remaining);
    humans.extend(rest);
    humans
}

fn user_prompt(ctx: &GenerationContext<'_>) -> String {
    let mut sections = Vec::new();

    if let Some(summary) = ctx.observation_summary {
        sections.push(format!("Stream is currently: {summary}"));
    }

    let chat = sampled_chat(ctx);
    if !chat.is_empty() {
        let lines: Vec<String> = chat
            .iter()
            .map(|m| format!("{}: {}", m.display_name, m.content))
            .collect();
        sections.push(format!("Recent chat:\n{}", lines.join("\n")));
    }

    if !ctx.memory_hits.is_empty() {
        let bullets: Vec<String> = ctx
            .memory_hits
            .iter()
            .take(MAX_MEMORY_BULLETS)
            .map(|m| format!("- {}", m.content))
            .collect();
        sections.push(format!("Things you remember:\n{}", bullets.join("\n")));
    }

    sections.push(format!(
        "Trigger message from {}: {}",
        ctx.trigger.display_name, ctx.trigger.content
    ));

    sections.join("\n\n")
}

fn canonical_hash(system: &str, user: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(system.as_bytes());
    hasher.update(b"\0");
    hasher.update(user.as_bytes());
    format!("{:x}", hasher.finalize())
}
