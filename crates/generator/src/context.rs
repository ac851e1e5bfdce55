use chatstorm_domain::{ChatMessage, MemoryItem, PersonaConfig};

/// Everything a [`crate::traits::Generator`] needs to produce a single
/// reply line. Constructed fresh per evaluation by the persona worker.
pub struct GenerationContext<'a> {
    pub persona: &'a PersonaConfig,
    /// `true` when this generation is for the auto-commentary path; the
    /// output must never quote observation metadata when this is set.
    pub is_auto: bool,
    pub trigger: &'a ChatMessage,
    pub trigger_is_forced_marker: Option<&'a str>,
    /// Human-first sample of recent chat, humans preferred, capped by the
    /// caller (see spec: "sampled chat (<= N lines, humans preferred)").
    pub recent_chat: &'a [ChatMessage],
    pub observation_summary: Option<&'a str>,
    pub memory_hits: &'a [MemoryItem],
    pub max_chars: usize,
}
