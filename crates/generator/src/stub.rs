//! Fixture-table generator. Looks up `"{persona_id}::{marker_prefix}"`,
//! falling back to a persona default then a global default.

use crate::context::GenerationContext;
use crate::post::post_process;
use crate::traits::Generator;
use async_trait::async_trait;
use std::collections::HashMap;

pub struct StubGenerator {
    fixtures: HashMap<String, String>,
    persona_defaults: HashMap<String, String>,
    global_default: String,
}

impl StubGenerator {
    pub fn new(
        fixtures: HashMap<String, String>,
        persona_defaults: HashMap<String, String>,
        global_default: impl Into<String>,
    ) -> Self {
        Self {
            fixtures,
            persona_defaults,
            global_default: global_default.into(),
        }
    }
}

impl Default for StubGenerator {
    fn default() -> Self {
        Self::new(HashMap::new(), HashMap::new(), "chat is wild right now")
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, ctx: &GenerationContext<'_>) -> Option<String> {
        let raw = ctx
            .trigger_is_forced_marker
            .and_then(|marker| self.fixtures.get(&format!("{}::{marker}", ctx.persona.id)))
            .or_else(|| self.persona_defaults.get(&ctx.persona.id))
            .cloned()
            .unwrap_or_else(|| self.global_default.clone());
        post_process(&raw, ctx.max_chars)
    }
}
