//! Live generator: assembles a prompt, calls an [`LlmProvider`] under a
//! concurrency cap and a timeout, and post-processes the result. Any
//! failure degrades to `None` — the caller simply drops the post.

use crate::context::GenerationContext;
use crate::post::post_process;
use crate::prompt::assemble;
use crate::provider::LlmProvider;
use crate::traits::Generator;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

pub struct LiveGenerator {
    provider: Arc<dyn LlmProvider>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
}

impl LiveGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            provider,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            timeout,
        }
    }
}

#[async_trait]
impl Generator for LiveGenerator {
    async fn generate(&self, ctx: &GenerationContext<'_>) -> Option<String> {
        let _permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return None,
        };

        let prompt = assemble(ctx);
        let call = self.provider.chat(&prompt.system, &prompt.user);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => post_process(&text, ctx.max_chars),
            Ok(Err(e)) => {
                warn!(error = %e, prompt_sha256 = %prompt.sha256, "live generation failed");
                None
            }
            Err(_) => {
                warn!(prompt_sha256 = %prompt.sha256, timeout_ms = self.timeout.as_millis() as u64, "live generation timed out");
                None
            }
        }
    }
}
