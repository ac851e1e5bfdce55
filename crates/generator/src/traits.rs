use crate::context::GenerationContext;
use async_trait::async_trait;

/// Pluggable producer of a single chat line. Implementations must apply
/// [`crate::post::post_process`] before returning; an empty or unsafe
/// output is represented as `None` so the caller drops the post.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, ctx: &GenerationContext<'_>) -> Option<String>;
}
