use async_trait::async_trait;
use chatstorm_domain::MemoryItem;

/// Scoped read/write memory interface. Namespace is always
/// `chatstorm_domain::memory_item::namespace(room_id, persona_id)`; reads
/// and writes never cross scopes.
///
/// Per the component contract, failures never propagate to the caller:
/// `search` degrades to an empty result and `add` degrades to a no-op. Use
/// [`MemoryProvider::is_degraded`] for telemetry, not control flow.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// Best-effort semantic search within `namespace`. Returns at most
    /// `top_k` items, newest/most-relevant first. Never errors: any
    /// underlying failure yields an empty vec.
    async fn search(&self, namespace: &str, query: &str, top_k: usize) -> Vec<MemoryItem>;

    /// Write `item` into `namespace`. Only called with extraction/reflection
    /// outputs; never with raw chat lines. Best-effort: failures are logged
    /// and swallowed.
    async fn add(&self, namespace: &str, item: MemoryItem);

    /// `true` once the adapter has observed enough consecutive failures
    /// that reads/writes should be considered unavailable.
    fn is_degraded(&self) -> bool {
        false
    }
}
