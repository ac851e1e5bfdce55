//! In-process [`MemoryProvider`] for persona-worker and reflection-loop
//! tests; no network involved.

use crate::traits::MemoryProvider;
use async_trait::async_trait;
use chatstorm_domain::MemoryItem;
use chatstorm_safety::contains_pii;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct InMemoryProvider {
    items: Mutex<HashMap<String, Vec<MemoryItem>>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryProvider for InMemoryProvider {
    async fn search(&self, namespace: &str, query: &str, top_k: usize) -> Vec<MemoryItem> {
        let items = self.items.lock();
        let Some(scoped) = items.get(namespace) else {
            return Vec::new();
        };
        let needle = query.to_lowercase();
        scoped
            .iter()
            .rev()
            .filter(|item| needle.is_empty() || item.content.to_lowercase().contains(&needle))
            .take(top_k)
            .cloned()
            .collect()
    }

    async fn add(&self, namespace: &str, item: MemoryItem) {
        if contains_pii(&item.content) {
            return;
        }
        self.items
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatstorm_domain::{Confidence, MemoryItemType};

    fn item(content: &str) -> MemoryItem {
        MemoryItem {
            id: "m1".into(),
            scope_room: "room:demo".into(),
            scope_persona: "persona:clip".into(),
            item_type: MemoryItemType::Note,
            other_user: None,
            topic: None,
            confidence: Confidence::Med,
            source: "reflection".into(),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn add_then_search_finds_item() {
        let provider = InMemoryProvider::new();
        provider.add("ns", item("likes puns")).await;
        let found = provider.search("ns", "puns", 5).await;
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn search_never_crosses_namespaces() {
        let provider = InMemoryProvider::new();
        provider.add("ns:a", item("a fact")).await;
        let found = provider.search("ns:b", "", 5).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn items_with_pii_are_dropped() {
        let provider = InMemoryProvider::new();
        provider.add("ns", item("email me at person@example.com")).await;
        let found = provider.search("ns", "", 5).await;
        assert!(found.is_empty());
    }
}
