//! REST-backed [`MemoryProvider`]. Talks to an external memory service over
//! HTTP; any transport or deserialization failure degrades rather than
//! propagating, per the component's graceful-degradation contract.

use crate::traits::MemoryProvider;
use async_trait::async_trait;
use chatstorm_domain::MemoryItem;
use chatstorm_safety::contains_pii;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const DEGRADED_AFTER_FAILURES: u32 = 3;

#[derive(Serialize)]
struct SearchRequest<'a> {
    namespace: &'a str,
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<MemoryItem>,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    namespace: &'a str,
    item: &'a MemoryItem,
}

pub struct RestMemoryProvider {
    client: Client,
    base_url: String,
    consecutive_failures: AtomicU32,
}

impl RestMemoryProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    fn note_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    fn note_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MemoryProvider for RestMemoryProvider {
    async fn search(&self, namespace: &str, query: &str, top_k: usize) -> Vec<MemoryItem> {
        if self.base_url.is_empty() {
            return Vec::new();
        }
        let url = format!("{}/memory/search", self.base_url);
        let req = SearchRequest {
            namespace,
            query,
            top_k,
        };
        let result = self.client.post(&url).json(&req).send().await;
        match result {
            Ok(resp) if resp.status().is_success() => match resp.json::<SearchResponse>().await {
                Ok(body) => {
                    self.note_success();
                    body.items
                }
                Err(e) => {
                    warn!(error = %e, "memory search: invalid response body");
                    self.note_failure();
                    Vec::new()
                }
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "memory search: non-success status");
                self.note_failure();
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "memory search: request failed");
                self.note_failure();
                Vec::new()
            }
        }
    }

    async fn add(&self, namespace: &str, item: MemoryItem) {
        if self.base_url.is_empty() {
            return;
        }
        if contains_pii(&item.content) {
            warn!(%namespace, item_id = %item.id, "dropping memory item containing PII");
            return;
        }
        let url = format!("{}/memory/items", self.base_url);
        let req = AddRequest {
            namespace,
            item: &item,
        };
        match self.client.post(&url).json(&req).send().await {
            Ok(resp) if resp.status().is_success() => {
                self.note_success();
                debug!(%namespace, item_id = %item.id, "memory item written");
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "memory add: non-success status");
                self.note_failure();
            }
            Err(e) => {
                warn!(error = %e, "memory add: request failed");
                self.note_failure();
            }
        }
    }

    fn is_degraded(&self) -> bool {
        self.consecutive_failures.load(Ordering::SeqCst) >= DEGRADED_AFTER_FAILURES
    }
}
