use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Remembers which proxy template last succeeded for a URL
///
/// Purely an optimization: entries may be evicted at any time without
/// affecting correctness.
#[async_trait]
pub trait AffinityStore: Send + Sync {
    async fn get(&self, url: &str) -> Option<String>;
    async fn insert(&self, url: &str, proxy: &str);
    async fn evict(&self, url: &str);
}

/// Process-local affinity store, owned by one fetcher
#[derive(Debug, Default)]
pub struct InMemoryAffinityStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryAffinityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl AffinityStore for InMemoryAffinityStore {
    async fn get(&self, url: &str) -> Option<String> {
        self.entries.read().await.get(url).cloned()
    }

    async fn insert(&self, url: &str, proxy: &str) {
        self.entries
            .write()
            .await
            .insert(url.to_string(), proxy.to_string());
    }

    async fn evict(&self, url: &str) {
        self.entries.write().await.remove(url);
    }
}
