//! Exact-match response cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use tandem_kernel::{InferenceResponse, KeyValueStore, ResponseCache, Result};

/// Fingerprint-keyed response cache over a [`KeyValueStore`].
///
/// Responses are stored as JSON under the key the router derived; the
/// store enforces the TTL. An entry that no longer deserializes is treated
/// as absent and evicted.
pub struct ExactCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl ExactCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }
}

#[async_trait]
impl ResponseCache for ExactCache {
    async fn get(&self, key: &str) -> Result<Option<InferenceResponse>> {
        let Some(bytes) = self.store.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(response) => Ok(Some(response)),
            Err(err) => {
                warn!(key, error = %err, "evicting undecodable cache entry");
                let _ = self.store.delete(key).await;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, response: &InferenceResponse) -> Result<()> {
        let bytes = serde_json::to_vec(response)?;
        self.store.set(key, &bytes, self.ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use chrono::Utc;
    use tandem_kernel::MODEL_EDGE_SLM;

    fn response(text: &str) -> InferenceResponse {
        InferenceResponse {
            response: text.into(),
            model_used: MODEL_EDGE_SLM.into(),
            routing_reason: "Simple query suitable for edge SLM".into(),
            latency: Duration::from_millis(5),
            cache_hit: false,
            timestamp: Utc::now(),
        }
    }

    fn cache(store: Arc<MemoryStore>) -> ExactCache {
        ExactCache::new(store, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn set_then_get_returns_the_response() {
        let cache = cache(Arc::new(MemoryStore::new()));
        cache.set("inference:abc", &response("four")).await.unwrap();

        let hit = cache.get("inference:abc").await.unwrap().unwrap();
        assert_eq!(hit.response, "four");
        assert!(cache.get("inference:missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn undecodable_entry_reads_as_absent_and_is_evicted() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("inference:abc", b"not json", Duration::from_secs(60))
            .await
            .unwrap();

        let cache = cache(store.clone());
        assert!(cache.get("inference:abc").await.unwrap().is_none());
        assert!(store.get("inference:abc").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_with_the_store_ttl() {
        let store = Arc::new(MemoryStore::new());
        let cache = ExactCache::new(store, Duration::from_secs(10));
        cache.set("inference:abc", &response("four")).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get("inference:abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_the_entry() {
        let cache = cache(Arc::new(MemoryStore::new()));
        cache.set("inference:abc", &response("four")).await.unwrap();
        cache.delete("inference:abc").await.unwrap();
        assert!(cache.get("inference:abc").await.unwrap().is_none());
    }
}
