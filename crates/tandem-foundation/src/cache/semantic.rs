//! Semantic-similarity response cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use tandem_kernel::{
    CachedEntry, EmbeddingProvider, InferenceResponse, KeyValueStore, ResponseCache, Result,
    SemanticHit, SemanticResponseCache,
};

use super::similarity::cosine_similarity;

/// Key prefix of entries eligible for similarity search.
const QUERY_PREFIX: &str = "query:";

/// Response cache that additionally indexes entries by query embedding.
///
/// Entries are stored as [`CachedEntry`] JSON under `query:`-prefixed keys.
/// Lookup is a brute-force scan: every current entry is fetched and compared
/// by cosine similarity. The entry count is bounded by TTL-driven eviction,
/// which keeps the scan acceptable; an ANN index could replace it behind the
/// same contract.
pub struct SemanticCache {
    store: Arc<dyn KeyValueStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    ttl: Duration,
}

impl SemanticCache {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            ttl,
        }
    }

    async fn write_entry(&self, key: &str, entry: &CachedEntry) -> Result<()> {
        let bytes = serde_json::to_vec(entry)?;
        self.store
            .set(&format!("{QUERY_PREFIX}{key}"), &bytes, self.ttl)
            .await
    }
}

#[async_trait]
impl ResponseCache for SemanticCache {
    async fn get(&self, key: &str) -> Result<Option<InferenceResponse>> {
        let prefixed = format!("{QUERY_PREFIX}{key}");
        let Some(bytes) = self.store.get(&prefixed).await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<CachedEntry>(&bytes) {
            Ok(entry) => Ok(Some(entry.response)),
            Err(err) => {
                warn!(key, error = %err, "evicting undecodable semantic cache entry");
                let _ = self.store.delete(&prefixed).await;
                Ok(None)
            }
        }
    }

    /// Plain write path: the entry carries no embedding and is skipped by
    /// similarity search, but stays retrievable by exact key.
    async fn set(&self, key: &str, response: &InferenceResponse) -> Result<()> {
        let entry = CachedEntry {
            query: key.to_string(),
            embedding: None,
            response: response.clone(),
            cached_at: Utc::now(),
        };
        self.write_entry(key, &entry).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(&format!("{QUERY_PREFIX}{key}")).await
    }
}

#[async_trait]
impl SemanticResponseCache for SemanticCache {
    async fn set_with_embedding(
        &self,
        key: &str,
        query: &str,
        response: &InferenceResponse,
    ) -> Result<()> {
        let embedding = self.embedder.embed(query).await?;
        let entry = CachedEntry {
            query: query.to_string(),
            embedding: Some(embedding),
            response: response.clone(),
            cached_at: Utc::now(),
        };
        self.write_entry(key, &entry).await
    }

    async fn get_similar(&self, query: &str, threshold: f32) -> Result<Option<SemanticHit>> {
        let query_embedding = self.embedder.embed(query).await?;

        let keys = self.store.scan(QUERY_PREFIX).await?;

        let mut best: Option<SemanticHit> = None;
        let mut max_similarity = threshold;

        for key in keys {
            // A single unreadable entry must not abort the scan.
            let bytes = match self.store.get(&key).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(err) => {
                    debug!(key, error = %err, "skipping unreadable entry during scan");
                    continue;
                }
            };
            let Ok(entry) = serde_json::from_slice::<CachedEntry>(&bytes) else {
                continue;
            };
            let Some(embedding) = entry.embedding.as_deref() else {
                continue;
            };

            let similarity = cosine_similarity(&query_embedding, embedding);
            if similarity > max_similarity {
                max_similarity = similarity;
                best = Some(SemanticHit {
                    response: entry.response,
                    similarity,
                    matched_key: key.trim_start_matches(QUERY_PREFIX).to_string(),
                });
            }
        }

        Ok(best)
    }
}
