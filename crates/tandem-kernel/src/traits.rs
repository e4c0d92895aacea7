//! Trait seams between the pipeline and its collaborators.
//!
//! Every network dependency of the pipeline - model providers, the embedding
//! service, the key-value store, and the cache tiers built on top of it -
//! sits behind one of these traits so tests can inject fakes and deployments
//! can swap providers without touching the core.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{InferenceResponse, SemanticHit};

/// Uniform completion interface over heterogeneous upstream providers.
///
/// Implementations build a single-prompt request, apply the provider default
/// temperature of `0.7` when the caller passes `0`, and surface upstream
/// errors verbatim with the model name attached. Adapters never retry;
/// retry policy, if any, belongs to the caller.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Model identifier, used in logs and error messages.
    fn name(&self) -> &str;

    /// Produce a completion for `prompt`.
    ///
    /// `temperature == 0.0` and `max_tokens == 0` mean "provider default".
    async fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String>;

    /// Stream a completion, invoking `on_chunk` for each text delta.
    ///
    /// This is the degraded single-model path; backends that cannot stream
    /// keep the default implementation.
    async fn complete_stream(
        &self,
        _prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
        _on_chunk: &mut (dyn for<'a> FnMut(&'a str) -> Result<()> + Send),
    ) -> Result<()> {
        Err(Error::Unsupported(format!(
            "model '{}' does not support streaming",
            self.name()
        )))
    }
}

/// Fixed-dimension text embedding service.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text` into a fixed-length vector. Errors on empty input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Byte-level key-value store with per-key TTL and prefix enumeration.
///
/// The store provides last-writer-wins semantics per key and enforces
/// eviction itself: an entry is readable iff its TTL has not elapsed.
/// Absence is distinguished from failure on reads.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value at `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write `value` at `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerate the keys currently starting with `prefix`.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Exact-match response cache keyed by opaque fingerprint strings.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Look up the response cached under `key`.
    async fn get(&self, key: &str) -> Result<Option<InferenceResponse>>;

    /// Cache `response` under `key` with the configured TTL.
    async fn set(&self, key: &str, response: &InferenceResponse) -> Result<()>;

    /// Evict `key`.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// A response cache that additionally indexes entries by query embedding.
#[async_trait]
pub trait SemanticResponseCache: ResponseCache {
    /// Cache `response` under `key` together with an embedding of `query`,
    /// making the entry eligible for similarity lookup.
    async fn set_with_embedding(
        &self,
        key: &str,
        query: &str,
        response: &InferenceResponse,
    ) -> Result<()>;

    /// Find the cached entry whose query embedding is closest to `query`,
    /// provided its cosine similarity is strictly above `threshold`.
    async fn get_similar(&self, query: &str, threshold: f32) -> Result<Option<SemanticHit>>;
}
