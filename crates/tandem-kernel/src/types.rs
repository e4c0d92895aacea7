//! Core data model for the inference pipeline.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// `model_used` value for responses produced by the cloud LLM path.
pub const MODEL_CLOUD_LLM: &str = "cloud-llm";
/// `model_used` value for responses produced by the edge SLM path.
pub const MODEL_EDGE_SLM: &str = "edge-slm";

/// One inference request as received at ingress.
///
/// Immutable for the duration of a single pipeline invocation. `temperature`
/// and `max_tokens` are hints: a value of `0` means "use the provider
/// default" and does not participate in cache-key derivation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// The user's query. Required, non-empty.
    pub query: String,
    /// Optional prior text the answer should take into account.
    #[serde(default)]
    pub context: String,
    /// Completion budget; `0` falls back to the configured default.
    #[serde(default)]
    pub max_tokens: u32,
    /// Sampling temperature in `[0.0, 2.0]`; `0.0` means the provider
    /// default of `0.7`.
    #[serde(default)]
    pub temperature: f32,
    /// Opaque caller metadata, passed through untouched.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl InferenceRequest {
    /// Build a request with just a query, for the common case.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Reject requests the pipeline cannot process.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::BadRequest("query must not be empty".to_string()));
        }
        Ok(())
    }

    /// The prompt sent to a model: the raw query, or the query framed by its
    /// context when one was supplied.
    pub fn prompt(&self) -> String {
        if self.context.is_empty() {
            self.query.clone()
        } else {
            format!("Context: {}\n\nQuestion: {}", self.context, self.query)
        }
    }

    /// Whether the request carries prior context.
    pub fn has_context(&self) -> bool {
        !self.context.is_empty()
    }
}

/// The answer returned to the caller, also the unit stored in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    /// Completion text.
    pub response: String,
    /// Which path produced the answer: [`MODEL_CLOUD_LLM`] or
    /// [`MODEL_EDGE_SLM`].
    pub model_used: String,
    /// Human-readable explanation of the routing decision. Annotated with
    /// similarity details on a semantic cache hit.
    pub routing_reason: String,
    /// Wall-clock time spent serving this request, as nanoseconds on the
    /// wire.
    #[serde(with = "duration_nanos")]
    pub latency: Duration,
    /// True when the response was served from either cache tier.
    pub cache_hit: bool,
    /// When the response was produced (RFC 3339).
    pub timestamp: DateTime<Utc>,
}

/// Serialize a [`Duration`] as integer nanoseconds, matching the wire
/// contract of the inference endpoint.
mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_nanos().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}

/// Transient per-query measurements feeding the routing decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryMetrics {
    /// Whitespace-split word count of the query.
    pub token_count: usize,
    /// Composite complexity score in `[0.0, 1.0]`.
    pub complexity: f64,
    /// Whether the request carries prior context.
    pub has_context: bool,
    /// Character count of the query.
    pub query_length: usize,
}

/// The outcome of routing one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    /// True routes to the cloud LLM, false to the SLM ensemble.
    pub use_llm: bool,
    /// Which rule fired, in words.
    pub reason: String,
    /// How sure the strategy is, in `[0.0, 1.0]`.
    pub confidence: f64,
    /// The complexity score the decision was based on.
    pub complexity_score: f64,
}

/// One persisted cache record.
///
/// Entries written through the exact-cache path carry no embedding and are
/// skipped by similarity search, but remain retrievable by exact key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    /// The original query text.
    pub query: String,
    /// Fixed-length embedding of `query`, absent for exact-only entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// The response served for this query.
    pub response: InferenceResponse,
    /// When the entry was written.
    pub cached_at: DateTime<Utc>,
}

/// A successful similarity lookup.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    /// The cached response of the closest prior query.
    pub response: InferenceResponse,
    /// Cosine similarity between the incoming and the matched query.
    pub similarity: f32,
    /// The cache key the match was stored under, without the tier prefix.
    pub matched_key: String,
}

/// Configuration-time description of one upstream model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier as the provider knows it.
    pub name: String,
    /// Base URL of an OpenAI-compatible API.
    pub endpoint: String,
    /// API key presented as a bearer token.
    #[serde(default)]
    pub credential: String,
    /// Relative weight used by ensemble aggregation.
    #[serde(default = "ModelDescriptor::default_weight")]
    pub weight: f64,
}

impl ModelDescriptor {
    fn default_weight() -> f64 {
        1.0
    }

    /// Fail construction-time wiring when a required field is missing.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("model name is empty".to_string()));
        }
        if self.endpoint.is_empty() {
            return Err(Error::Config(format!(
                "endpoint is empty for model '{}'",
                self.name
            )));
        }
        if self.credential.is_empty() {
            return Err(Error::Config(format!(
                "credential is empty for model '{}'",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_context_is_the_raw_query() {
        let req = InferenceRequest::new("What is 2+2?");
        assert_eq!(req.prompt(), "What is 2+2?");
        assert!(!req.has_context());
    }

    #[test]
    fn prompt_with_context_frames_the_query() {
        let req = InferenceRequest {
            query: "What are the bottlenecks?".into(),
            context: "We have a distributed system with Redis caching.".into(),
            ..Default::default()
        };
        assert_eq!(
            req.prompt(),
            "Context: We have a distributed system with Redis caching.\n\n\
             Question: What are the bottlenecks?"
        );
    }

    #[test]
    fn empty_query_fails_validation() {
        assert!(InferenceRequest::new("   ").validate().is_err());
        assert!(InferenceRequest::new("hi").validate().is_ok());
    }

    #[test]
    fn latency_serializes_as_nanoseconds() {
        let resp = InferenceResponse {
            response: "four".into(),
            model_used: MODEL_EDGE_SLM.into(),
            routing_reason: "Simple query suitable for edge SLM".into(),
            latency: Duration::from_millis(12),
            cache_hit: false,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["latency"], serde_json::json!(12_000_000u64));

        let back: InferenceResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back.latency, Duration::from_millis(12));
    }

    #[test]
    fn cached_entry_omits_absent_embedding() {
        let entry = CachedEntry {
            query: "q".into(),
            embedding: None,
            response: InferenceResponse {
                response: "r".into(),
                model_used: MODEL_EDGE_SLM.into(),
                routing_reason: "Simple query suitable for edge SLM".into(),
                latency: Duration::ZERO,
                cache_hit: false,
                timestamp: Utc::now(),
            },
            cached_at: Utc::now(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("embedding"));
    }

    #[test]
    fn descriptor_validation_names_the_missing_field() {
        let descriptor = ModelDescriptor {
            name: "llama-3.1-8b-instant".into(),
            endpoint: "https://api.groq.com/openai/v1".into(),
            credential: String::new(),
            weight: 1.0,
        };
        let err = descriptor.validate().unwrap_err();
        assert!(err.to_string().contains("llama-3.1-8b-instant"));
    }
}
