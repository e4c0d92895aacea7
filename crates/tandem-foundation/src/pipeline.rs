//! The end-to-end request pipeline.
//!
//! Ordering within one request is strict: cache lookup precedes routing,
//! routing precedes inference, inference precedes write-back. Read-side
//! cache failures degrade to misses, write-side failures are logged, and
//! inference failures abort the request. Cancellation is the caller
//! dropping the future: no partial result survives and no write-back
//! happens.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use tandem_kernel::{
    Error, InferenceRequest, InferenceResponse, ModelBackend, ResponseCache,
    SemanticResponseCache, MODEL_CLOUD_LLM, MODEL_EDGE_SLM,
};

use crate::ensemble::SlmEngine;
use crate::routing::QueryRouter;

/// A pipeline failure, annotated with where in the flow it happened so the
/// HTTP layer can report the attempted model and routing decision.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct PipelineError {
    /// Which path was being invoked, when inference had started.
    pub model: Option<String>,
    /// The routing reason, when a decision had been made.
    pub routing: Option<String>,
    #[source]
    pub source: Error,
}

impl From<Error> for PipelineError {
    fn from(source: Error) -> Self {
        Self {
            model: None,
            routing: None,
            source,
        }
    }
}

struct SemanticTier {
    cache: Arc<dyn SemanticResponseCache>,
    threshold: f32,
}

/// Owns one request's journey: cache check, routing, inference, write-back.
///
/// All collaborators are wired in explicitly; the pipeline holds no global
/// state and lives for the process lifetime.
pub struct InferencePipeline {
    router: QueryRouter,
    llm: Arc<dyn ModelBackend>,
    llm_max_tokens: u32,
    slm: Arc<SlmEngine>,
    cache: Arc<dyn ResponseCache>,
    semantic: Option<SemanticTier>,
}

impl InferencePipeline {
    pub fn new(
        router: QueryRouter,
        llm: Arc<dyn ModelBackend>,
        llm_max_tokens: u32,
        slm: Arc<SlmEngine>,
        cache: Arc<dyn ResponseCache>,
    ) -> Self {
        Self {
            router,
            llm,
            llm_max_tokens,
            slm,
            cache,
            semantic: None,
        }
    }

    /// Enable the semantic tier. Write-back then targets it instead of the
    /// exact cache.
    pub fn with_semantic_cache(
        mut self,
        cache: Arc<dyn SemanticResponseCache>,
        threshold: f32,
    ) -> Self {
        self.semantic = Some(SemanticTier { cache, threshold });
        self
    }

    /// Serve one request.
    pub async fn execute(
        &self,
        req: &InferenceRequest,
    ) -> std::result::Result<InferenceResponse, PipelineError> {
        req.validate()?;
        let start = Instant::now();

        // 1. Semantic near-match, when the tier is active. A lookup failure
        //    (embedding service down, store unreachable) falls through to
        //    the exact tier.
        if let Some(tier) = &self.semantic {
            match tier.cache.get_similar(&req.query, tier.threshold).await {
                Ok(Some(hit)) => {
                    info!(
                        similarity = hit.similarity,
                        matched_key = %hit.matched_key,
                        "semantic cache hit"
                    );
                    let mut response = hit.response;
                    response.routing_reason = format!(
                        "{} (semantic cache hit, similarity: {:.3})",
                        response.routing_reason, hit.similarity
                    );
                    response.cache_hit = true;
                    response.latency = start.elapsed();
                    return Ok(response);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "semantic lookup failed, falling back to exact cache");
                }
            }
        }

        // 2. Exact fingerprint match.
        let cache_key = self.router.cache_key(&req.query, &req.context);
        match self.cache.get(&cache_key).await {
            Ok(Some(mut response)) => {
                debug!(key = %cache_key, "exact cache hit");
                response.cache_hit = true;
                response.latency = start.elapsed();
                return Ok(response);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(key = %cache_key, error = %err, "cache read failed, treating as miss");
            }
        }

        // 3-4. Analyze and decide.
        let metrics = self.router.analyze(req);
        let decision = self.router.decide(&metrics);
        debug!(
            complexity = decision.complexity_score,
            use_llm = decision.use_llm,
            reason = %decision.reason,
            "routed query"
        );

        // 5. Invoke the chosen path. Any inference error is fatal here.
        let (model_used, result) = if decision.use_llm {
            let max_tokens = if req.max_tokens > 0 {
                req.max_tokens
            } else {
                self.llm_max_tokens
            };
            let result = self
                .llm
                .complete(&req.prompt(), req.temperature, max_tokens)
                .await;
            (MODEL_CLOUD_LLM, result)
        } else {
            (MODEL_EDGE_SLM, self.slm.infer(req).await)
        };

        let text = result.map_err(|source| PipelineError {
            model: Some(model_used.to_string()),
            routing: Some(decision.reason.clone()),
            source,
        })?;

        let response = InferenceResponse {
            response: text,
            model_used: model_used.to_string(),
            routing_reason: decision.reason,
            latency: start.elapsed(),
            cache_hit: false,
            timestamp: Utc::now(),
        };

        // 6. Write back to exactly one tier: semantic when active, exact
        //    otherwise. Failure here costs a future hit, not this request.
        let write_back = match &self.semantic {
            Some(tier) => {
                tier.cache
                    .set_with_embedding(&cache_key, &req.query, &response)
                    .await
            }
            None => self.cache.set(&cache_key, &response).await,
        };
        if let Err(err) = write_back {
            warn!(key = %cache_key, error = %err, "cache write-back failed");
        }

        Ok(response)
    }
}
