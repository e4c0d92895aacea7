//! SLM ensemble engine.
//!
//! Produces one answer from N fast-model backends under a configurable
//! strategy:
//!
//! - **parallel** - dispatch the prompt to every member concurrently and
//!   aggregate the survivors. Fast, tolerant of partial failure.
//! - **series** - chain members, each refining the previous output. Slow,
//!   most refined.
//! - **hybrid** - members `0..N-1` in parallel, then the last (typically
//!   most capable) member refines the aggregated response.
//!
//! An unrecognized or absent strategy degrades to single-model inference on
//! the first member. Aggregation picks exactly one constituent response,
//! never a concatenation.

mod aggregate;

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};

use tandem_kernel::config::SlmConfig;
use tandem_kernel::{Error, InferenceRequest, ModelBackend, Result};

use crate::model::CompletionClient;
use aggregate::{aggregate, MemberOutcome};

/// Ensemble dispatch strategy, parsed from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Parallel,
    Series,
    Hybrid,
}

impl Strategy {
    /// Parse a strategy name. Returns `None` for unrecognized strings,
    /// which callers treat as "single model".
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "parallel" => Some(Self::Parallel),
            "series" => Some(Self::Series),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// How parallel results are reduced to one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    #[default]
    Weighted,
    Longest,
    Voting,
}

impl Aggregation {
    /// Parse an aggregation name; unknown values fall back to weighted.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "longest" => Self::Longest,
            "voting" => Self::Voting,
            _ => Self::Weighted,
        }
    }
}

/// One ensemble member: a backend plus its aggregation weight.
pub struct EnsembleMember {
    pub backend: Arc<dyn ModelBackend>,
    pub weight: f64,
}

impl std::fmt::Debug for EnsembleMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleMember")
            .field("backend", &self.backend.name())
            .field("weight", &self.weight)
            .finish()
    }
}

/// The fan-out engine over N fast models.
///
/// A counting semaphore bounds in-flight engine calls; `close` is one-shot,
/// idempotent, and serialized against in-flight inference.
#[derive(Debug)]
pub struct SlmEngine {
    members: Vec<EnsembleMember>,
    strategy: Option<Strategy>,
    aggregation: Aggregation,
    max_tokens: u32,
    gate: Semaphore,
    closed: RwLock<bool>,
}

impl SlmEngine {
    /// Build an engine from explicit members. Fails when no members are
    /// given or the concurrency gate has zero capacity.
    pub fn new(
        members: Vec<EnsembleMember>,
        strategy: Option<Strategy>,
        aggregation: Aggregation,
        max_concurrent: usize,
        max_tokens: u32,
    ) -> Result<Self> {
        if members.is_empty() {
            return Err(Error::Config("no ensemble members configured".to_string()));
        }
        if max_concurrent == 0 {
            return Err(Error::Config("max_concurrent must be positive".to_string()));
        }
        Ok(Self {
            members,
            strategy,
            aggregation,
            max_tokens,
            gate: Semaphore::new(max_concurrent),
            closed: RwLock::new(false),
        })
    }

    /// Build an engine from configuration, constructing one HTTP client per
    /// configured model. This is the only place strategy and aggregation
    /// strings are interpreted.
    pub fn from_config(config: &SlmConfig) -> Result<Self> {
        let members = config
            .models
            .iter()
            .map(|descriptor| {
                Ok(EnsembleMember {
                    backend: Arc::new(CompletionClient::new(descriptor)?) as Arc<dyn ModelBackend>,
                    weight: descriptor.weight,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let strategy = config.strategy.as_deref().and_then(Strategy::from_str_opt);
        let aggregation = Aggregation::from_str_lossy(&config.aggregation_fn);

        Self::new(
            members,
            strategy,
            aggregation,
            config.max_concurrent,
            config.max_tokens,
        )
    }

    /// Produce one answer for `req` under the configured strategy.
    ///
    /// Blocks on the admission gate; returns [`Error::Cancelled`] when the
    /// engine is closed before admission.
    pub async fn infer(&self, req: &InferenceRequest) -> Result<String> {
        let closed = self.closed.read().await;
        if *closed {
            return Err(Error::Cancelled);
        }
        let _permit = self.gate.acquire().await.map_err(|_| Error::Cancelled)?;

        let max_tokens = self.resolve_max_tokens(req);
        match self.strategy {
            Some(Strategy::Parallel) => self.infer_parallel(req, max_tokens).await,
            Some(Strategy::Series) => self.infer_series(req, max_tokens).await,
            Some(Strategy::Hybrid) => self.infer_hybrid(req, max_tokens).await,
            None => {
                debug!("no ensemble strategy configured, using first member only");
                self.members[0]
                    .backend
                    .complete(&req.prompt(), req.temperature, max_tokens)
                    .await
            }
        }
    }

    /// Degraded streaming path: first member only, same admission gate.
    pub async fn infer_stream(
        &self,
        req: &InferenceRequest,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) -> Result<()> + Send),
    ) -> Result<()> {
        let closed = self.closed.read().await;
        if *closed {
            return Err(Error::Cancelled);
        }
        let _permit = self.gate.acquire().await.map_err(|_| Error::Cancelled)?;

        let max_tokens = self.resolve_max_tokens(req);
        self.members[0]
            .backend
            .complete_stream(&req.prompt(), req.temperature, max_tokens, on_chunk)
            .await
    }

    /// Shut the engine down. Pending admissions are cancelled; the call
    /// returns once in-flight inference has drained. Safe to call twice.
    pub async fn close(&self) {
        self.gate.close();
        let mut closed = self.closed.write().await;
        *closed = true;
    }

    fn resolve_max_tokens(&self, req: &InferenceRequest) -> u32 {
        if req.max_tokens > 0 {
            req.max_tokens
        } else {
            self.max_tokens
        }
    }

    /// Dispatch `prompt` to `members` concurrently and await every result.
    ///
    /// Siblings are never cancelled on first failure; the whole set is
    /// joined so resource use stays bounded. Dropping the returned future
    /// drops all member calls with it.
    async fn fan_out(
        &self,
        members: &[EnsembleMember],
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Vec<MemberOutcome> {
        let calls = members.iter().map(|member| async move {
            MemberOutcome {
                model: member.backend.name().to_string(),
                weight: member.weight,
                result: member.backend.complete(prompt, temperature, max_tokens).await,
            }
        });
        join_all(calls).await
    }

    async fn infer_parallel(&self, req: &InferenceRequest, max_tokens: u32) -> Result<String> {
        let prompt = req.prompt();
        let outcomes = self
            .fan_out(&self.members, &prompt, req.temperature, max_tokens)
            .await;
        aggregate(outcomes, self.aggregation)
    }

    async fn infer_series(&self, req: &InferenceRequest, max_tokens: u32) -> Result<String> {
        let prompt = req.prompt();

        // Stage 0 is fatal on failure; later stages degrade gracefully.
        let mut response = self.members[0]
            .backend
            .complete(&prompt, req.temperature, max_tokens)
            .await?;

        for member in &self.members[1..] {
            let refinement = refinement_prompt(&req.query, &response);
            match member
                .backend
                .complete(&refinement, req.temperature, max_tokens)
                .await
            {
                Ok(refined) => response = refined,
                Err(err) => {
                    warn!(
                        model = member.backend.name(),
                        error = %err,
                        "refinement failed, keeping previous response"
                    );
                    return Ok(response);
                }
            }
        }

        Ok(response)
    }

    async fn infer_hybrid(&self, req: &InferenceRequest, max_tokens: u32) -> Result<String> {
        let prompt = req.prompt();

        // Phase 1: everything but the last member runs in parallel.
        let parallel_count = (self.members.len() - 1).max(1);
        let outcomes = self
            .fan_out(
                &self.members[..parallel_count],
                &prompt,
                req.temperature,
                max_tokens,
            )
            .await;
        let best = aggregate(outcomes, self.aggregation)?;

        // Phase 2: the last member refines the aggregated answer.
        if self.members.len() > 1 {
            let last = &self.members[self.members.len() - 1];
            let refinement = hybrid_refinement_prompt(&req.query, &best);
            match last
                .backend
                .complete(&refinement, req.temperature, max_tokens)
                .await
            {
                Ok(refined) => Ok(refined),
                Err(err) => {
                    warn!(
                        model = last.backend.name(),
                        error = %err,
                        "hybrid refinement failed, returning aggregated response"
                    );
                    Ok(best)
                }
            }
        } else {
            Ok(best)
        }
    }
}

fn refinement_prompt(query: &str, previous: &str) -> String {
    format!(
        "Original query: {query}\n\nPrevious response: {previous}\n\n\
         Please refine and improve the above response, making it more accurate and comprehensive:"
    )
}

fn hybrid_refinement_prompt(query: &str, aggregated: &str) -> String {
    format!(
        "Original query: {query}\n\nAggregated response from multiple models: {aggregated}\n\n\
         Please provide a refined, comprehensive answer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeModel;
    use std::time::Duration;

    fn member(model: FakeModel, weight: f64) -> (Arc<FakeModel>, EnsembleMember) {
        let model = Arc::new(model);
        let entry = EnsembleMember {
            backend: model.clone(),
            weight,
        };
        (model, entry)
    }

    fn engine(
        members: Vec<EnsembleMember>,
        strategy: Option<Strategy>,
        aggregation: Aggregation,
    ) -> SlmEngine {
        SlmEngine::new(members, strategy, aggregation, 4, 256).unwrap()
    }

    #[test]
    fn strategy_parsing_is_the_config_boundary() {
        assert_eq!(Strategy::from_str_opt("parallel"), Some(Strategy::Parallel));
        assert_eq!(Strategy::from_str_opt("SERIES"), Some(Strategy::Series));
        assert_eq!(Strategy::from_str_opt("hybrid"), Some(Strategy::Hybrid));
        assert_eq!(Strategy::from_str_opt("banana"), None);

        assert_eq!(Aggregation::from_str_lossy("voting"), Aggregation::Voting);
        assert_eq!(Aggregation::from_str_lossy("longest"), Aggregation::Longest);
        // Unknown aggregation falls back to weighted.
        assert_eq!(Aggregation::from_str_lossy("banana"), Aggregation::Weighted);
    }

    #[test]
    fn engine_requires_members() {
        let err = SlmEngine::new(vec![], None, Aggregation::Weighted, 4, 256).unwrap_err();
        assert!(err.to_string().contains("members"));
    }

    #[tokio::test]
    async fn parallel_weighted_survives_partial_failure() {
        let (_m1, e1) = member(FakeModel::replying("m1", "one"), 1.0);
        let (_m2, e2) = member(FakeModel::failing("m2", "boom"), 2.0);
        let (_m3, e3) = member(FakeModel::replying("m3", "three"), 1.5);
        let engine = engine(vec![e1, e2, e3], Some(Strategy::Parallel), Aggregation::Weighted);

        let answer = engine.infer(&InferenceRequest::new("q")).await.unwrap();
        // m2 (weight 2.0) failed, so the heaviest survivor is m3.
        assert_eq!(answer, "three");
    }

    #[tokio::test]
    async fn parallel_all_failed_reports_every_model() {
        let (_m1, e1) = member(FakeModel::failing("m1", "timeout"), 1.0);
        let (_m2, e2) = member(FakeModel::failing("m2", "refused"), 1.0);
        let engine = engine(vec![e1, e2], Some(Strategy::Parallel), Aggregation::Weighted);

        let err = engine.infer(&InferenceRequest::new("q")).await.unwrap_err();
        assert!(matches!(err, Error::AllModelsFailed(_)));
        let message = err.to_string();
        assert!(message.contains("m1") && message.contains("m2"));
    }

    #[tokio::test]
    async fn parallel_sends_the_context_framed_prompt_to_every_member() {
        let (m1, e1) = member(FakeModel::replying("m1", "a"), 1.0);
        let (m2, e2) = member(FakeModel::replying("m2", "b"), 1.0);
        let engine = engine(vec![e1, e2], Some(Strategy::Parallel), Aggregation::Weighted);

        let req = InferenceRequest {
            query: "What are the bottlenecks?".into(),
            context: "Redis-backed system.".into(),
            ..Default::default()
        };
        engine.infer(&req).await.unwrap();

        let expected = "Context: Redis-backed system.\n\nQuestion: What are the bottlenecks?";
        assert_eq!(m1.prompts(), vec![expected.to_string()]);
        assert_eq!(m2.prompts(), vec![expected.to_string()]);
    }

    #[tokio::test]
    async fn series_refines_and_degrades_gracefully() {
        let (m1, e1) = member(FakeModel::replying("m1", "draft answer"), 1.0);
        let (m2, e2) = member(FakeModel::replying("m2", "refined answer"), 1.0);
        let (m3, e3) = member(FakeModel::failing("m3", "boom"), 1.0);
        let engine = engine(vec![e1, e2, e3], Some(Strategy::Series), Aggregation::Weighted);

        let answer = engine.infer(&InferenceRequest::new("q")).await.unwrap();
        // m3 failed, so the chain stops at m2's refinement.
        assert_eq!(answer, "refined answer");

        // m2 received a refinement prompt quoting m1's output.
        let m2_prompt = &m2.prompts()[0];
        assert!(m2_prompt.contains("Original query: q"));
        assert!(m2_prompt.contains("Previous response: draft answer"));
        assert!(m2_prompt.contains("refine and improve"));

        assert_eq!(m1.call_count(), 1);
        assert_eq!(m3.call_count(), 1);
    }

    #[tokio::test]
    async fn series_first_stage_failure_is_fatal() {
        let (_m1, e1) = member(FakeModel::failing("m1", "boom"), 1.0);
        let (m2, e2) = member(FakeModel::replying("m2", "never used"), 1.0);
        let engine = engine(vec![e1, e2], Some(Strategy::Series), Aggregation::Weighted);

        let err = engine.infer(&InferenceRequest::new("q")).await.unwrap_err();
        assert!(err.to_string().contains("m1"));
        assert_eq!(m2.call_count(), 0);
    }

    #[tokio::test]
    async fn hybrid_refines_the_aggregated_response() {
        let (_m1, e1) = member(FakeModel::replying("m1", "light answer"), 1.0);
        let (_m2, e2) = member(FakeModel::replying("m2", "heavy answer"), 2.0);
        let (m3, e3) = member(FakeModel::replying("m3", "polished answer"), 1.0);
        let engine = engine(vec![e1, e2, e3], Some(Strategy::Hybrid), Aggregation::Weighted);

        let answer = engine.infer(&InferenceRequest::new("q")).await.unwrap();
        assert_eq!(answer, "polished answer");

        // The refiner saw the aggregated (heaviest) parallel answer.
        let m3_prompt = &m3.prompts()[0];
        assert!(m3_prompt.contains("Aggregated response from multiple models: heavy answer"));
    }

    #[tokio::test]
    async fn hybrid_refinement_failure_returns_aggregated() {
        let (_m1, e1) = member(FakeModel::replying("m1", "light answer"), 1.0);
        let (_m2, e2) = member(FakeModel::replying("m2", "heavy answer"), 2.0);
        let (_m3, e3) = member(FakeModel::failing("m3", "boom"), 1.0);
        let engine = engine(vec![e1, e2, e3], Some(Strategy::Hybrid), Aggregation::Weighted);

        let answer = engine.infer(&InferenceRequest::new("q")).await.unwrap();
        assert_eq!(answer, "heavy answer");
    }

    #[tokio::test]
    async fn unset_strategy_uses_first_member_only() {
        let (m1, e1) = member(FakeModel::replying("m1", "solo"), 1.0);
        let (m2, e2) = member(FakeModel::replying("m2", "unused"), 1.0);
        let engine = engine(vec![e1, e2], None, Aggregation::Weighted);

        let answer = engine.infer(&InferenceRequest::new("q")).await.unwrap();
        assert_eq!(answer, "solo");
        assert_eq!(m1.call_count(), 1);
        assert_eq!(m2.call_count(), 0);
    }

    #[tokio::test]
    async fn admission_gate_bounds_engine_concurrency() {
        let (m1, e1) = member(
            FakeModel::replying("m1", "ok").with_delay(Duration::from_millis(20)),
            1.0,
        );
        let engine = Arc::new(
            SlmEngine::new(vec![e1], None, Aggregation::Weighted, 1, 256).unwrap(),
        );

        let mut handles = Vec::new();
        for _ in 0..4 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.infer(&InferenceRequest::new("q")).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(m1.max_in_flight(), 1);
        assert_eq!(m1.call_count(), 4);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_new_requests() {
        let (_m1, e1) = member(FakeModel::replying("m1", "ok"), 1.0);
        let engine = engine(vec![e1], None, Aggregation::Weighted);

        engine.close().await;
        engine.close().await;

        let err = engine.infer(&InferenceRequest::new("q")).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn streaming_uses_the_first_member() {
        let (_m1, e1) = member(FakeModel::replying("m1", "streamed words"), 1.0);
        let engine = engine(vec![e1], Some(Strategy::Parallel), Aggregation::Weighted);

        let mut collected = String::new();
        engine
            .infer_stream(&InferenceRequest::new("q"), &mut |chunk: &str| {
                collected.push_str(chunk);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(collected.trim(), "streamed words");
    }
}
