//! Query router: analysis, the LLM-vs-SLM decision, and cache-key
//! derivation.

mod analyzer;
mod strategy;

pub use analyzer::{analyze, complexity};
pub use strategy::{RoutingStrategy, ThresholdStrategy};

use tandem_kernel::config::RouterConfig;
use tandem_kernel::{InferenceRequest, QueryMetrics, RoutingDecision};

/// Scores each request and selects the inference path.
pub struct QueryRouter {
    strategy: Box<dyn RoutingStrategy>,
}

impl QueryRouter {
    /// Router with the default threshold strategy from configuration.
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            strategy: Box::new(ThresholdStrategy::new(config.complexity_threshold)),
        }
    }

    /// Router with an injected policy, for tests and experimentation.
    pub fn with_strategy(strategy: Box<dyn RoutingStrategy>) -> Self {
        Self { strategy }
    }

    /// Measure one request.
    pub fn analyze(&self, req: &InferenceRequest) -> QueryMetrics {
        analyzer::analyze(req)
    }

    /// Apply the routing policy to measured metrics.
    pub fn decide(&self, metrics: &QueryMetrics) -> RoutingDecision {
        self.strategy.decide(metrics)
    }

    /// Analyze and decide in one step.
    pub fn route(&self, req: &InferenceRequest) -> RoutingDecision {
        let metrics = self.analyze(req);
        self.decide(&metrics)
    }

    /// Deterministic cache key for a (query, context) pair.
    ///
    /// Generation parameters are deliberately excluded: requests differing
    /// only in temperature or token budget share a cache slot.
    pub fn cache_key(&self, query: &str, context: &str) -> String {
        let digest = md5::compute(format!("{query}|{context}"));
        format!("inference:{digest:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> QueryRouter {
        QueryRouter::new(&RouterConfig::default())
    }

    #[test]
    fn cache_key_is_deterministic() {
        let r = router();
        let a = r.cache_key("What is 2+2?", "");
        let b = r.cache_key("What is 2+2?", "");
        assert_eq!(a, b);
        assert!(a.starts_with("inference:"));
        // md5 hex digest after the prefix.
        assert_eq!(a.len(), "inference:".len() + 32);
    }

    #[test]
    fn cache_key_depends_on_query_and_context_only() {
        let r = router();
        assert_ne!(r.cache_key("a", ""), r.cache_key("b", ""));
        assert_ne!(r.cache_key("a", "x"), r.cache_key("a", "y"));
        // The separator keeps ("ab", "") distinct from ("a", "b").
        assert_ne!(r.cache_key("ab", ""), r.cache_key("a", "b"));
    }

    #[test]
    fn route_combines_analysis_and_policy() {
        let r = router();
        let decision = r.route(&InferenceRequest::new("What is 2+2?"));
        assert!(!decision.use_llm);

        let decision = r.route(&InferenceRequest {
            query: "What are the bottlenecks?".into(),
            context: "We have a distributed system with Redis caching.".into(),
            ..Default::default()
        });
        assert!(decision.use_llm);
    }
}
