//! Routing policy: which model class serves a query.

use tandem_kernel::{QueryMetrics, RoutingDecision};

/// Word count above which a query is considered long.
const LONG_QUERY_TOKENS: usize = 100;

pub(crate) const REASON_HIGH_COMPLEXITY: &str = "High complexity query requires LLM reasoning";
pub(crate) const REASON_LONG_QUERY: &str = "Long query requires cloud LLM processing";
pub(crate) const REASON_CONTEXT: &str = "Context-aware query routed to LLM";
pub(crate) const REASON_SIMPLE: &str = "Simple query suitable for edge SLM";

/// Policy seam: maps query measurements to an LLM-vs-SLM decision.
pub trait RoutingStrategy: Send + Sync {
    fn decide(&self, metrics: &QueryMetrics) -> RoutingDecision;
}

/// The default multi-factor policy. Rules are applied in order and the
/// first match wins; both comparisons are strict, so a query sitting
/// exactly on a boundary falls through to the next rule.
pub struct ThresholdStrategy {
    complexity_threshold: f64,
}

impl ThresholdStrategy {
    pub fn new(complexity_threshold: f64) -> Self {
        Self {
            complexity_threshold,
        }
    }
}

impl RoutingStrategy for ThresholdStrategy {
    fn decide(&self, metrics: &QueryMetrics) -> RoutingDecision {
        if metrics.complexity > self.complexity_threshold {
            return RoutingDecision {
                use_llm: true,
                reason: REASON_HIGH_COMPLEXITY.to_string(),
                confidence: 0.9,
                complexity_score: metrics.complexity,
            };
        }

        if metrics.token_count > LONG_QUERY_TOKENS {
            return RoutingDecision {
                use_llm: true,
                reason: REASON_LONG_QUERY.to_string(),
                confidence: 0.85,
                complexity_score: metrics.complexity,
            };
        }

        if metrics.has_context {
            return RoutingDecision {
                use_llm: true,
                reason: REASON_CONTEXT.to_string(),
                confidence: 0.8,
                complexity_score: metrics.complexity,
            };
        }

        RoutingDecision {
            use_llm: false,
            reason: REASON_SIMPLE.to_string(),
            confidence: 0.95,
            complexity_score: metrics.complexity,
        }
    }
}
