//! Query analysis: the measurements behind the routing decision.

use tandem_kernel::{InferenceRequest, QueryMetrics};

/// Substrings whose presence marks a query as needing deeper reasoning.
const COMPLEXITY_KEYWORDS: [&str; 9] = [
    "explain", "analyze", "compare", "evaluate", "why", "how does", "what if", "reasoning",
    "detailed",
];

/// Derive [`QueryMetrics`] for one request.
pub fn analyze(req: &InferenceRequest) -> QueryMetrics {
    QueryMetrics {
        token_count: req.query.split_whitespace().count(),
        complexity: complexity(&req.query),
        has_context: req.has_context(),
        query_length: req.query.chars().count(),
    }
}

/// Composite complexity score in `[0.0, 1.0]`.
///
/// Weighted blend of query length, lexical diversity, reasoning-keyword
/// presence, and punctuation density:
///
/// ```text
/// 0.3 * length + 0.3 * diversity + 0.3 * keywords + 0.1 * punctuation
/// ```
pub fn complexity(query: &str) -> f64 {
    let length_score = (query.chars().count() as f64 / 1000.0).min(1.0);

    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let diversity_score = if words.is_empty() {
        0.0
    } else {
        let unique: std::collections::HashSet<&str> = words.iter().copied().collect();
        unique.len() as f64 / words.len() as f64
    };

    let keyword_score = COMPLEXITY_KEYWORDS
        .iter()
        .filter(|kw| lowered.contains(*kw))
        .count() as f64
        * 0.15;

    let punct_count = query.chars().filter(|c| is_punctuation(*c)).count();
    let punct_score = (punct_count as f64 / 100.0).min(0.3);

    0.3 * length_score + 0.3 * diversity_score + 0.3 * keyword_score + 0.1 * punct_score
}

/// Punctuation classifier for the density factor: ASCII punctuation plus any
/// non-ASCII character that is neither alphanumeric nor whitespace.
fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || (!c.is_ascii() && !c.is_alphanumeric() && !c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_query_scores_low() {
        let score = complexity("What is 2+2?");
        assert!(score < 0.65, "got {score}");
    }

    #[test]
    fn keyword_rich_long_query_scores_high() {
        let query = "Explain in comprehensive detail the architectural trade-offs between \
                     eventual and strong consistency, analyze why quorum reads matter, \
                     compare leader-based and leaderless replication, and evaluate what if \
                     the network partitions during a detailed failover; include reasoning \
                     about how does each design degrade."
            .repeat(4);
        let score = complexity(&query);
        assert!(score > 0.65, "got {score}");
    }

    #[test]
    fn diversity_is_zero_for_empty_query() {
        assert_eq!(complexity(""), 0.0);
    }

    #[test]
    fn repeated_words_lower_diversity() {
        let diverse = complexity("alpha beta gamma delta epsilon");
        let repetitive = complexity("alpha alpha alpha alpha alpha");
        assert!(diverse > repetitive);
    }

    #[test]
    fn keyword_score_counts_each_keyword_once() {
        // "why" appears three times but contributes a single 0.15.
        let once = complexity("why");
        let thrice = complexity("why why why");
        assert!(once >= thrice);
    }

    #[test]
    fn punctuation_score_is_capped() {
        let punctuation: String = "!?;,.".repeat(100);
        let score = complexity(&punctuation);
        // 0.3 * length + 0.1 * punct cap; diversity and keywords are zero.
        let expected = 0.3 * (punctuation.chars().count() as f64 / 1000.0).min(1.0) + 0.1 * 0.3;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn analyze_counts_tokens_and_context() {
        let req = InferenceRequest {
            query: "What are the bottlenecks?".into(),
            context: "We have a distributed system with Redis caching.".into(),
            ..Default::default()
        };
        let metrics = analyze(&req);
        assert_eq!(metrics.token_count, 4);
        assert!(metrics.has_context);
        assert_eq!(metrics.query_length, req.query.chars().count());
    }
}
