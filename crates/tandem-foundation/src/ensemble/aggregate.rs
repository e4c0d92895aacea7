//! Result aggregation for the ensemble fan-out.
//!
//! Aggregation always returns the text of exactly one constituent model;
//! responses are never concatenated or synthesized.

use tandem_kernel::{Error, Result};

use super::Aggregation;

/// What one ensemble member produced.
pub(crate) struct MemberOutcome {
    pub model: String,
    pub weight: f64,
    pub result: Result<String>,
}

struct Survivor {
    weight: f64,
    text: String,
}

/// Reduce the fan-out results to a single response.
///
/// Only successful, non-empty responses participate. When none survive,
/// the error joins every per-model failure message.
pub(crate) fn aggregate(outcomes: Vec<MemberOutcome>, aggregation: Aggregation) -> Result<String> {
    let mut survivors = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome.result {
            Ok(text) if !text.is_empty() => survivors.push(Survivor {
                weight: outcome.weight,
                text,
            }),
            Ok(_) => {}
            Err(err) => failures.push(format!("{}: {}", outcome.model, err)),
        }
    }

    if survivors.is_empty() {
        return Err(Error::AllModelsFailed(failures.join("; ")));
    }

    let chosen = match aggregation {
        Aggregation::Weighted => pick_weighted(&survivors),
        Aggregation::Longest => pick_longest(&survivors),
        Aggregation::Voting => pick_voting(&survivors),
    };
    Ok(survivors[chosen].text.clone())
}

/// Index of the survivor with the greatest weight; ties keep input order.
fn pick_weighted(survivors: &[Survivor]) -> usize {
    let mut best = 0;
    for (i, survivor) in survivors.iter().enumerate().skip(1) {
        if survivor.weight > survivors[best].weight {
            best = i;
        }
    }
    best
}

/// Index of the longest response by character count; ties keep input order.
fn pick_longest(survivors: &[Survivor]) -> usize {
    let mut best = 0;
    for (i, survivor) in survivors.iter().enumerate().skip(1) {
        if survivor.text.chars().count() > survivors[best].text.chars().count() {
            best = i;
        }
    }
    best
}

/// Similarity-weighted voting: each response scores its own weight plus the
/// Jaccard similarity to every other response scaled by that response's
/// weight. Consensus answers from heavy models win.
fn pick_voting(survivors: &[Survivor]) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;

    for (i, survivor) in survivors.iter().enumerate() {
        let mut score = survivor.weight;
        for (j, other) in survivors.iter().enumerate() {
            if i != j {
                score += jaccard_similarity(&survivor.text, &other.text) * other.weight;
            }
        }
        if score > best_score {
            best_score = score;
            best = i;
        }
    }
    best
}

/// Jaccard coefficient over lowercased whitespace-split tokens; `0.0` when
/// either side has no tokens.
pub(crate) fn jaccard_similarity(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;

    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let tokens_a: HashSet<&str> = a_lower.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b_lower.split_whitespace().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}
