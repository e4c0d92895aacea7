//! Embedding-vector similarity.

/// Cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]`: `1.0` for identical direction, `0.0`
/// for orthogonal, `-1.0` for opposite. Returns `0.0` when either vector
/// has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
