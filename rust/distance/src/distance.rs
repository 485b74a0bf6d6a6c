//! Scalar kernels. Callers guarantee `a.len() == b.len()`.

/// Squared l2 distance.
pub fn euclidean_distance_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// `1 - cos(a, b)`. A zero vector is treated as orthogonal to everything.
pub fn cosine_distance_scalar(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom == 0.0 {
        return 1.0;
    }
    1.0_f32 - dot / denom
}

/// `1 - <a, b>`.
pub fn inner_product_scalar(a: &[f32], b: &[f32]) -> f32 {
    1.0_f32 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>()
}
