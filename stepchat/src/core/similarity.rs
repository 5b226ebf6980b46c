//! Vector comparison for embedding responses.

use anyhow::{Result, bail};

/// Cosine similarity between two embedding vectors.
///
/// Errors on mismatched lengths or when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        bail!(
            "vectors must have the same length ({} != {})",
            a.len(),
            b.len()
        );
    }

    let (dot, mag_a, mag_b) = a
        .iter()
        .zip(b)
        .fold((0.0, 0.0, 0.0), |(dot, ma, mb), (x, y)| {
            (dot + x * y, ma + x * x, mb + y * y)
        });

    if mag_a == 0.0 || mag_b == 0.0 {
        bail!("one or both vectors have zero magnitude");
    }
    Ok(dot / (mag_a.sqrt() * mag_b.sqrt()))
}
