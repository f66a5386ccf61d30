//! Dense-vector helpers used by every similarity-based signal.

/// Cosine similarity in `[-1, 1]`, or `None` for empty, mismatched, or
/// zero-norm inputs.
#[must_use]
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f32> {
    if left.len() != right.len() || left.is_empty() {
        return None;
    }

    let mut dot = 0.0_f32;
    let mut left_norm_sq = 0.0_f32;
    let mut right_norm_sq = 0.0_f32;

    for (a, b) in left.iter().zip(right.iter()) {
        dot += a * b;
        left_norm_sq += a * a;
        right_norm_sq += b * b;
    }

    let denom = left_norm_sq.sqrt() * right_norm_sq.sqrt();
    if denom <= f32::EPSILON {
        return None;
    }

    Some((dot / denom).clamp(-1.0, 1.0))
}

/// Cosine similarity clamped to `[0, 1]`.
///
/// Orthogonal and opposed vectors both score 0, so a retrieval threshold
/// reads on the cosine scale. Incomparable vectors score 0.
#[must_use]
pub fn unit_similarity(left: &[f32], right: &[f32]) -> f32 {
    cosine_similarity(left, right).map_or(0.0, |cosine| cosine.max(0.0))
}

/// Element-wise mean of `vectors`.
///
/// Vectors whose dimension differs from the first one are ignored. Returns
/// `None` when no vector contributes.
#[must_use]
pub fn centroid<'a>(vectors: impl IntoIterator<Item = &'a [f32]>) -> Option<Vec<f32>> {
    let mut sum: Option<Vec<f32>> = None;
    let mut count = 0_usize;

    for vector in vectors {
        if vector.is_empty() {
            continue;
        }
        match sum.as_mut() {
            None => {
                sum = Some(vector.to_vec());
                count = 1;
            }
            Some(acc) if acc.len() == vector.len() => {
                for (slot, value) in acc.iter_mut().zip(vector) {
                    *slot += value;
                }
                count += 1;
            }
            Some(_) => {}
        }
    }

    let mut mean = sum?;
    let n = count as f32;
    for slot in &mut mean {
        *slot /= n;
    }
    Some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.3, 0.4, 0.5];
        let sim = cosine_similarity(&v, &v).expect("comparable");
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_rejects_mismatched_and_zero_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_none());
        assert!(cosine_similarity(&[], &[]).is_none());
    }

    #[test]
    fn unit_similarity_clamps_unrelated_vectors_to_zero() {
        assert_eq!(unit_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(unit_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((unit_similarity(&[1.0, 0.0], &[0.8, 0.6]) - 0.8).abs() < 1e-6);
        assert_eq!(unit_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn centroid_averages_matching_dimensions() {
        let a = [1.0_f32, 0.0];
        let b = [0.0_f32, 1.0];
        let odd = [5.0_f32, 5.0, 5.0];
        let mean = centroid([&a[..], &b[..], &odd[..]]).expect("centroid");
        assert_eq!(mean, vec![0.5, 0.5]);
    }

    #[test]
    fn centroid_of_nothing_is_none() {
        assert!(centroid(std::iter::empty::<&[f32]>()).is_none());
    }
}
