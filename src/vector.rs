//! Numeric helpers shared by the index and the reranker.

use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Added to the cosine denominator so zero-norm vectors score 0 instead of
/// dividing by zero.
pub const COSINE_EPSILON: f32 = 1e-8;

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Squares are summed in `f64`, which holds the square of any finite `f32`
/// without overflow or underflow.
fn norm_f64(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

fn dot_f64(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    norm_f64(v) as f32
}

/// Scale `v` to unit L2 norm in place.
///
/// Only an all-zero vector is left untouched, so anything compared against
/// it scores 0. Vectors holding NaN or infinity are also left as they are.
pub fn normalize(v: &mut [f32]) {
    let norm = norm_f64(v);
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x = (f64::from(*x) / norm) as f32;
        }
    }
}

/// Cosine similarity that does not assume either input is normalized.
///
/// # Examples
///
/// ```
/// use ragrank::vector::cosine_similarity;
///
/// let s = cosine_similarity(&[2.0, 0.0], &[5.0, 0.0]);
/// assert!((s - 1.0).abs() < 1e-6);
/// assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denominator = norm_f64(a) * norm_f64(b) + f64::from(COSINE_EPSILON);
    (dot_f64(a, b) / denominator) as f32
}

pub fn check_dimension(expected: usize, v: &[f32]) -> Result<()> {
    if v.len() == expected {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            expected,
            actual: v.len(),
        })
    }
}

/// Positions of `scores` ordered by descending score.
///
/// The sort is stable, so equal scores keep their original relative order.
/// NaN ranks below everything and `-0.0` ties with `0.0`.
pub fn rank_descending(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| compare_desc(scores[a], scores[b]));
    order
}

fn compare_desc(a: f32, b: f32) -> Ordering {
    rank_key(b).total_cmp(&rank_key(a))
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        // Folds -0.0 into 0.0.
        score + 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_norm() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_handles_extreme_magnitudes() {
        for mut v in [
            vec![1e20, 1e20],
            vec![3e38, -3e38, 1.0],
            vec![1e-25, 0.0],
            vec![1e-40, 0.0, 0.0],
        ] {
            normalize(&mut v);
            let norm = l2_norm(&v);
            assert!((norm - 1.0).abs() < 1e-4, "{v:?} has norm {norm}");
        }
    }

    #[test]
    fn cosine_handles_extreme_magnitudes() {
        let big = cosine_similarity(&[1e30, 0.0], &[2e30, 0.0]);
        assert!((big - 1.0).abs() < 1e-6);

        let opposite = cosine_similarity(&[-1e25, 0.0], &[3e25, 0.0]);
        assert!((opposite + 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector_alone() {
        let mut v = vec![0.0; 4];
        normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn cosine_ignores_magnitude() {
        let a = cosine_similarity(&[1.0, 1.0], &[10.0, 10.0]);
        assert!((a - 1.0).abs() < 1e-6);

        let b = cosine_similarity(&[1.0, 0.0], &[-3.0, 0.0]);
        assert!((b + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn check_dimension_reports_lengths() {
        assert!(check_dimension(3, &[1.0, 2.0, 3.0]).is_ok());
        match check_dimension(3, &[1.0]) {
            Err(Error::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 1);
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn rank_descending_is_stable() {
        let order = rank_descending(&[0.5, 0.9, 0.5, 0.9, 0.1]);
        assert_eq!(order, vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn rank_descending_treats_signed_zero_as_tie() {
        let order = rank_descending(&[-0.0, 0.0, -0.0]);
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn rank_descending_puts_nan_last() {
        let order = rank_descending(&[f32::NAN, -1.0, 2.0]);
        assert_eq!(order, vec![2, 1, 0]);
    }
}
