//! Vector math: L2 normalization, inner product, and query aggregation.
//!
//! The index scores by inner product, which equals cosine similarity only
//! when both sides are unit length. Corpus vectors are always normalized
//! before insertion; query chunk vectors are normalized before
//! [`aggregate`], whose mean is not renormalized.

use crate::error::{Result, RetrievalError};

/// Euclidean (L2) norm of `v`.
///
/// Squares are summed in `f64` so tiny but non-zero components do not
/// underflow to a zero norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt() as f32
}

/// Inner product of two equal-length vectors.
///
/// Callers guarantee equal lengths; extra elements of the longer slice are
/// ignored.
#[inline]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Return `v / ||v||₂`.
///
/// # Errors
///
/// [`RetrievalError::ZeroVector`] when the norm is zero or not finite; the
/// zero vector has no direction.
///
/// # Example
///
/// ```rust
/// use framesift_core::vector::normalize;
///
/// let unit = normalize(&[3.0, 4.0]).unwrap();
/// assert!((unit[0] - 0.6).abs() < 1e-6);
/// assert!((unit[1] - 0.8).abs() < 1e-6);
/// ```
pub fn normalize(v: &[f32]) -> Result<Vec<f32>> {
    let norm = l2_norm(v);
    if !norm.is_finite() || norm <= f32::MIN_POSITIVE {
        return Err(RetrievalError::ZeroVector);
    }
    Ok(v.iter().map(|x| x / norm).collect())
}

/// Normalize each row independently.
///
/// Rows that cannot be normalized come back as `Err` in their original
/// position, so the caller decides whether to skip (corpus side) or reject
/// (query side).
pub fn normalize_batch(rows: &[Vec<f32>]) -> Vec<Result<Vec<f32>>> {
    rows.iter().map(|row| normalize(row)).collect()
}

/// Element-wise mean of the chunk vectors of one query.
///
/// The mean of unit vectors is generally shorter than 1 and is returned as-is;
/// renormalize before search if strict cosine scores are required.
///
/// # Errors
///
/// - [`RetrievalError::EmptyQuery`] when `vectors` is empty.
/// - [`RetrievalError::DimensionMismatch`] when rows differ in length.
pub fn aggregate(vectors: &[Vec<f32>]) -> Result<Vec<f32>> {
    let first = vectors.first().ok_or(RetrievalError::EmptyQuery)?;
    let dims = first.len();

    let mut sum = vec![0.0f32; dims];
    for v in vectors {
        if v.len() != dims {
            return Err(RetrievalError::DimensionMismatch {
                expected: dims,
                actual: v.len(),
            });
        }
        for (acc, x) in sum.iter_mut().zip(v.iter()) {
            *acc += x;
        }
    }

    let n = vectors.len() as f32;
    for x in sum.iter_mut() {
        *x /= n;
    }
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(&[1.0, 2.0, 3.0, -4.0]).unwrap();
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_idempotent() {
        for v in [
            vec![3.0f32, 4.0],
            vec![1e-3, -2e-3, 5e-4],
            vec![100.0, 0.0, -250.0, 7.5],
        ] {
            let once = normalize(&v).unwrap();
            let twice = normalize(&once).unwrap();
            assert!(approx(&once, &twice), "{:?} vs {:?}", once, twice);
        }
    }

    #[test]
    fn test_normalize_tiny_and_huge_components() {
        let tiny = normalize(&[1e-25, 0.0]).unwrap();
        assert!(approx(&tiny, &[1.0, 0.0]));

        let huge = normalize(&[3e30, 4e30]).unwrap();
        assert!(approx(&huge, &[0.6, 0.8]));
    }

    #[test]
    fn test_normalize_zero_vector_rejected() {
        assert_eq!(normalize(&[0.0, 0.0]), Err(RetrievalError::ZeroVector));
        assert_eq!(normalize(&[]), Err(RetrievalError::ZeroVector));
        assert_eq!(
            normalize(&[f32::NAN, 1.0]),
            Err(RetrievalError::ZeroVector)
        );
    }

    #[test]
    fn test_normalize_batch_keeps_positions() {
        let rows = vec![vec![2.0, 0.0], vec![0.0, 0.0], vec![0.0, -3.0]];
        let out = normalize_batch(&rows);
        assert_eq!(out.len(), 3);
        assert!(approx(out[0].as_ref().unwrap(), &[1.0, 0.0]));
        assert_eq!(out[1], Err(RetrievalError::ZeroVector));
        assert!(approx(out[2].as_ref().unwrap(), &[0.0, -1.0]));
    }

    #[test]
    fn test_aggregate_mean_not_renormalized() {
        let mean = aggregate(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert!(approx(&mean, &[0.5, 0.5]));
        assert!(l2_norm(&mean) < 1.0);
    }

    #[test]
    fn test_aggregate_single_is_identity() {
        let v = vec![0.6, 0.8];
        assert_eq!(aggregate(std::slice::from_ref(&v)).unwrap(), v);
    }

    #[test]
    fn test_aggregate_errors() {
        assert_eq!(aggregate(&[]), Err(RetrievalError::EmptyQuery));
        assert_eq!(
            aggregate(&[vec![1.0, 0.0], vec![1.0]]),
            Err(RetrievalError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }
}
