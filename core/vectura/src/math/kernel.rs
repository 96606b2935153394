use ndarray::{Array1, ArrayView1, ArrayView2};
use thiserror::Error;

/// Raised when `normalize` is asked to divide a vector whose L2 norm falls
/// below the numerical floor (spec §3/§4.1).
#[derive(Debug, Error, PartialEq)]
#[error("vector norm {0} is below the minimum of 1e-10")]
pub struct ZeroNorm(pub f32);

/// Numerical tolerance used by equality tests against kernel output (spec §4.1).
pub const TOLERANCE: f32 = 1e-5;

const MIN_NORM: f32 = 1e-10;

/// Euclidean length of `v`.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Divide `v` component-wise by its L2 norm. Fails when the norm is below
/// `1e-10`, per spec §3 ("a document whose embedding has L2 norm < 1e-10 is
/// rejected at ingress").
pub fn normalize(v: &[f32]) -> Result<Vec<f32>, ZeroNorm> {
    let n = l2_norm(v);
    if n < MIN_NORM {
        return Err(ZeroNorm(n));
    }
    Ok(v.iter().map(|x| x / n).collect())
}

/// Cosine similarity of a batch of `N` pre-normalized rows (row-major, `N x D`)
/// against a single pre-normalized query of length `D`.
///
/// Both `docs` and `query` must already be unit-normalized: the dot product
/// alone then equals cosine similarity. Implemented as a GEMV via `ndarray`
/// (backed by the `matrixmultiply` crate), not a naive per-row loop, per
/// spec §4.1.
///
/// # Panics
/// Panics if `docs.len() != n * d` or `query.len() != d` — dimension
/// agreement is the caller's responsibility (the facade validates it before
/// any similarity work, per spec §4.4).
pub fn cosine_batch(docs: &[f32], n: usize, d: usize, query: &[f32]) -> Vec<f32> {
    assert_eq!(docs.len(), n * d, "docs buffer does not match n*d");
    assert_eq!(query.len(), d, "query dimension does not match d");

    if n == 0 || d == 0 {
        return vec![0.0; n];
    }

    let matrix = ArrayView2::from_shape((n, d), docs).expect("row-major N x D buffer");
    let q: Array1<f32> = ArrayView1::from(query).to_owned();
    matrix.dot(&q).into_raw_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_norm_of_unit_vector() {
        assert!((l2_norm(&[1.0, 0.0, 0.0]) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let v = normalize(&[3.0, 4.0]).unwrap();
        assert!((l2_norm(&v) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn normalize_rejects_near_zero_vector() {
        let err = normalize(&[0.0, 0.0, 1e-12]).unwrap_err();
        assert!(err.0 < MIN_NORM);
    }

    #[test]
    fn cosine_batch_matches_naive_reference() {
        let a = normalize(&[1.0, 0.0]).unwrap();
        let b = normalize(&[1.0, 1.0]).unwrap();
        let c = normalize(&[0.0, 1.0]).unwrap();
        let mut docs = Vec::new();
        docs.extend_from_slice(&a);
        docs.extend_from_slice(&b);
        docs.extend_from_slice(&c);

        let query = normalize(&[1.0, 0.0]).unwrap();
        let scores = cosine_batch(&docs, 3, 2, &query);

        assert_eq!(scores.len(), 3);
        assert!((scores[0] - 1.0).abs() < TOLERANCE);
        assert!((scores[1] - std::f32::consts::FRAC_1_SQRT_2).abs() < TOLERANCE);
        assert!((scores[2] - 0.0).abs() < TOLERANCE);
    }

    #[test]
    fn cosine_batch_empty_corpus() {
        let scores = cosine_batch(&[], 0, 4, &[1.0, 0.0, 0.0, 0.0]);
        assert!(scores.is_empty());
    }
}
