//! # Recall Evaluation
//!
//! recall@k = mean over queries of |top-k returned ∩ top-k truth| / k

use std::collections::HashSet;

use graphann_core::error::{Error, Result};
use graphann_core::{SearchResult, VectorId};
use graphann_storage::GroundTruth;

/// Recall of one query. Only the first `k` ids of each side count.
#[inline]
fn query_recall(returned: impl Iterator<Item = VectorId>, truth: &[VectorId], k: usize) -> f64 {
    let truth: HashSet<VectorId> = truth.iter().take(k).copied().collect();
    let returned: HashSet<VectorId> = returned.take(k).collect();
    truth.intersection(&returned).count() as f64 / k as f64
}

fn check_shape(results: usize, truths: usize, k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::invalid_params("recall k must be at least 1"));
    }
    if results != truths {
        return Err(Error::ShapeMismatch {
            what: "ground truth rows".into(),
            expected: results,
            actual: truths,
        });
    }
    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Per-query recall@k of `results` against `ground_truth`
pub fn per_query_recall(results: &[SearchResult], ground_truth: &[Vec<VectorId>], k: usize) -> Result<Vec<f64>> {
    check_shape(results.len(), ground_truth.len(), k)?;
    Ok(results
        .iter()
        .zip(ground_truth)
        .map(|(r, gt)| query_recall(r.iter().map(|n| n.id), gt, k))
        .collect())
}

/// Mean recall@k, in `[0, 1]`. Zero queries yields `0.0`.
pub fn recall_at_k(results: &[SearchResult], ground_truth: &[Vec<VectorId>], k: usize) -> Result<f64> {
    Ok(mean(&per_query_recall(results, ground_truth, k)?))
}

/// Mean recall@k of a row-major id matrix with `row_len` ids per query.
///
/// Padding ids (`u32::MAX`) never match.
pub fn recall_matrix(ids: &[VectorId], row_len: usize, ground_truth: &GroundTruth, k: usize) -> Result<f64> {
    if k == 0 || row_len == 0 {
        return Err(Error::invalid_params("recall k must be at least 1"));
    }
    if ids.len() % row_len != 0 {
        return Err(Error::ShapeMismatch {
            what: "neighbor id matrix length".into(),
            expected: (ids.len() / row_len + 1) * row_len,
            actual: ids.len(),
        });
    }
    if row_len < k {
        return Err(Error::ShapeMismatch {
            what: "neighbor id columns".into(),
            expected: k,
            actual: row_len,
        });
    }
    let rows = ids.len() / row_len;
    check_shape(rows, ground_truth.num_queries(), k)?;
    if ground_truth.k() < k {
        return Err(Error::ShapeMismatch {
            what: "ground truth columns".into(),
            expected: k,
            actual: ground_truth.k(),
        });
    }

    let values: Vec<f64> = ids
        .chunks_exact(row_len)
        .enumerate()
        .map(|(q, row)| query_recall(row.iter().copied(), ground_truth.ids(q), k))
        .collect();
    Ok(mean(&values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphann_core::Neighbor;

    fn result(ids: &[u32]) -> SearchResult {
        SearchResult::new(ids.iter().enumerate().map(|(i, &id)| Neighbor::new(id, i as f32)).collect())
    }

    #[test]
    fn test_exact_and_disjoint() {
        let results = vec![result(&[1, 2, 3]), result(&[4, 5, 6])];
        let same = vec![vec![3, 2, 1], vec![6, 5, 4]];
        let disjoint = vec![vec![7, 8, 9], vec![10, 11, 12]];
        assert_eq!(recall_at_k(&results, &same, 3).unwrap(), 1.0);
        assert_eq!(recall_at_k(&results, &disjoint, 3).unwrap(), 0.0);
    }

    #[test]
    fn test_partial() {
        let results = vec![result(&[1, 2, 3, 4])];
        let truth = vec![vec![1, 9, 3, 2]];
        // top-2 returned {1,2}, top-2 truth {1,9}
        assert_eq!(recall_at_k(&results, &truth, 2).unwrap(), 0.5);
        let per = per_query_recall(&results, &truth, 4).unwrap();
        assert_eq!(per, vec![0.75]);
    }

    #[test]
    fn test_short_result_counts_against_k() {
        let results = vec![result(&[1])];
        let truth = vec![vec![1, 2]];
        assert_eq!(recall_at_k(&results, &truth, 2).unwrap(), 0.5);
    }

    #[test]
    fn test_shape_errors() {
        let results = vec![result(&[1])];
        let err = recall_at_k(&results, &[], 1).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
        let err = recall_at_k(&results, &[vec![1]], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidParams { .. }));
        assert_eq!(recall_at_k(&[], &[], 5).unwrap(), 0.0);
    }

    #[test]
    fn test_matrix() {
        let gt = GroundTruth::new(2, 2, vec![0, 1, 2, 3], vec![0.0; 4]).unwrap();
        let ids = vec![1, 0, 2, u32::MAX];
        assert_eq!(recall_matrix(&ids, 2, &gt, 2).unwrap(), 0.75);

        let err = recall_matrix(&ids, 2, &gt, 3).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
        let err = recall_matrix(&ids[..2], 2, &gt, 2).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_matrix_wider_than_k() {
        let gt = GroundTruth::new(2, 2, vec![0, 1, 2, 3], vec![0.0; 4]).unwrap();
        let ids = vec![0, 5, 1, 3, 2, 9];
        assert_eq!(recall_matrix(&ids, 3, &gt, 1).unwrap(), 0.5);
        assert_eq!(recall_matrix(&ids, 3, &gt, 2).unwrap(), 0.75);

        let err = recall_matrix(&[0, 3], 1, &gt, 2).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }
}
