use std::collections::HashMap;

use uuid::Uuid;

/// Combines vector and BM25 result sets into a single ranked list (spec
/// §4.5). `vector_results` is expected to already be the top `2*top_k`
/// (uninflated) cosine hits; `bm25_results` the top `min(2*top_k, N)` BM25
/// hits — the 2x inflation happens at the call site, not here, so this
/// function stays a pure combinator.
pub fn fuse(
    vector_results: &[(Uuid, f32)],
    bm25_results: &[(Uuid, f32)],
    fusion_weight: f32,
    bm25_norm_factor: f32,
    threshold: Option<f32>,
    top_k: usize,
) -> Vec<(Uuid, f32)> {
    let norm_bm25: HashMap<Uuid, f32> = bm25_results
        .iter()
        .map(|(id, score)| (*id, (*score / bm25_norm_factor).clamp(0.0, 1.0)))
        .collect();

    let mut seen = std::collections::HashSet::new();
    let mut hybrid: Vec<(Uuid, f32)> = Vec::with_capacity(vector_results.len() + bm25_results.len());

    for (id, vector_score) in vector_results {
        let bm25_component = norm_bm25.get(id).copied().unwrap_or(0.0);
        // At w=0 the vector side contributes nothing; a vector-only hit (no
        // BM25 evidence) would otherwise surface as a spurious zero-score
        // result, which breaks the "w=0 returns only BM25 hits" guarantee.
        if fusion_weight == 0.0 && bm25_component == 0.0 {
            continue;
        }
        let score = fusion_weight * vector_score + (1.0 - fusion_weight) * bm25_component;
        hybrid.push((*id, score));
        seen.insert(*id);
    }

    for (id, _) in bm25_results {
        if seen.contains(id) {
            continue;
        }
        let bm25_component = norm_bm25.get(id).copied().unwrap_or(0.0);
        let score = (1.0 - fusion_weight) * bm25_component;
        hybrid.push((*id, score));
        seen.insert(*id);
    }

    let mut results: Vec<(Uuid, f32)> = hybrid
        .into_iter()
        .filter(|(_, score)| threshold.map(|t| *score >= t).unwrap_or(true))
        .collect();
    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_vector_weight_matches_vector_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let vector_results = vec![(a, 0.9), (b, 0.4)];
        let bm25_results = vec![(b, 5.0)];

        let results = fuse(&vector_results, &bm25_results, 1.0, 10.0, None, 10);
        assert_eq!(results, vec![(a, 0.9), (b, 0.4)]);
    }

    #[test]
    fn pure_bm25_weight_only_includes_bm25_positive_hits() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let vector_results = vec![(a, 0.9)];
        let bm25_results = vec![(b, 5.0)];

        let results = fuse(&vector_results, &bm25_results, 0.0, 10.0, None, 10);
        // `a` has no BM25 evidence and w=0, so it drops out entirely rather
        // than surfacing with a spurious zero score.
        assert_eq!(results, vec![(b, 0.5)]);
    }

    #[test]
    fn bm25_only_hits_are_included() {
        let a = Uuid::new_v4();
        let vector_results: Vec<(Uuid, f32)> = vec![];
        let bm25_results = vec![(a, 20.0)];

        let results = fuse(&vector_results, &bm25_results, 0.5, 10.0, None, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, a);
        assert!((results[0].1 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn norm_bm25_clamps_to_unit_range() {
        let a = Uuid::new_v4();
        let bm25_results = vec![(a, 1000.0)];
        let results = fuse(&[], &bm25_results, 0.0, 10.0, None, 10);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }
}
