use std::sync::Arc;

use uuid::Uuid;

use crate::concurrency::run_bounded;
use crate::document::Document;
use crate::error::{VecturaError, VecturaResult};
use crate::math::{cosine_batch, normalize};
use crate::storage::IndexedStorage;

/// Full-memory cosine search (spec §4.4): stacks the corpus into a
/// contiguous `N x D` row-major buffer, calls the kernel, filters by an
/// optional threshold, sorts descending, and returns the first `top_k`.
/// Ties are broken by preserving `corpus`'s original order (Rust's
/// `sort_by` is stable).
pub fn search_full_memory(
    corpus: &[(Uuid, Vec<f32>)],
    query: &[f32],
    top_k: usize,
    threshold: Option<f32>,
) -> Vec<(Uuid, f32)> {
    if corpus.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let d = query.len();
    let mut buffer = Vec::with_capacity(corpus.len() * d);
    for (_, emb) in corpus {
        buffer.extend_from_slice(emb);
    }

    let scores = cosine_batch(&buffer, corpus.len(), d, query);

    let mut scored: Vec<(Uuid, f32)> = corpus
        .iter()
        .zip(scores)
        .filter(|(_, score)| threshold.map(|t| *score >= t).unwrap_or(true))
        .map(|((id, _), score)| (*id, score))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

/// Two-stage indexed search (spec §4.4). Stage 1 asks `storage` for
/// candidate ids; `None` means "unsupported" and triggers a full-memory
/// fallback over the entire persisted set. Stage 2 loads the candidates in
/// bounded-concurrency batches and rescores them exactly.
///
/// Never mutates storage; the query's dimension must already equal `D` by
/// the time this is called (the facade checks that before any similarity
/// work, per spec §4.4).
pub async fn search_indexed(
    storage: &Arc<dyn IndexedStorage>,
    query_normalized: &[f32],
    top_k: usize,
    threshold: Option<f32>,
    mult: usize,
    batch: usize,
    max_conc: usize,
) -> VecturaResult<Vec<(Uuid, f32)>> {
    let prefilter_size = top_k.saturating_mul(mult);
    let candidates = storage
        .search_candidates(query_normalized, top_k, prefilter_size)
        .await?;

    let Some(candidate_ids) = candidates else {
        tracing::info!("indexed storage does not support candidate prefiltering; falling back to full-memory scan");
        let all = storage.load_all().await?;
        let corpus = normalize_corpus(all)?;
        return Ok(search_full_memory(&corpus, query_normalized, top_k, threshold));
    };

    if candidate_ids.is_empty() {
        return Ok(Vec::new());
    }

    let chunks: Vec<Vec<Uuid>> = candidate_ids
        .chunks(batch.max(1))
        .map(|c| c.to_vec())
        .collect();
    let total_batches = chunks.len();

    let (loaded_maps, failures) = run_bounded(
        chunks,
        max_conc.max(1),
        |_chunk| None,
        {
            let storage = storage.clone();
            move |chunk| {
                let storage = storage.clone();
                async move { storage.load_by_ids(&chunk).await.map_err(|e| e.to_string()) }
            }
        },
    )
    .await;

    for failure in &failures {
        tracing::warn!("candidate batch load failed: {}", failure.message);
    }
    if loaded_maps.is_empty() && !failures.is_empty() {
        return Err(VecturaError::load_failed(format!(
            "all {total_batches} candidate batch(es) failed to load"
        )));
    }

    let docs: Vec<Document> = loaded_maps.into_iter().flat_map(|m| m.into_values()).collect();
    let corpus = normalize_corpus(docs)?;
    Ok(search_full_memory(&corpus, query_normalized, top_k, threshold))
}

fn normalize_corpus(docs: Vec<Document>) -> VecturaResult<Vec<(Uuid, Vec<f32>)>> {
    docs.into_iter()
        .map(|d| {
            normalize(&d.embedding)
                .map(|n| (d.id, n))
                .map_err(|_| VecturaError::invalid(format!("document {} has a near-zero embedding", d.id)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(x: f32, y: f32) -> Vec<f32> {
        normalize(&[x, y]).unwrap()
    }

    #[test]
    fn returns_top_k_sorted_descending() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let corpus = vec![(a, unit(1.0, 0.0)), (b, unit(1.0, 1.0)), (c, unit(0.0, 1.0))];
        let query = unit(1.0, 0.0);

        let results = search_full_memory(&corpus, &query, 2, None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, a);
        assert!(results[0].1 >= results[1].1);
    }

    #[test]
    fn threshold_filters_results() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let corpus = vec![(a, unit(1.0, 0.0)), (b, unit(0.0, 1.0))];
        let query = unit(1.0, 0.0);

        let results = search_full_memory(&corpus, &query, 10, Some(0.9));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, a);
    }

    #[test]
    fn empty_corpus_returns_empty() {
        let results = search_full_memory(&[], &[1.0, 0.0], 5, None);
        assert!(results.is_empty());
    }
}
