//! End-to-end scenarios exercising `Database` against the default
//! file-backed storage with a deterministic stub embedder.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;
use vectura::{Config, Database, Embedder, MemoryStrategy, VecturaError};

/// Deterministic, collision-resistant bag-of-words embedder: each token
/// hashes into one of `dim` buckets. Similar texts (shared tokens) land
/// close together in cosine space without needing a real model.
struct StubEmbedder {
    dim: usize,
}

impl StubEmbedder {
    fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn hash_bucket(&self, token: &str) -> usize {
        let mut h: u64 = 1469598103934665603;
        for b in token.bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(1099511628211);
        }
        (h as usize) % self.dim
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>> {
        let mut v = vec![0.0f32; self.dim];
        for word in text.to_lowercase().split_whitespace() {
            v[self.hash_bucket(word)] += 1.0;
        }
        Ok(v)
    }
}

async fn open_with_dim(tmp: &tempfile::TempDir, dim: usize) -> Database {
    let mut config = Config::new("integration-db");
    config.storage_dir = Some(tmp.path().to_string_lossy().to_string());
    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder::new(dim));
    Database::open(config, embedder, None).await.unwrap()
}

#[tokio::test]
async fn tiny_semantic_search_ranks_closer_text_first() {
    let tmp = tempfile::tempdir().unwrap();
    let db = open_with_dim(&tmp, 64).await;

    db.add("The quick brown fox".to_string(), None).await.unwrap();
    db.add("Pack my box with five dozen liquor jugs".to_string(), None).await.unwrap();
    db.add("How vexingly quick daft zebras jump".to_string(), None).await.unwrap();

    let results = db.search_text("quick jumping animals", Some(2), None).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].1 >= results[1].1);
}

#[tokio::test]
async fn custom_id_overwrite_results_in_single_document() {
    let tmp = tempfile::tempdir().unwrap();
    let db = open_with_dim(&tmp, 32).await;

    let fixed_id = Uuid::new_v4();
    db.add("first".to_string(), Some(fixed_id)).await.unwrap();
    db.add("second".to_string(), Some(fixed_id)).await.unwrap();

    assert_eq!(db.count().await.unwrap(), 1);

    let results = db.search_text("second", Some(10), None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, fixed_id);
}

#[tokio::test]
async fn dimension_mismatch_is_rejected_without_mutating_state() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::new("integration-db");
    config.storage_dir = Some(tmp.path().to_string_lossy().to_string());
    config.dimension = Some(128);
    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder::new(384));
    let db = Database::open(config, embedder, None).await.unwrap();

    let err = db.add("mismatched".to_string(), None).await.unwrap_err();
    assert!(matches!(
        err,
        VecturaError::DimensionMismatch { expected: 128, actual: 384 }
    ));
    assert_eq!(db.count().await.unwrap(), 0);
}

#[tokio::test]
async fn persistence_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::new("integration-db");
    config.storage_dir = Some(tmp.path().to_string_lossy().to_string());
    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder::new(32));

    {
        let db = Database::open(config.clone(), embedder.clone(), None).await.unwrap();
        db.add("first document".to_string(), None).await.unwrap();
        db.add("second document".to_string(), None).await.unwrap();
    }

    let reopened = Database::open(config, embedder, None).await.unwrap();
    assert_eq!(reopened.count().await.unwrap(), 2);

    let results = reopened.search_text("first document", Some(10), None).await.unwrap();
    assert!(results.iter().any(|(_, score)| *score > 0.0));
}

#[tokio::test]
async fn removing_a_document_updates_lexical_results() {
    let tmp = tempfile::tempdir().unwrap();
    let db = open_with_dim(&tmp, 32).await;

    let hello_world = db.add("hello world".to_string(), None).await.unwrap();
    db.add("hello there".to_string(), None).await.unwrap();
    db.add("world peace".to_string(), None).await.unwrap();

    let before = db.search_text("hello", Some(5), None).await.unwrap();
    assert_eq!(before.len(), 2);

    db.delete(&[hello_world]).await.unwrap();

    let after = db.search_text("hello", Some(5), None).await.unwrap();
    assert_eq!(after.len(), 1);
    assert!(after.iter().all(|(id, _)| *id != hello_world));
}

#[tokio::test]
async fn indexed_strategy_falls_back_to_full_memory_without_indexed_storage() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::new("integration-db");
    config.storage_dir = Some(tmp.path().to_string_lossy().to_string());
    config.memory_strategy = MemoryStrategy::Indexed { mult: 5, batch: 2, max_conc: 2 };
    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder::new(32));

    let db = Database::open(config, embedder, None).await.unwrap();
    db.add("alpha beta gamma".to_string(), None).await.unwrap();
    db.add("beta gamma delta".to_string(), None).await.unwrap();

    // The default file-backed storage never implements IndexedStorage, so
    // this must silently degrade to full-memory search rather than erroring.
    let results = db.search_text("alpha beta", Some(5), None).await.unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn empty_corpus_returns_empty_results_without_panicking() {
    let tmp = tempfile::tempdir().unwrap();
    let db = open_with_dim(&tmp, 32).await;

    assert!(db.search_text("anything", Some(5), None).await.unwrap().is_empty());
    assert!(db.search_vector(&vec![0.1; 32], Some(5), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn reset_then_search_returns_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let db = open_with_dim(&tmp, 32).await;

    db.add("one".to_string(), None).await.unwrap();
    db.add("two".to_string(), None).await.unwrap();
    db.reset().await.unwrap();

    assert_eq!(db.count().await.unwrap(), 0);
    assert!(db.search_text("one", Some(5), None).await.unwrap().is_empty());
}
