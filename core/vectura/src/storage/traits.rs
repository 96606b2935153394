use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::document::Document;
use crate::error::VecturaResult;

/// Minimum storage capability (spec §4.6/§6).
///
/// Implementations are resolved by composition at `Database::open`, not by
/// subclassing (spec §9): dynamic dispatch (`Arc<dyn Storage>`) is the
/// expected shape, so hot inner loops (the cosine kernel, the tokenizer)
/// deliberately live outside this boundary.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Idempotent: ensures the backing location exists.
    async fn prepare(&self) -> VecturaResult<()>;

    /// Returns every persisted document. The default file-backed storage
    /// fails the whole call if any single document failed to load (spec §7);
    /// richer implementations may offer a lenient variant.
    async fn load_all(&self) -> VecturaResult<Vec<Document>>;

    /// Create or replace `doc` atomically.
    async fn save(&self, doc: &Document) -> VecturaResult<()>;

    /// Remove the document with the given id.
    async fn delete(&self, id: &Uuid) -> VecturaResult<()>;

    /// Equivalent to `save` by default; implementations may optimize.
    async fn update(&self, doc: &Document) -> VecturaResult<()> {
        self.save(doc).await
    }

    /// Total document count. Default implementation is `load_all().len()`;
    /// implementations backed by a native count should override this.
    async fn count(&self) -> VecturaResult<usize> {
        Ok(self.load_all().await?.len())
    }

    /// Default iterates `save` sequentially; the file-backed default
    /// overrides this for bounded concurrency (spec §4.7).
    async fn save_batch(&self, docs: &[Document]) -> VecturaResult<()> {
        for doc in docs {
            self.save(doc).await?;
        }
        Ok(())
    }
}

/// Optional extension implemented by storage back-ends that can serve as an
/// ANN-style candidate source for two-stage indexed search (spec §4.4/§4.6).
#[async_trait]
pub trait IndexedStorage: Storage {
    /// Pagination.
    async fn load_range(&self, offset: usize, limit: usize) -> VecturaResult<Vec<Document>>;

    /// Sparse fetch by id.
    async fn load_by_ids(&self, ids: &[Uuid]) -> VecturaResult<HashMap<Uuid, Document>>;

    /// Approximate candidate filter. `None` means "unsupported" (the engine
    /// falls back to full-memory mode); `Some(vec![])` is a valid "no
    /// candidates" answer — the two are distinct, per spec §9.c.
    async fn search_candidates(
        &self,
        query: &[f32],
        top_k: usize,
        prefilter_size: usize,
    ) -> VecturaResult<Option<Vec<Uuid>>>;
}
