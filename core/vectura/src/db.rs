use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::OnceCell;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cache::DocumentCache;
use crate::config::{Config, MemoryStrategy};
use crate::document::Document;
use crate::embedder::Embedder;
use crate::error::{VecturaError, VecturaResult};
use crate::index::Bm25Index;
use crate::math::normalize;
use crate::search::{fuse, search_full_memory, search_indexed};
use crate::storage::{FileStorage, IndexedStorage, Storage};

/// A concrete storage backend, chosen at `Database::open` time.
///
/// `IndexedStorage` is a supertrait of `Storage`, so `Indexed`'s inner
/// `Arc<dyn IndexedStorage>` already answers every `Storage` method call —
/// no upcast or duplicate `Arc` is needed (spec §4.6/§4.8's "composition,
/// not subclassing").
pub enum StorageBackend {
    Basic(Arc<dyn Storage>),
    Indexed(Arc<dyn IndexedStorage>),
}

impl StorageBackend {
    async fn prepare(&self) -> VecturaResult<()> {
        match self {
            StorageBackend::Basic(s) => s.prepare().await,
            StorageBackend::Indexed(s) => s.prepare().await,
        }
    }

    async fn load_all(&self) -> VecturaResult<Vec<Document>> {
        match self {
            StorageBackend::Basic(s) => s.load_all().await,
            StorageBackend::Indexed(s) => s.load_all().await,
        }
    }

    async fn save(&self, doc: &Document) -> VecturaResult<()> {
        match self {
            StorageBackend::Basic(s) => s.save(doc).await,
            StorageBackend::Indexed(s) => s.save(doc).await,
        }
    }

    async fn delete(&self, id: &Uuid) -> VecturaResult<()> {
        match self {
            StorageBackend::Basic(s) => s.delete(id).await,
            StorageBackend::Indexed(s) => s.delete(id).await,
        }
    }

    async fn count(&self) -> VecturaResult<usize> {
        match self {
            StorageBackend::Basic(s) => s.count().await,
            StorageBackend::Indexed(s) => s.count().await,
        }
    }

    async fn save_batch(&self, docs: &[Document]) -> VecturaResult<()> {
        match self {
            StorageBackend::Basic(s) => s.save_batch(docs).await,
            StorageBackend::Indexed(s) => s.save_batch(docs).await,
        }
    }

    fn indexed(&self) -> Option<Arc<dyn IndexedStorage>> {
        match self {
            StorageBackend::Basic(_) => None,
            StorageBackend::Indexed(s) => Some(s.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MemoryMode {
    FullMemory,
    Indexed { mult: usize, batch: usize, max_conc: usize },
}

struct State {
    cache: DocumentCache,
    bm25: Bm25Index,
}

/// The embeddable database facade (C8, spec §4.8). All public operations are
/// serialized through a single internal mutex (spec §5) — the facade is the
/// one mutator, even though search fans out internally for batch I/O and the
/// hybrid planner's concurrent dispatch.
pub struct Database {
    config: Config,
    embedder: Arc<dyn Embedder>,
    storage: StorageBackend,
    mode: MemoryMode,
    /// Resolved lazily from the embedder's reported dimension or the first
    /// accepted embedding, whichever comes first (spec §4.8); immutable
    /// thereafter.
    dimension: OnceCell<usize>,
    state: Mutex<State>,
}

impl Database {
    /// Opens (or creates) a database. Picks the default file-backed storage
    /// under the platform document directory when `storage` is `None`.
    pub async fn open(
        config: Config,
        embedder: Arc<dyn Embedder>,
        storage: Option<StorageBackend>,
    ) -> VecturaResult<Self> {
        config.validate()?;

        let storage = match storage {
            Some(s) => s,
            None => StorageBackend::Basic(Arc::new(FileStorage::new(
                default_storage_dir(&config)?,
                config.max_concurrent_file_ops,
            ))),
        };
        storage.prepare().await?;

        let mode = match config.memory_strategy {
            MemoryStrategy::FullMemory => MemoryMode::FullMemory,
            MemoryStrategy::Indexed { mult, batch, max_conc } => {
                if storage.indexed().is_some() {
                    MemoryMode::Indexed { mult, batch, max_conc }
                } else {
                    tracing::info!(
                        "indexed memory strategy requested but storage does not implement IndexedStorage; using full-memory mode"
                    );
                    MemoryMode::FullMemory
                }
            }
            MemoryStrategy::Automatic { threshold, mult, batch, max_conc } => {
                let qualifies = match storage.indexed() {
                    Some(_) => storage.count().await? >= threshold,
                    None => false,
                };
                if qualifies {
                    MemoryMode::Indexed { mult, batch, max_conc }
                } else {
                    MemoryMode::FullMemory
                }
            }
        };

        let dimension = OnceCell::new();
        if let Some(d) = config.dimension {
            let _ = dimension.set(d);
        }

        let persisted = storage.load_all().await?;
        for doc in &persisted {
            let expected = *dimension.get_or_init(|| doc.embedding.len());
            if doc.embedding.len() != expected {
                return Err(VecturaError::DimensionMismatch {
                    expected,
                    actual: doc.embedding.len(),
                });
            }
        }

        let bm25 = Bm25Index::new(
            persisted.iter().map(|d| (d.id, d.text.clone())),
            config.search_defaults.bm25,
        );

        let cache = match mode {
            MemoryMode::FullMemory => DocumentCache::from_documents(persisted),
            MemoryMode::Indexed { .. } => DocumentCache::new(),
        };

        Ok(Self {
            config,
            embedder,
            storage,
            mode,
            dimension,
            state: Mutex::new(State { cache, bm25 }),
        })
    }

    fn detect_or_validate_dimension(&self, len: usize) -> VecturaResult<usize> {
        let expected = *self.dimension.get_or_init(|| len);
        if expected != len {
            return Err(VecturaError::DimensionMismatch { expected, actual: len });
        }
        Ok(expected)
    }

    async fn embed_validated(&self, text: &str) -> VecturaResult<Vec<f32>> {
        let embedding = self.embedder.embed(text).await?;
        self.detect_or_validate_dimension(embedding.len())?;
        Ok(embedding)
    }

    /// Validates text, embeds it, persists first, then updates the cache and
    /// BM25 index (spec §5's persistence-before-cache commit rule).
    pub async fn add(&self, text: String, id: Option<Uuid>) -> VecturaResult<Uuid> {
        Document::validate_text_len(&text)?;
        let embedding = self.embed_validated(&text).await?;
        normalize(&embedding).map_err(|e| {
            VecturaError::invalid(format!("embedding norm {} is below the minimum of 1e-10", e.0))
        })?;

        let id = id.unwrap_or_else(Uuid::new_v4);
        let doc = Document::new(id, text, embedding, Utc::now());

        self.storage.save(&doc).await?;

        let mut state = self.state.lock().await;
        state.bm25.insert_or_update(doc.id, &doc.text);
        state.cache.put(doc.clone());
        Ok(doc.id)
    }

    /// Batched `add`. If `ids` is provided its length must equal `texts`'.
    pub async fn add_batch(
        &self,
        texts: Vec<String>,
        ids: Option<Vec<Uuid>>,
    ) -> VecturaResult<Vec<Uuid>> {
        if let Some(ids) = &ids {
            if ids.len() != texts.len() {
                return Err(VecturaError::invalid(
                    "ids length must equal texts length in add_batch",
                ));
            }
        }

        for text in &texts {
            Document::validate_text_len(text)?;
        }

        let mut docs = Vec::with_capacity(texts.len());
        for (i, text) in texts.into_iter().enumerate() {
            let embedding = self.embed_validated(&text).await?;
            normalize(&embedding).map_err(|e| {
                VecturaError::invalid(format!(
                    "embedding norm {} is below the minimum of 1e-10",
                    e.0
                ))
            })?;
            let id = ids.as_ref().map(|ids| ids[i]).unwrap_or_else(Uuid::new_v4);
            docs.push(Document::new(id, text, embedding, Utc::now()));
        }

        self.storage.save_batch(&docs).await?;

        let mut state = self.state.lock().await;
        let out_ids: Vec<Uuid> = docs.iter().map(|d| d.id).collect();
        for doc in docs {
            state.bm25.insert_or_update(doc.id, &doc.text);
            state.cache.put(doc);
        }
        Ok(out_ids)
    }

    /// Hybrid search: dispatches the vector and BM25 branches concurrently
    /// and fuses their results (spec §4.5, §5).
    pub async fn search_text(
        &self,
        text: &str,
        top_k: Option<usize>,
        threshold: Option<f32>,
    ) -> VecturaResult<Vec<(Uuid, f32)>> {
        let top_k = top_k.unwrap_or(self.config.search_defaults.top_k);
        if top_k == 0 {
            return Err(VecturaError::invalid("top_k must be >= 1"));
        }
        self.validate_threshold(threshold)?;

        let embedding = self.embed_validated(text).await?;

        let (vector_results, bm25_results) = {
            let inflated = top_k.saturating_mul(2);
            let vector_fut = self.search_vector_raw(&embedding, inflated, None);
            let bm25_fut = async {
                let state = self.state.lock().await;
                let n = state.bm25.len();
                Ok::<_, VecturaError>(state.bm25.search(text, inflated.min(n)))
            };
            tokio::try_join!(vector_fut, bm25_fut)?
        };

        let fusion_weight = self.config.search_defaults.fusion_weight;
        let norm_factor = self.config.search_defaults.bm25_norm_factor;
        Ok(fuse(&vector_results, &bm25_results, fusion_weight, norm_factor, threshold, top_k))
    }

    /// Pure vector search against a caller-supplied (not-yet-normalized)
    /// query embedding.
    pub async fn search_vector(
        &self,
        vector: &[f32],
        top_k: Option<usize>,
        threshold: Option<f32>,
    ) -> VecturaResult<Vec<(Uuid, f32)>> {
        let top_k = top_k.unwrap_or(self.config.search_defaults.top_k);
        if top_k == 0 {
            return Err(VecturaError::invalid("top_k must be >= 1"));
        }
        self.validate_threshold(threshold)?;
        self.detect_or_validate_dimension(vector.len())?;
        self.search_vector_raw(vector, top_k, threshold).await
    }

    async fn search_vector_raw(
        &self,
        vector: &[f32],
        top_k: usize,
        threshold: Option<f32>,
    ) -> VecturaResult<Vec<(Uuid, f32)>> {
        let query_normalized = normalize(vector)
            .map_err(|e| VecturaError::invalid(format!("query norm {} is below the minimum of 1e-10", e.0)))?;

        match self.mode {
            MemoryMode::FullMemory => {
                let state = self.state.lock().await;
                let corpus = state.cache.normalized_corpus();
                Ok(search_full_memory(&corpus, &query_normalized, top_k, threshold))
            }
            MemoryMode::Indexed { mult, batch, max_conc } => {
                let storage = self
                    .storage
                    .indexed()
                    .expect("Indexed mode is only selected when storage implements IndexedStorage");
                search_indexed(&storage, &query_normalized, top_k, threshold, mult, batch, max_conc).await
            }
        }
    }

    fn validate_threshold(&self, threshold: Option<f32>) -> VecturaResult<()> {
        if let Some(t) = threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(VecturaError::invalid("threshold must be in [0, 1]"));
            }
        }
        Ok(())
    }

    /// Fetches the old document (cache, then indexed storage, then a full
    /// load as a last resort) to preserve its creation timestamp, embeds the
    /// new text, persists, then updates the cache and BM25 index.
    pub async fn update(&self, id: Uuid, new_text: String) -> VecturaResult<()> {
        Document::validate_text_len(&new_text)?;

        let existing = self.fetch_existing(&id).await?;
        let Some(existing) = existing else {
            return Err(VecturaError::not_found(id));
        };

        let embedding = self.embed_validated(&new_text).await?;
        normalize(&embedding).map_err(|e| {
            VecturaError::invalid(format!("embedding norm {} is below the minimum of 1e-10", e.0))
        })?;

        let doc = Document::new(id, new_text, embedding, existing.created_at);
        self.storage.update(&doc).await?;

        let mut state = self.state.lock().await;
        state.bm25.insert_or_update(doc.id, &doc.text);
        state.cache.put(doc);
        Ok(())
    }

    async fn fetch_existing(&self, id: &Uuid) -> VecturaResult<Option<Document>> {
        {
            let state = self.state.lock().await;
            if let Some(doc) = state.cache.get(id) {
                return Ok(Some(doc.clone()));
            }
        }
        if let Some(indexed) = self.storage.indexed() {
            let mut found = indexed.load_by_ids(std::slice::from_ref(id)).await?;
            if let Some(doc) = found.remove(id) {
                return Ok(Some(doc));
            }
        }
        let all = self.storage.load_all().await?;
        Ok(all.into_iter().find(|d| &d.id == id))
    }

    /// Deletes a set of documents: subtracts BM25 contributions first, then
    /// removes from cache, then deletes from storage (spec §4.8).
    pub async fn delete(&self, ids: &[Uuid]) -> VecturaResult<()> {
        {
            let mut state = self.state.lock().await;
            for id in ids {
                state.bm25.remove(id);
                state.cache.remove(id);
            }
        }
        for id in ids {
            self.storage.delete(id).await?;
        }
        Ok(())
    }

    /// Clears the entire database. Resolves the full set of persisted IDs
    /// via storage before deleting, not merely the in-memory cache.
    pub async fn reset(&self) -> VecturaResult<()> {
        let all = self.storage.load_all().await?;
        let ids: Vec<Uuid> = all.iter().map(|d| d.id).collect();

        {
            let mut state = self.state.lock().await;
            for id in &ids {
                state.bm25.remove(id);
            }
            state.cache.clear();
        }
        for id in &ids {
            self.storage.delete(id).await?;
        }
        Ok(())
    }

    /// Total persisted document count.
    pub async fn count(&self) -> VecturaResult<usize> {
        self.storage.count().await
    }

    /// In full-memory mode, every cached document. In indexed mode the cache
    /// is intentionally not maintained, so this returns an empty vector
    /// rather than forcing a full scan.
    pub async fn list(&self) -> Vec<Document> {
        let state = self.state.lock().await;
        state.cache.values().cloned().collect()
    }
}

fn default_storage_dir(config: &Config) -> VecturaResult<PathBuf> {
    let root = match &config.storage_dir {
        Some(dir) => PathBuf::from(dir),
        None => dirs::document_dir()
            .ok_or_else(|| VecturaError::unavailable("no per-user document directory available on this platform"))?
            .join("VecturaKit"),
    };
    Ok(root.join(&config.name))
}
