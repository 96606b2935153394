//! Embeddable, on-device vector database for semantic and hybrid retrieval
//! over text documents: cosine similarity search, BM25 lexical search, and
//! a hybrid fusion planner, backed by a pluggable storage capability.

mod cache;
mod concurrency;
mod config;
mod db;
mod document;
mod embedder;
mod error;
mod index;
mod math;
mod search;
mod storage;
mod text;

pub use config::{Bm25Params, Config, MemoryStrategy, SearchDefaults};
pub use db::{Database, StorageBackend};
pub use document::Document;
pub use embedder::Embedder;
pub use error::{VecturaError, VecturaResult};
pub use index::Bm25Index;
pub use math::{cosine_batch, l2_norm, normalize, ZeroNorm};
pub use storage::{FileStorage, IndexedStorage, Storage};
pub use text::tokenize;
