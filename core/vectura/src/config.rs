use serde::{Deserialize, Serialize};

use crate::error::{VecturaError, VecturaResult};

/// Reserved database names that collide with filesystem conventions.
const RESERVED_NAMES: &[&str] = &[".", "..", "con", "prn", "aux", "nul"];

/// BM25 tuning parameters (spec §4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Params {
    fn validate(&self) -> VecturaResult<()> {
        if self.k1 <= 0.0 {
            return Err(VecturaError::invalid("bm25 k1 must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(VecturaError::invalid("bm25 b must be in [0, 1]"));
        }
        Ok(())
    }
}

/// Defaults applied to `search_text`/`search_vector` when the caller omits
/// an explicit top-K, threshold, or fusion weight (spec §3/§4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchDefaults {
    pub top_k: usize,
    pub threshold: Option<f32>,
    pub bm25: Bm25Params,
    /// Fusion weight for the vector side, `w` in spec §4.5. `1 - w` weighs BM25.
    pub fusion_weight: f32,
    /// Divisor used to normalize a raw BM25 score into `[0, 1]` (spec §4.5, §9.b).
    pub bm25_norm_factor: f32,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            top_k: 10,
            threshold: None,
            bm25: Bm25Params::default(),
            fusion_weight: 0.5,
            bm25_norm_factor: 10.0,
        }
    }
}

impl SearchDefaults {
    fn validate(&self) -> VecturaResult<()> {
        if self.top_k == 0 {
            return Err(VecturaError::invalid("default top_k must be >= 1"));
        }
        if let Some(t) = self.threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(VecturaError::invalid("default threshold must be in [0, 1]"));
            }
        }
        if !(0.0..=1.0).contains(&self.fusion_weight) {
            return Err(VecturaError::invalid("fusion weight must be in [0, 1]"));
        }
        if self.bm25_norm_factor <= 0.0 {
            return Err(VecturaError::invalid("bm25 norm factor must be > 0"));
        }
        self.bm25.validate()
    }
}

/// Memory/indexing strategy, selected at `Database::open` time (spec §3/§4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum MemoryStrategy {
    /// All embeddings resident and pre-normalized in RAM.
    FullMemory,
    /// Two-stage retrieval via `IndexedStorage`, falling back to full-memory
    /// when the storage capability doesn't implement it.
    Indexed { mult: usize, batch: usize, max_conc: usize },
    /// Like `Indexed`, but only engaged once `storage.count() >= threshold`.
    Automatic { threshold: usize, mult: usize, batch: usize, max_conc: usize },
}

impl Default for MemoryStrategy {
    fn default() -> Self {
        MemoryStrategy::FullMemory
    }
}

impl MemoryStrategy {
    fn validate(&self) -> VecturaResult<()> {
        match self {
            MemoryStrategy::FullMemory => Ok(()),
            MemoryStrategy::Indexed { mult, batch, max_conc }
            | MemoryStrategy::Automatic { mult, batch, max_conc, .. } => {
                if *mult == 0 || *batch == 0 || *max_conc == 0 {
                    return Err(VecturaError::invalid(
                        "indexed strategy requires mult > 0, batch > 0, and maxConc > 0",
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Database-wide configuration (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    pub storage_dir: Option<String>,
    pub dimension: Option<usize>,
    pub search_defaults: SearchDefaults,
    pub memory_strategy: MemoryStrategy,
    /// Bound on concurrent file operations for the default file-backed
    /// storage and the facade's batch-load window (spec §4.7).
    pub max_concurrent_file_ops: usize,
}

impl Config {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage_dir: None,
            dimension: None,
            search_defaults: SearchDefaults::default(),
            memory_strategy: MemoryStrategy::default(),
            max_concurrent_file_ops: 50,
        }
    }

    pub fn validate(&self) -> VecturaResult<()> {
        if self.name.is_empty() {
            return Err(VecturaError::invalid("database name must not be empty"));
        }
        if self.name.len() > 255 {
            return Err(VecturaError::invalid("database name must be <= 255 characters"));
        }
        if self.name.contains('/') || self.name.contains('\\') {
            return Err(VecturaError::invalid("database name must not contain path separators"));
        }
        if RESERVED_NAMES.contains(&self.name.to_lowercase().as_str()) {
            return Err(VecturaError::invalid(format!("'{}' is a reserved database name", self.name)));
        }
        if let Some(d) = self.dimension {
            if d == 0 || d > 100_000 {
                return Err(VecturaError::invalid("dimension must be in 1..=100000"));
            }
        }
        if self.max_concurrent_file_ops == 0 {
            return Err(VecturaError::invalid("max_concurrent_file_ops must be > 0"));
        }
        self.search_defaults.validate()?;
        self.memory_strategy.validate()
    }
}
