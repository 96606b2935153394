use thiserror::Error;

/// Typed failure domains for the database core (spec §7).
///
/// Storage and embedder failures propagate unchanged, wrapped in one of these
/// variants; the facade never panics on expected error inputs.
#[derive(Debug, Error)]
pub enum VecturaError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("load failed: {reason}")]
    LoadFailed { reason: String },

    #[error("save failed: {reason}")]
    SaveFailed { reason: String },

    #[error("feature unavailable: {0}")]
    Unavailable(String),

    #[error("embedding failed: {0}")]
    Embedder(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for VecturaError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        VecturaError::Embedder(err.to_string())
    }
}

pub type VecturaResult<T> = Result<T, VecturaError>;

impl VecturaError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        VecturaError::InvalidInput(msg.into())
    }

    pub fn not_found(id: impl std::fmt::Display) -> Self {
        VecturaError::NotFound(id.to_string())
    }

    pub fn load_failed(reason: impl Into<String>) -> Self {
        VecturaError::LoadFailed { reason: reason.into() }
    }

    pub fn save_failed(reason: impl Into<String>) -> Self {
        VecturaError::SaveFailed { reason: reason.into() }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        VecturaError::Unavailable(msg.into())
    }
}
