use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{VecturaError, VecturaResult};

/// Upper bound on stored text length (code units), per spec §3.
pub const MAX_TEXT_LEN: usize = 1_000_000;

/// Minimum L2 norm an embedding must have to be accepted at ingress (spec §3/§4.1).
pub const MIN_EMBEDDING_NORM: f32 = 1e-10;

/// A uniquely identified, immutable-at-rest record.
///
/// `embedding.len()` always equals the database-wide dimension `D` once a
/// document has been persisted; construction-time validation is the
/// caller's (the facade's) responsibility, not this type's.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: Uuid, text: String, embedding: Vec<f32>, created_at: DateTime<Utc>) -> Self {
        Self { id, text, embedding, created_at }
    }

    pub fn validate_text_len(text: &str) -> VecturaResult<()> {
        if text.chars().count() > MAX_TEXT_LEN {
            return Err(VecturaError::invalid(format!(
                "text length {} exceeds maximum of {}",
                text.chars().count(),
                MAX_TEXT_LEN
            )));
        }
        Ok(())
    }
}
