use async_trait::async_trait;

/// Embedding capability boundary (spec §6). Concrete models (BERT-family,
/// distilled static embedders, GPU-accelerated variants) are collaborators
/// consumed through this trait, not part of this crate.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The fixed length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed a single text. Errors are opaque and surfaced unchanged.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>>;

    /// Embed a batch. Default implementation calls `embed` sequentially;
    /// implementations with native batching should override.
    async fn embed_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, Box<dyn std::error::Error + Send + Sync>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
