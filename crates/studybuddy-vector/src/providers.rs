use async_trait::async_trait;
use studybuddy_core::Result;

/// Unified trait for remote embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text; one request, no retries
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning vectors in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn embedding_dimension(&self) -> usize;

    fn provider_name(&self) -> &str;

    /// Check if provider is reachable with the configured credentials
    async fn is_available(&self) -> bool;
}
