//! The embedding trait consumed by knowledge storage backends.

use async_trait::async_trait;

use super::errors::KnowledgeError;

/// Turns texts into embedding vectors, one per input.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text. The output length equals the input length.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError>;
}
