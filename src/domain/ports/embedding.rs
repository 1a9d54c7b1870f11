//! Embedding provider port.
//!
//! Maps chunk or query text to fixed-length numeric vectors. Implementations
//! are external collaborators (HTTP APIs) or deterministic offline stand-ins.

use async_trait::async_trait;

use crate::domain::errors::EngineResult;

/// A single embedding request item.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    /// Client-side correlation ID.
    pub id: String,
    /// Text to embed.
    pub text: String,
}

/// A single embedding result.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// Correlation ID matching the input.
    pub id: String,
    pub vector: Vec<f32>,
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name (e.g. "openai", "deterministic").
    fn name(&self) -> &'static str;

    /// Model identifier. Stored with each vector for staleness detection.
    fn model_id(&self) -> &str;

    /// Embedding dimension for this provider/model.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>>;

    /// Embed multiple texts. Implementations chunk internally when the
    /// provider has per-request limits; output order matches input order.
    async fn embed_batch(&self, inputs: &[EmbeddingInput]) -> EngineResult<Vec<EmbeddingOutput>>;
}
