//! Embedding provider adapters.

pub mod deterministic;
pub mod openai;

pub use deterministic::DeterministicEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;
