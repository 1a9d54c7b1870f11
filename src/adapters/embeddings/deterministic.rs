//! Deterministic offline embedding provider.
//!
//! Derives a stable unit vector from the SHA-256 of the input text. Equal
//! texts always map to equal vectors, so retrieval tests get reproducible
//! rankings without a network collaborator. Not semantically meaningful.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::errors::EngineResult;
use crate::domain::ports::{EmbeddingInput, EmbeddingOutput, EmbeddingProvider};

/// Hash-derived embedding provider for tests and offline runs.
#[derive(Debug, Clone)]
pub struct DeterministicEmbeddingProvider {
    dimension: usize,
    model_id: String,
}

impl DeterministicEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self::with_model(dimension, "deterministic-v1")
    }

    pub fn with_model(dimension: usize, model_id: impl Into<String>) -> Self {
        Self {
            dimension: dimension.max(1),
            model_id: model_id.into(),
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        // Stretch the 32-byte digest across the dimension by re-hashing
        // with a counter, then normalize to a unit vector.
        let mut values = Vec::with_capacity(self.dimension);
        let mut counter = 0u32;
        while values.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for byte in digest {
                if values.len() == self.dimension {
                    break;
                }
                values.push(f32::from(byte) / 255.0 - 0.5);
            }
            counter += 1;
        }

        let magnitude: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in &mut values {
                *v /= magnitude;
            }
        }
        values
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbeddingProvider {
    fn name(&self) -> &'static str {
        "deterministic"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, inputs: &[EmbeddingInput]) -> EngineResult<Vec<EmbeddingOutput>> {
        Ok(inputs
            .iter()
            .map(|input| EmbeddingOutput {
                id: input.id.clone(),
                vector: self.vector_for(&input.text),
            })
            .collect())
    }
}
