//! OpenAI embedding provider adapter.
//!
//! Talks to the `/v1/embeddings` endpoint and is compatible with any
//! OpenAI-shaped embedding API. The API key is read from the environment
//! once at construction; absence is a configuration error, not a per-call
//! retry condition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::EmbeddingConfig;
use crate::domain::ports::{EmbeddingInput, EmbeddingOutput, EmbeddingProvider};

/// Environment variable holding the API key.
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI-compatible embedding provider.
pub struct OpenAiEmbeddingProvider {
    config: EmbeddingConfig,
    api_key: String,
    client: Arc<reqwest::Client>,
}

impl OpenAiEmbeddingProvider {
    /// Build a provider, reading the API key from the environment.
    pub fn from_env(config: EmbeddingConfig, timeout_secs: u64) -> EngineResult<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            EngineError::Configuration(format!(
                "{API_KEY_ENV} is not set; the embedding collaborator requires it at startup"
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            api_key,
            client: Arc::new(client),
        })
    }

    async fn call_embeddings_api(&self, texts: Vec<String>) -> EngineResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.config.base_url);
        let body = EmbeddingsRequest {
            model: self.config.model.clone(),
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::EmbeddingService(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(EngineError::EmbeddingService(format!(
                "embedding API returned {status}: {body}"
            )));
        }

        let result: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EngineError::EmbeddingService(format!("failed to parse response: {e}")))?;

        // Restore input order.
        let mut data = result.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        let mut vectors = self.call_embeddings_api(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EngineError::EmbeddingService("empty response for single input".to_string()))
    }

    async fn embed_batch(&self, inputs: &[EmbeddingInput]) -> EngineResult<Vec<EmbeddingOutput>> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(self.config.max_batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|i| i.text.clone()).collect();
            let vectors = self.call_embeddings_api(texts).await?;
            if vectors.len() != batch.len() {
                return Err(EngineError::EmbeddingService(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            outputs.extend(
                batch
                    .iter()
                    .zip(vectors)
                    .map(|(input, vector)| EmbeddingOutput { id: input.id.clone(), vector }),
            );
        }
        Ok(outputs)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}
