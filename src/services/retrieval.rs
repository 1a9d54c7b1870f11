//! Retrieval engine.
//!
//! Embeds a query string and delegates to the vector store. A missing or
//! empty collection yields an empty result, not an error: an agent with no
//! matching knowledge answers from its own reasoning instead of failing
//! the task.

use std::sync::Arc;

use tracing::debug;

use crate::domain::errors::EngineResult;
use crate::domain::models::{CollectionConfig, RetrievalResult};
use crate::domain::ports::{EmbeddingProvider, VectorStore};

/// Query → Embedding Client → Vector Store → top-k scored chunks.
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Top-k most similar chunks for a query, descending by score.
    pub async fn retrieve(
        &self,
        query_text: &str,
        collection: &CollectionConfig,
        k: usize,
    ) -> EngineResult<RetrievalResult> {
        if k == 0 || query_text.trim().is_empty() {
            return Ok(RetrievalResult::empty());
        }

        if self.store.count(collection).await? == 0 {
            debug!(
                collection = %collection.collection_name,
                "collection empty or missing, returning empty retrieval"
            );
            return Ok(RetrievalResult::empty());
        }

        let vector = self.embedder.embed(query_text).await?;
        let result = self.store.query(collection, &vector, k).await?;

        debug!(
            collection = %collection.collection_name,
            k,
            hits = result.len(),
            "retrieval complete"
        );
        Ok(result)
    }
}
