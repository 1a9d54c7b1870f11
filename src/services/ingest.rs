//! Ingestion pipeline.
//!
//! Document → chunks → embeddings → vector store. Re-ingestion is
//! idempotent: chunks whose fingerprint is already stored for the active
//! embedding model are skipped. Embedding calls go through the bounded
//! retry policy; exhaustion surfaces as `EmbeddingService` so the caller
//! decides between aborting the knowledge load or continuing partial.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::retry::RetryPolicy;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{CollectionConfig, Document};
use crate::domain::ports::{EmbeddingInput, EmbeddingProvider, VectorRecord, VectorStore};
use crate::services::chunker::Chunker;
use crate::services::loader::DocumentLoader;

/// Outcome of one document ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks_total: usize,
    pub chunks_embedded: usize,
    pub chunks_skipped: usize,
}

/// Outcome of a multi-file knowledge load.
#[derive(Debug, Default)]
pub struct KnowledgeLoadReport {
    pub ingested: Vec<(String, IngestReport)>,
    /// Per-file ingestion failures; the load continued past these.
    pub failed: Vec<EngineError>,
}

/// Loader → Chunker → Embedding Client → Vector Store.
pub struct IngestionPipeline {
    loader: DocumentLoader,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    retry: RetryPolicy,
}

impl IngestionPipeline {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            loader: DocumentLoader::new(),
            chunker,
            embedder,
            store,
            retry,
        }
    }

    /// Ingest one already-loaded document into a collection.
    pub async fn ingest(&self, document: &Document, collection: &CollectionConfig) -> EngineResult<IngestReport> {
        let chunks = self.chunker.chunk(document);
        let model_id = self.embedder.model_id().to_string();

        // Fingerprints stored under the active model. Stale-model rows are
        // invisible here, so they get re-embedded and replaced.
        let existing = self.store.fingerprints(collection, &model_id).await?;

        let (fresh, skipped): (Vec<_>, Vec<_>) = chunks
            .into_iter()
            .partition(|c| !existing.contains(&c.fingerprint));

        let report = IngestReport {
            chunks_total: fresh.len() + skipped.len(),
            chunks_embedded: fresh.len(),
            chunks_skipped: skipped.len(),
        };

        if fresh.is_empty() {
            debug!(
                document = %document.source_path,
                collection = %collection.collection_name,
                "all chunks already ingested, nothing to embed"
            );
            return Ok(report);
        }

        let inputs: Vec<EmbeddingInput> = fresh
            .iter()
            .map(|c| EmbeddingInput { id: c.id.clone(), text: c.text.clone() })
            .collect();

        let outputs = self
            .retry
            .run(|| {
                let embedder = self.embedder.clone();
                let inputs = inputs.clone();
                async move { embedder.embed_batch(&inputs).await }
            })
            .await
            .map_err(|e| EngineError::EmbeddingService(e.to_string()))?;

        if outputs.len() != fresh.len() {
            return Err(EngineError::EmbeddingService(format!(
                "embedding batch returned {} vectors for {} inputs",
                outputs.len(),
                fresh.len()
            )));
        }

        let records: Vec<VectorRecord> = fresh
            .into_iter()
            .zip(outputs)
            .map(|(chunk, output)| VectorRecord {
                chunk,
                vector: output.vector,
                model_id: model_id.clone(),
            })
            .collect();

        let written = self.store.upsert(collection, records).await?;
        info!(
            document = %document.source_path,
            collection = %collection.collection_name,
            embedded = written,
            skipped = report.chunks_skipped,
            "document ingested"
        );

        Ok(report)
    }

    /// Ingest one source file from disk.
    pub async fn ingest_file(&self, path: &Path, collection: &CollectionConfig) -> EngineResult<IngestReport> {
        let document = self.loader.load(path)?;
        self.ingest(&document, collection).await
    }

    /// Ingest a set of knowledge files. Unreadable files are recorded and
    /// skipped; embedding-service exhaustion aborts the load.
    pub async fn load_knowledge(
        &self,
        paths: &[impl AsRef<Path>],
        collection: &CollectionConfig,
    ) -> EngineResult<KnowledgeLoadReport> {
        let mut report = KnowledgeLoadReport::default();

        for path in paths {
            let path = path.as_ref();
            let document = match self.loader.load(path) {
                Ok(doc) => doc,
                Err(e @ EngineError::Ingestion { .. }) => {
                    report.failed.push(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let ingest = self.ingest(&document, collection).await?;
            report.ingested.push((document.source_path.clone(), ingest));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::embeddings::DeterministicEmbeddingProvider;
    use crate::adapters::vector::MemoryVectorStore;
    use crate::domain::models::MediaType;

    fn pipeline(store: Arc<dyn VectorStore>) -> IngestionPipeline {
        IngestionPipeline::new(
            Chunker::new(),
            Arc::new(DeterministicEmbeddingProvider::new(64)),
            store,
            RetryPolicy::no_retries(),
        )
    }

    fn document() -> Document {
        Document::new(
            "kb.txt",
            MediaType::PlainText,
            "Weaver orchestrates agents. ".repeat(200),
        )
    }

    #[tokio::test]
    async fn reingestion_is_idempotent() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(store.clone());
        let collection = CollectionConfig::memory("kb1");
        let doc = document();

        let first = pipeline.ingest(&doc, &collection).await.unwrap();
        assert!(first.chunks_embedded > 0);
        assert_eq!(first.chunks_skipped, 0);

        let count_after_first = store.count(&collection).await.unwrap();

        let second = pipeline.ingest(&doc, &collection).await.unwrap();
        assert_eq!(second.chunks_embedded, 0);
        assert_eq!(second.chunks_skipped, first.chunks_embedded);
        assert_eq!(store.count(&collection).await.unwrap(), count_after_first);
    }

    #[tokio::test]
    async fn model_change_invalidates_stored_vectors() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let collection = CollectionConfig::memory("kb1");
        let doc = document();

        let old = IngestionPipeline::new(
            Chunker::new(),
            Arc::new(DeterministicEmbeddingProvider::with_model(64, "embed-v1")),
            store.clone(),
            RetryPolicy::no_retries(),
        );
        let first = old.ingest(&doc, &collection).await.unwrap();
        assert!(first.chunks_embedded > 0);

        let new = IngestionPipeline::new(
            Chunker::new(),
            Arc::new(DeterministicEmbeddingProvider::with_model(64, "embed-v2")),
            store.clone(),
            RetryPolicy::no_retries(),
        );
        let second = new.ingest(&doc, &collection).await.unwrap();
        // Stale-model vectors are not visible to dedup.
        assert_eq!(second.chunks_embedded, first.chunks_embedded);
        assert_eq!(second.chunks_skipped, 0);
    }

    #[tokio::test]
    async fn knowledge_load_reports_per_file_failures() {
        use std::io::Write;
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("good.txt");
        std::fs::File::create(&good)
            .unwrap()
            .write_all(b"some knowledge content")
            .unwrap();
        let missing = dir.path().join("missing.txt");

        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(store);
        let collection = CollectionConfig::memory("kb1");

        let report = pipeline
            .load_knowledge(&[good, missing], &collection)
            .await
            .unwrap();
        assert_eq!(report.ingested.len(), 1);
        assert_eq!(report.failed.len(), 1);
    }
}
