//! In-memory vector store.
//!
//! All collections live behind one `RwLock`, so writes are serialized and
//! reads see a consistent snapshot. Records keep their insertion order,
//! which gives the stable tie-breaking the query contract requires.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::EngineResult;
use crate::domain::models::{CollectionConfig, RetrievalResult, ScoredChunk};
use crate::domain::ports::{VectorRecord, VectorStore};

/// In-process store, lost at shutdown. The default for tests and ephemeral
/// knowledge scopes.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, collection: &CollectionConfig, items: Vec<VectorRecord>) -> EngineResult<usize> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.namespace_key()).or_default();

        let written = items.len();
        for item in items {
            // Replace an existing row with the same fingerprint, keeping
            // its original position so insertion order stays stable.
            if let Some(existing) = records
                .iter_mut()
                .find(|r| r.chunk.fingerprint == item.chunk.fingerprint)
            {
                *existing = item;
            } else {
                records.push(item);
            }
        }
        Ok(written)
    }

    async fn query(&self, collection: &CollectionConfig, vector: &[f32], k: usize) -> EngineResult<RetrievalResult> {
        let collections = self.collections.read().await;
        let Some(records) = collections.get(&collection.namespace_key()) else {
            return Ok(RetrievalResult::empty());
        };

        let mut hits: Vec<ScoredChunk> = records
            .iter()
            .map(|record| ScoredChunk {
                chunk: record.chunk.clone(),
                score: collection.metric.score(vector, &record.vector),
            })
            .collect();

        // Stable sort keeps insertion order for equal scores.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(RetrievalResult { hits })
    }

    async fn delete_collection(&self, collection: &CollectionConfig) -> EngineResult<()> {
        self.collections
            .write()
            .await
            .remove(&collection.namespace_key());
        Ok(())
    }

    async fn fingerprints(&self, collection: &CollectionConfig, model_id: &str) -> EngineResult<HashSet<String>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection.namespace_key())
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.model_id == model_id)
                    .map(|r| r.chunk.fingerprint.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, collection: &CollectionConfig) -> EngineResult<usize> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection.namespace_key())
            .map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CharSpan, Chunk, DistanceMetric};
    use std::sync::Arc;

    fn record(text: &str, vector: Vec<f32>, index: usize) -> VectorRecord {
        VectorRecord {
            chunk: Chunk::new("doc", index, text, CharSpan::new(0, text.len())),
            vector,
            model_id: "m1".to_string(),
        }
    }

    #[tokio::test]
    async fn query_orders_by_similarity_with_stable_ties() {
        let store = MemoryVectorStore::new();
        let collection = CollectionConfig::memory("kb").with_metric(DistanceMetric::Cosine);

        // Two identical vectors (tie) plus one orthogonal.
        store
            .upsert(
                &collection,
                vec![
                    record("tie-first", vec![1.0, 0.0], 0),
                    record("tie-second", vec![1.0, 0.0], 1),
                    record("orthogonal", vec![0.0, 1.0], 2),
                ],
            )
            .await
            .unwrap();

        let result = store.query(&collection, &[1.0, 0.0], 3).await.unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.is_ordered());
        // Insertion order preserved for the tied pair.
        assert_eq!(result.hits[0].chunk.text, "tie-first");
        assert_eq!(result.hits[1].chunk.text, "tie-second");
        assert_eq!(result.hits[2].chunk.text, "orthogonal");
    }

    #[tokio::test]
    async fn upsert_replaces_same_fingerprint() {
        let store = MemoryVectorStore::new();
        let collection = CollectionConfig::memory("kb");

        store
            .upsert(&collection, vec![record("same text", vec![1.0, 0.0], 0)])
            .await
            .unwrap();
        store
            .upsert(&collection, vec![record("same text", vec![0.0, 1.0], 0)])
            .await
            .unwrap();

        assert_eq!(store.count(&collection).await.unwrap(), 1);
        let result = store.query(&collection, &[0.0, 1.0], 1).await.unwrap();
        assert!((result.hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn missing_collection_queries_empty() {
        let store = MemoryVectorStore::new();
        let collection = CollectionConfig::memory("ghost");
        let result = store.query(&collection, &[1.0], 5).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(store.count(&collection).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_collection_drops_records() {
        let store = MemoryVectorStore::new();
        let collection = CollectionConfig::memory("kb");
        store
            .upsert(&collection, vec![record("text", vec![1.0], 0)])
            .await
            .unwrap();
        store.delete_collection(&collection).await.unwrap();
        assert_eq!(store.count(&collection).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fingerprints_are_scoped_to_model() {
        let store = MemoryVectorStore::new();
        let collection = CollectionConfig::memory("kb");
        let mut stale = record("old text", vec![1.0], 0);
        stale.model_id = "old-model".to_string();
        store.upsert(&collection, vec![stale]).await.unwrap();

        let current = store.fingerprints(&collection, "m1").await.unwrap();
        assert!(current.is_empty());
        let old = store.fingerprints(&collection, "old-model").await.unwrap();
        assert_eq!(old.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_upserts_and_queries_do_not_corrupt() {
        let store = Arc::new(MemoryVectorStore::new());
        let collection = CollectionConfig::memory("shared");

        let mut handles = Vec::new();
        for worker in 0..8 {
            let store = store.clone();
            let collection = collection.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..20 {
                    let text = format!("worker {worker} item {i}");
                    let len = text.len();
                    store
                        .upsert(
                            &collection,
                            vec![VectorRecord {
                                chunk: Chunk::new("doc", worker * 100 + i, text, CharSpan::new(0, len)),
                                vector: vec![worker as f32, i as f32],
                                model_id: "m1".to_string(),
                            }],
                        )
                        .await
                        .unwrap();
                    let _ = store.query(&collection, &[1.0, 1.0], 5).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count(&collection).await.unwrap(), 160);
    }
}
