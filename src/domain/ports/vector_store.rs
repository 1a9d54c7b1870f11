//! Vector store port - uniform interface over pluggable backends.
//!
//! Callers never depend on backend-specific query syntax. Query results are
//! ordered by similarity with insertion-order ties, so retrieval is
//! deterministic for identical inputs. Concurrent upserts and queries
//! against one collection must not corrupt state: backends either serialize
//! writes per collection or guarantee read-after-write consistency for a
//! single writer.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::errors::EngineResult;
use crate::domain::models::{Chunk, CollectionConfig, RetrievalResult};

/// One (vector, chunk, metadata) tuple to store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    /// Embedding model that produced the vector. Records with a stale
    /// model id are invisible to dedup and replaced on re-ingest.
    pub model_id: String,
}

/// Backend-agnostic vector store contract.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records in a collection. A record replaces any
    /// existing row with the same chunk fingerprint. Returns the number of
    /// rows written.
    async fn upsert(&self, collection: &CollectionConfig, items: Vec<VectorRecord>) -> EngineResult<usize>;

    /// Nearest-neighbor query. A missing or empty collection yields an
    /// empty result, not an error.
    async fn query(&self, collection: &CollectionConfig, vector: &[f32], k: usize) -> EngineResult<RetrievalResult>;

    /// Drop a collection and all of its records.
    async fn delete_collection(&self, collection: &CollectionConfig) -> EngineResult<()>;

    /// Fingerprints already stored for the given embedding model. Used by
    /// the ingestion pipeline for idempotent re-ingestion.
    async fn fingerprints(&self, collection: &CollectionConfig, model_id: &str) -> EngineResult<HashSet<String>>;

    /// Number of records in a collection. Zero for missing collections.
    async fn count(&self, collection: &CollectionConfig) -> EngineResult<usize>;
}
