//! sqlite-backed vector store.
//!
//! One database file per store; collections are rows tagged with a
//! collection name. Vectors are stored as little-endian f32 BLOBs and
//! scored in Rust with a full scan per query. An autoincrement sequence
//! column preserves insertion order for stable tie-breaking, and a unique
//! `(collection, fingerprint)` index makes upserts idempotent. sqlite
//! serializes writers, which gives the single-writer read-after-write
//! guarantee the store contract asks for.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{CharSpan, Chunk, CollectionConfig, RetrievalResult, ScoredChunk};
use crate::domain::ports::{VectorRecord, VectorStore};

/// sqlite vector store adapter.
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open (or create) the database file and ensure the schema.
    pub async fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);

        // An in-memory database is per-connection; more than one pool
        // connection would see different databases.
        let in_memory = path.as_ref().as_os_str() == ":memory:";
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await
            .map_err(|e| EngineError::VectorStore {
                collection: "<open>".to_string(),
                reason: e.to_string(),
            })?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS vector_records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                sequence_index INTEGER NOT NULL,
                chunk_text TEXT NOT NULL,
                span_start INTEGER NOT NULL,
                span_end INTEGER NOT NULL,
                model_id TEXT NOT NULL,
                embedding BLOB NOT NULL,
                UNIQUE(collection, fingerprint)
            )
            ",
        )
        .execute(&pool)
        .await
        .map_err(|e| EngineError::VectorStore {
            collection: "<schema>".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { pool })
    }

    /// In-memory sqlite database, for tests.
    pub async fn open_in_memory() -> EngineResult<Self> {
        Self::open(Path::new(":memory:")).await
    }

    fn store_error(collection: &CollectionConfig, err: sqlx::Error) -> EngineError {
        EngineError::VectorStore {
            collection: collection.collection_name.clone(),
            reason: err.to_string(),
        }
    }

    /// Serialize an embedding vector to little-endian bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize an embedding vector from little-endian bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> EngineResult<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return Err(EngineError::Serialization(
                "invalid embedding blob length".to_string(),
            ));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, collection: &CollectionConfig, items: Vec<VectorRecord>) -> EngineResult<usize> {
        let mut written = 0usize;
        for item in items {
            sqlx::query(
                r"
                INSERT INTO vector_records
                    (collection, fingerprint, chunk_id, document_id, sequence_index,
                     chunk_text, span_start, span_end, model_id, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, fingerprint) DO UPDATE SET
                    chunk_id = excluded.chunk_id,
                    document_id = excluded.document_id,
                    sequence_index = excluded.sequence_index,
                    chunk_text = excluded.chunk_text,
                    span_start = excluded.span_start,
                    span_end = excluded.span_end,
                    model_id = excluded.model_id,
                    embedding = excluded.embedding
                ",
            )
            .bind(&collection.collection_name)
            .bind(&item.chunk.fingerprint)
            .bind(&item.chunk.id)
            .bind(&item.chunk.document_id)
            .bind(item.chunk.sequence_index as i64)
            .bind(&item.chunk.text)
            .bind(item.chunk.span.start as i64)
            .bind(item.chunk.span.end as i64)
            .bind(&item.model_id)
            .bind(Self::embedding_to_bytes(&item.vector))
            .execute(&self.pool)
            .await
            .map_err(|e| Self::store_error(collection, e))?;
            written += 1;
        }
        Ok(written)
    }

    async fn query(&self, collection: &CollectionConfig, vector: &[f32], k: usize) -> EngineResult<RetrievalResult> {
        let rows = sqlx::query(
            r"
            SELECT chunk_id, document_id, sequence_index, chunk_text,
                   span_start, span_end, fingerprint, embedding
            FROM vector_records
            WHERE collection = ?
            ORDER BY seq ASC
            ",
        )
        .bind(&collection.collection_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::store_error(collection, e))?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let embedding = Self::bytes_to_embedding(row.get::<Vec<u8>, _>("embedding").as_slice())?;
            let chunk = Chunk {
                id: row.get("chunk_id"),
                document_id: row.get("document_id"),
                sequence_index: row.get::<i64, _>("sequence_index") as usize,
                text: row.get("chunk_text"),
                span: CharSpan::new(
                    row.get::<i64, _>("span_start") as usize,
                    row.get::<i64, _>("span_end") as usize,
                ),
                fingerprint: row.get("fingerprint"),
            };
            hits.push(ScoredChunk {
                score: collection.metric.score(vector, &embedding),
                chunk,
            });
        }

        // Rows arrive in insertion order; a stable sort preserves that for
        // equal scores.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(RetrievalResult { hits })
    }

    async fn delete_collection(&self, collection: &CollectionConfig) -> EngineResult<()> {
        sqlx::query("DELETE FROM vector_records WHERE collection = ?")
            .bind(&collection.collection_name)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::store_error(collection, e))?;
        Ok(())
    }

    async fn fingerprints(&self, collection: &CollectionConfig, model_id: &str) -> EngineResult<HashSet<String>> {
        let rows = sqlx::query(
            "SELECT fingerprint FROM vector_records WHERE collection = ? AND model_id = ?",
        )
        .bind(&collection.collection_name)
        .bind(model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::store_error(collection, e))?;

        Ok(rows.into_iter().map(|r| r.get("fingerprint")).collect())
    }

    async fn count(&self, collection: &CollectionConfig) -> EngineResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vector_records WHERE collection = ?")
            .bind(&collection.collection_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::store_error(collection, e))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DistanceMetric, VectorProvider};

    fn collection(name: &str) -> CollectionConfig {
        CollectionConfig::new(VectorProvider::Sqlite, name, ":memory:")
            .with_metric(DistanceMetric::Cosine)
    }

    fn record(text: &str, vector: Vec<f32>, index: usize) -> VectorRecord {
        VectorRecord {
            chunk: Chunk::new("doc", index, text, CharSpan::new(0, text.len())),
            vector,
            model_id: "m1".to_string(),
        }
    }

    #[tokio::test]
    async fn roundtrip_preserves_chunk_and_order() {
        let store = SqliteVectorStore::open_in_memory().await.unwrap();
        let kb = collection("kb");

        store
            .upsert(
                &kb,
                vec![
                    record("tie-a", vec![1.0, 0.0], 0),
                    record("tie-b", vec![1.0, 0.0], 1),
                    record("other", vec![0.0, 1.0], 2),
                ],
            )
            .await
            .unwrap();

        let result = store.query(&kb, &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.is_ordered());
        assert_eq!(result.hits[0].chunk.text, "tie-a");
        assert_eq!(result.hits[1].chunk.text, "tie-b");
        assert_eq!(result.hits[0].chunk.span, CharSpan::new(0, 5));
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_fingerprint() {
        let store = SqliteVectorStore::open_in_memory().await.unwrap();
        let kb = collection("kb");

        store.upsert(&kb, vec![record("same", vec![1.0], 0)]).await.unwrap();
        store.upsert(&kb, vec![record("same", vec![2.0], 0)]).await.unwrap();
        assert_eq!(store.count(&kb).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = SqliteVectorStore::open_in_memory().await.unwrap();
        let a = collection("a");
        let b = collection("b");

        store.upsert(&a, vec![record("only in a", vec![1.0], 0)]).await.unwrap();
        assert_eq!(store.count(&a).await.unwrap(), 1);
        assert_eq!(store.count(&b).await.unwrap(), 0);
        assert!(store.query(&b, &[1.0], 5).await.unwrap().is_empty());

        store.delete_collection(&a).await.unwrap();
        assert_eq!(store.count(&a).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fingerprints_filter_by_model() {
        let store = SqliteVectorStore::open_in_memory().await.unwrap();
        let kb = collection("kb");
        let mut stale = record("text", vec![1.0], 0);
        stale.model_id = "old".to_string();
        store.upsert(&kb, vec![stale]).await.unwrap();

        assert!(store.fingerprints(&kb, "m1").await.unwrap().is_empty());
        assert_eq!(store.fingerprints(&kb, "old").await.unwrap().len(), 1);
    }

    #[test]
    fn embedding_bytes_roundtrip() {
        let vector = vec![0.5f32, -1.25, 3.0];
        let bytes = SqliteVectorStore::embedding_to_bytes(&vector);
        let back = SqliteVectorStore::bytes_to_embedding(&bytes).unwrap();
        assert_eq!(vector, back);
        assert!(SqliteVectorStore::bytes_to_embedding(&[1, 2, 3]).is_err());
    }
}
