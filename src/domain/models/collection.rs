//! Vector collection configuration.
//!
//! A collection is a named vector namespace inside a store backend. The
//! `(provider, collection_name, storage_path)` triple uniquely identifies a
//! namespace: two agents sharing that triple share retrieval results.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{EngineError, EngineResult};

/// Recognized vector store backends. Unrecognized provider strings fail
/// fast at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorProvider {
    /// In-process store, lost at shutdown.
    Memory,
    /// sqlite-backed store at `storage_path`.
    Sqlite,
}

impl VectorProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parse a provider name from configuration input.
    pub fn parse(s: &str) -> EngineResult<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(EngineError::Configuration(format!(
                "Unrecognized vector store provider '{other}'. Expected one of: memory, sqlite"
            ))),
        }
    }
}

/// Distance metric used for similarity ranking, configured per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Cosine
    }
}

impl DistanceMetric {
    /// Similarity score for two vectors, higher is better.
    ///
    /// Cosine reports cosine similarity in [-1, 1]; Euclidean reports
    /// `1 / (1 + distance)` so both metrics sort descending uniformly.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return f32::MIN;
        }
        match self {
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if mag_a == 0.0 || mag_b == 0.0 {
                    return f32::MIN;
                }
                dot / (mag_a * mag_b)
            }
            Self::Euclidean => {
                let dist: f32 = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
        }
    }
}

/// Identifies one logical namespace inside the vector store adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub provider: VectorProvider,
    pub collection_name: String,
    /// Backend storage location. Ignored by the memory provider.
    pub storage_path: String,
    #[serde(default)]
    pub metric: DistanceMetric,
}

impl CollectionConfig {
    pub fn new(provider: VectorProvider, collection_name: impl Into<String>, storage_path: impl Into<String>) -> Self {
        Self {
            provider,
            collection_name: collection_name.into(),
            storage_path: storage_path.into(),
            metric: DistanceMetric::default(),
        }
    }

    /// In-memory collection, convenient for tests and ephemeral knowledge.
    pub fn memory(collection_name: impl Into<String>) -> Self {
        Self::new(VectorProvider::Memory, collection_name, "")
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Namespace key. Two configs with equal keys share retrieval results.
    pub fn namespace_key(&self) -> String {
        format!("{}:{}:{}", self.provider.as_str(), self.collection_name, self.storage_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_fails_fast() {
        assert!(VectorProvider::parse("chroma").is_err());
        assert_eq!(VectorProvider::parse("SQLite").unwrap(), VectorProvider::Sqlite);
    }

    #[test]
    fn namespace_key_identifies_collection() {
        let a = CollectionConfig::new(VectorProvider::Sqlite, "kb1", "/tmp/kb.db");
        let b = CollectionConfig::new(VectorProvider::Sqlite, "kb1", "/tmp/kb.db");
        let c = CollectionConfig::new(VectorProvider::Sqlite, "kb2", "/tmp/kb.db");
        assert_eq!(a.namespace_key(), b.namespace_key());
        assert_ne!(a.namespace_key(), c.namespace_key());
    }

    #[test]
    fn cosine_scores_identical_vectors_highest() {
        let m = DistanceMetric::Cosine;
        let v = [1.0, 2.0, 3.0];
        let close = m.score(&v, &v);
        let far = m.score(&v, &[-1.0, -2.0, -3.0]);
        assert!((close - 1.0).abs() < 1e-6);
        assert!(far < close);
    }

    #[test]
    fn euclidean_score_is_monotone_in_distance() {
        let m = DistanceMetric::Euclidean;
        let origin = [0.0, 0.0];
        let near = m.score(&origin, &[1.0, 0.0]);
        let far = m.score(&origin, &[5.0, 0.0]);
        assert!(near > far);
        assert!((m.score(&origin, &origin) - 1.0).abs() < 1e-6);
    }
}
