//! Retrieval result models.

use serde::{Deserialize, Serialize};

use super::document::Chunk;

/// One retrieved chunk with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Similarity score, higher is better (metric-dependent).
    pub score: f32,
}

/// Ordered sequence of scored chunks, descending by score with stable
/// insertion-order ties. Length is at most the requested `k`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self { hits: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Scores are non-increasing.
    pub fn is_ordered(&self) -> bool {
        self.hits.windows(2).all(|w| w[0].score >= w[1].score)
    }
}
