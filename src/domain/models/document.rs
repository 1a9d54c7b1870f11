//! Document and chunk domain models.
//!
//! A document is an immutable normalized text block loaded from a source
//! file; its identity is the hash of its content. Chunks are bounded
//! segments of a document and the unit of retrieval.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Media type of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    PlainText,
    Markdown,
    Pdf,
}

impl MediaType {
    /// Guess the media type from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "text" | "log" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Markdown => "text/markdown",
            Self::Pdf => "application/pdf",
        }
    }
}

/// Hex-encoded SHA-256 of arbitrary content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// A normalized text block loaded from a source file.
///
/// Immutable once loaded; `id` is the SHA-256 of the text content, so the
/// same content loaded from two paths shares an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Content hash identity.
    pub id: String,
    /// Where the document was loaded from.
    pub source_path: String,
    /// Detected media type.
    pub media_type: MediaType,
    /// Normalized text.
    pub text: String,
}

impl Document {
    pub fn new(source_path: impl Into<String>, media_type: MediaType, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: content_hash(&text),
            source_path: source_path.into(),
            media_type,
            text,
        }
    }
}

/// Character range of a chunk within its parent document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharSpan {
    pub start: usize,
    pub end: usize,
}

impl CharSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A bounded text segment derived from a document.
///
/// Never mutated after creation. The fingerprint (SHA-256 of the text) keys
/// ingestion idempotence: a chunk already present in a collection is not
/// re-embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<document_id>:chunk:<sequence_index>`
    pub id: String,
    /// Parent document identity.
    pub document_id: String,
    /// Zero-based position within the document.
    pub sequence_index: usize,
    /// Segment text.
    pub text: String,
    /// Character range within the parent document.
    pub span: CharSpan,
    /// Content fingerprint for dedup.
    pub fingerprint: String,
}

impl Chunk {
    pub fn new(document_id: impl Into<String>, sequence_index: usize, text: impl Into<String>, span: CharSpan) -> Self {
        let document_id = document_id.into();
        let text = text.into();
        Self {
            id: format!("{document_id}:chunk:{sequence_index}"),
            fingerprint: content_hash(&text),
            document_id,
            sequence_index,
            text,
            span,
        }
    }

    pub fn is_first(&self) -> bool {
        self.sequence_index == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_identity_is_content_hash() {
        let a = Document::new("a.txt", MediaType::PlainText, "same content");
        let b = Document::new("b.txt", MediaType::PlainText, "same content");
        assert_eq!(a.id, b.id);

        let c = Document::new("c.txt", MediaType::PlainText, "different content");
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn chunk_fingerprint_tracks_text() {
        let x = Chunk::new("doc", 0, "hello", CharSpan::new(0, 5));
        let y = Chunk::new("doc", 1, "hello", CharSpan::new(5, 10));
        let z = Chunk::new("doc", 2, "world", CharSpan::new(10, 15));
        assert_eq!(x.fingerprint, y.fingerprint);
        assert_ne!(x.fingerprint, z.fingerprint);
        assert_eq!(x.id, "doc:chunk:0");
    }

    #[test]
    fn media_type_from_extension() {
        assert_eq!(MediaType::from_extension("PDF"), Some(MediaType::Pdf));
        assert_eq!(MediaType::from_extension("md"), Some(MediaType::Markdown));
        assert_eq!(MediaType::from_extension("exe"), None);
    }
}
