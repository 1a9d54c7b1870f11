//! Document loader service.
//!
//! Reads source files into normalized [`Document`]s. Text and Markdown are
//! read as UTF-8; PDF pages go through `pdf-extract`. An unreadable or
//! unsupported file is an `Ingestion` error for that file only; callers
//! decide whether to continue with the rest of a knowledge set.

use std::path::Path;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{Document, MediaType};

/// Loads source files into normalized text documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load one file. Media type is inferred from the extension.
    pub fn load(&self, path: &Path) -> EngineResult<Document> {
        let display = path.display().to_string();

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| EngineError::Ingestion {
                path: display.clone(),
                reason: "file has no extension".to_string(),
            })?;

        let media_type = MediaType::from_extension(ext).ok_or_else(|| EngineError::Ingestion {
            path: display.clone(),
            reason: format!("unsupported media type '.{ext}'"),
        })?;

        let text = match media_type {
            MediaType::PlainText | MediaType::Markdown => {
                std::fs::read_to_string(path).map_err(|e| EngineError::Ingestion {
                    path: display.clone(),
                    reason: e.to_string(),
                })?
            }
            MediaType::Pdf => pdf_extract::extract_text(path).map_err(|e| EngineError::Ingestion {
                path: display.clone(),
                reason: format!("PDF extraction failed: {e}"),
            })?,
        };

        let normalized = normalize(&text);
        if normalized.is_empty() {
            return Err(EngineError::Ingestion {
                path: display,
                reason: "file yielded no text".to_string(),
            });
        }

        Ok(Document::new(display, media_type, normalized))
    }

    /// Load many files, collecting per-file failures instead of aborting.
    pub fn load_all(&self, paths: &[impl AsRef<Path>]) -> (Vec<Document>, Vec<EngineError>) {
        let mut documents = Vec::new();
        let mut failures = Vec::new();
        for path in paths {
            match self.load(path.as_ref()) {
                Ok(doc) => documents.push(doc),
                Err(e) => failures.push(e),
            }
        }
        (documents, failures)
    }
}

/// Collapse Windows line endings and trim trailing whitespace per line.
fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_text_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "notes.txt", "line one  \r\nline two\r\n");
        let doc = DocumentLoader::new().load(&path).unwrap();
        assert_eq!(doc.media_type, MediaType::PlainText);
        assert_eq!(doc.text, "line one\nline two");
    }

    #[test]
    fn unsupported_extension_is_ingestion_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "blob.bin", "data");
        let err = DocumentLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, EngineError::Ingestion { .. }));
    }

    #[test]
    fn empty_file_is_ingestion_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.md", "   \n  \n");
        let err = DocumentLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, EngineError::Ingestion { .. }));
    }

    #[test]
    fn load_all_continues_past_failures() {
        let dir = TempDir::new().unwrap();
        let good = write_file(&dir, "a.txt", "content a");
        let bad = dir.path().join("missing.txt");
        let also_good = write_file(&dir, "b.md", "# content b");

        let (docs, failures) = DocumentLoader::new().load_all(&[good, bad, also_good]);
        assert_eq!(docs.len(), 2);
        assert_eq!(failures.len(), 1);
    }
}
