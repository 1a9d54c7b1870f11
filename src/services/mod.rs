//! Service layer: ingestion, retrieval, and context assembly.

pub mod assembler;
pub mod chunker;
pub mod ingest;
pub mod loader;
pub mod retrieval;

pub use assembler::{AssemblyInput, ContextAssembler, PromptContext};
pub use chunker::{Chunker, ChunkingConfig};
pub use ingest::{IngestReport, IngestionPipeline, KnowledgeLoadReport};
pub use loader::DocumentLoader;
pub use retrieval::RetrievalEngine;
