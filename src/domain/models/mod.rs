//! Domain models for the weaver engine.

pub mod agent;
pub mod collection;
pub mod config;
pub mod document;
pub mod retrieval;
pub mod run;
pub mod task;

pub use agent::AgentSpec;
pub use collection::{CollectionConfig, DistanceMetric, VectorProvider};
pub use config::{
    CompletionConfig, EmbeddingConfig, EngineConfig, KnowledgeConfig, LoggingConfig, RetryConfig,
};
pub use document::{content_hash, CharSpan, Chunk, Document, MediaType};
pub use retrieval::{RetrievalResult, ScoredChunk};
pub use run::{AuditEntry, AuditKind, AuditTrail, ExecutionContext};
pub use task::{ProcessMode, Task, TaskResult, TaskStatus, ToolCallRecord};
