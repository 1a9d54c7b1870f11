//! Weaver - Knowledge-Augmented Task Orchestration
//!
//! Weaver combines a retrieval pipeline (document ingestion, chunking,
//! embeddings, vector search) with a multi-agent task orchestrator. Agents
//! execute tasks through a bounded reasoning/tool-invocation loop, drawing
//! context from their knowledge collections and from earlier task results.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, ports and errors
//! - **Service Layer** (`services`): Ingestion, retrieval and context assembly
//! - **Application Layer** (`application`): The agent loop and the orchestrator
//! - **Adapters** (`adapters`): Concrete collaborators behind the ports
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use weaver::application::ProcessOrchestrator;
//! use weaver::domain::models::{AgentSpec, ProcessMode, Task};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Build agents and tasks, then drive them through an orchestrator.
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{AgentExecutor, ProcessOrchestrator, RunOutcome};
pub use domain::errors::{EngineError, EngineResult};
pub use domain::models::{
    AgentSpec, CollectionConfig, DistanceMetric, Document, EngineConfig, MediaType, ProcessMode,
    RetrievalResult, Task, TaskResult, TaskStatus, VectorProvider,
};
pub use domain::ports::{CompletionModel, EmbeddingProvider, Tool, ToolOutcome, VectorStore};
pub use infrastructure::{ConfigError, ConfigLoader};
pub use services::ingest::IngestionPipeline;
pub use services::retrieval::RetrievalEngine;
