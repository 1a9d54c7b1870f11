//! Domain errors for the weaver engine.

use thiserror::Error;
use uuid::Uuid;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[Uuid]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Engine-level errors.
///
/// Three tiers: structural errors (`DependencyCycle`, `TaskDependency`,
/// `Configuration`) abort a run before side effects; per-task runtime errors
/// (`AgentLoopExceeded`, `Completion`) fail only the affected task; local
/// conditions (one unreadable file, one tool error) degrade gracefully and
/// are recorded in the audit trail.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source file could not be parsed into text. Skip the file, continue
    /// ingesting others.
    #[error("Ingestion failed for {path}: {reason}")]
    Ingestion { path: String, reason: String },

    /// Embedding call failed after the retry budget was exhausted.
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// Vector store connection/schema issue. Fatal for the affected
    /// collection's operation, not for the whole run.
    #[error("Vector store error for collection '{collection}': {reason}")]
    VectorStore { collection: String, reason: String },

    /// Completion model collaborator failed.
    #[error("Completion model error: {0}")]
    Completion(String),

    /// Cyclic task dependencies. Fatal at validation time.
    #[error("Task dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<Uuid>),

    /// A task references a dependency or agent that does not exist.
    #[error("Task dependency error: {0}")]
    TaskDependency(String),

    /// Agent exceeded its tool-call iteration budget.
    #[error("Agent loop exceeded {max_iterations} iterations for task {task_id}")]
    AgentLoopExceeded { task_id: Uuid, max_iterations: u32 },

    /// Run-level wall-clock budget exceeded or cancellation requested.
    #[error("Run canceled: {0}")]
    Canceled(String),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Bad provider name, malformed config, missing credentials.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}
