//! Ports: trait interfaces for external collaborators.

pub mod completion;
pub mod embedding;
pub mod tool;
pub mod vector_store;

pub use completion::{CompletionModel, Message, ModelRequest, ModelTurn, Role, ToolDescriptor};
pub use embedding::{EmbeddingInput, EmbeddingOutput, EmbeddingProvider};
pub use tool::{InputSchema, Parameter, Tool, ToolOutcome};
pub use vector_store::{VectorRecord, VectorStore};
