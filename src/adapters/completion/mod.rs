//! Completion model adapters.

pub mod openai;
pub mod scripted;

pub use openai::OpenAiCompletionModel;
pub use scripted::ScriptedCompletionModel;
