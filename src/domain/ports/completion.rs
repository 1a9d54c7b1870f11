//! Completion model port - interface for the language-model collaborator.
//!
//! Prompt in, turn out. A turn is either a final answer or a named tool
//! call; the agent loop owns the conversation state and decides what
//! happens next.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::EngineResult;

/// One message in a model conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    /// Tool output fed back into the conversation.
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into() }
    }
}

/// Tool capability advertised to the model.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON-schema-shaped parameter listing.
    pub parameters: Value,
}

/// A completion request: conversation plus available tools.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
}

impl ModelRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages, tools: Vec::new() }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }
}

/// What the model produced for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// Terminal answer text.
    Answer(String),
    /// The model wants a tool invoked before continuing.
    ToolCall { tool_name: String, arguments: Value },
}

/// Trait for language-model completion collaborators.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Backend name (e.g. "openai", "scripted").
    fn name(&self) -> &'static str;

    /// Run one completion call.
    async fn complete(&self, request: ModelRequest) -> EngineResult<ModelTurn>;
}
