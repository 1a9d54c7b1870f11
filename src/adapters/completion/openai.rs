//! OpenAI chat completion adapter.
//!
//! Speaks the `/v1/chat/completions` protocol, including function-style
//! tool calling. Works against any OpenAI-compatible endpoint; the base
//! URL comes from configuration and the API key from the environment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::CompletionConfig;
use crate::domain::ports::{CompletionModel, ModelRequest, ModelTurn, ToolDescriptor};

const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI-compatible chat completion model.
pub struct OpenAiCompletionModel {
    config: CompletionConfig,
    api_key: String,
    client: Arc<reqwest::Client>,
}

impl OpenAiCompletionModel {
    /// Build a model client, reading the API key from the environment.
    pub fn from_env(config: CompletionConfig, timeout_secs: u64) -> EngineResult<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            EngineError::Configuration(format!(
                "{API_KEY_ENV} is not set; the completion collaborator requires it at startup"
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            api_key,
            client: Arc::new(client),
        })
    }

    fn tool_payload(tool: &ToolDescriptor) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompletionModel {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: ModelRequest) -> EngineResult<ModelTurn> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let messages: Vec<ChatMessage> = request
            .messages
            .iter()
            .map(|m| ChatMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();
        let tools: Vec<Value> = request.tools.iter().map(Self::tool_payload).collect();

        let body = ChatRequest {
            model: self.config.model.clone(),
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Completion(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(EngineError::Completion(format!(
                "completion API returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Completion(format!("failed to parse response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Completion("response contained no choices".to_string()))?;

        // A tool call takes precedence over any accompanying text.
        if let Some(call) = choice.message.tool_calls.and_then(|mut c| {
            if c.is_empty() { None } else { Some(c.remove(0)) }
        }) {
            let arguments: Value = serde_json::from_str(&call.function.arguments)
                .map_err(|e| EngineError::Completion(format!("malformed tool arguments: {e}")))?;
            return Ok(ModelTurn::ToolCall {
                tool_name: call.function.name,
                arguments,
            });
        }

        Ok(ModelTurn::Answer(choice.message.content.unwrap_or_default()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallPayload>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallPayload {
    function: FunctionPayload,
}

#[derive(Debug, Deserialize)]
struct FunctionPayload {
    name: String,
    arguments: String,
}
