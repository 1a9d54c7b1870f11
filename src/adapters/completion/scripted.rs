//! Scripted completion model for tests and offline runs.
//!
//! Holds a queue of pre-planned turns and hands them out in order. When
//! the queue runs dry it falls back to a fixed answer, so an agent loop
//! driven by this model always terminates. Also keeps every request it
//! saw, letting tests assert on the exact prompts that were sent.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::ports::{CompletionModel, ModelRequest, ModelTurn};

/// Queue-driven completion model.
pub struct ScriptedCompletionModel {
    turns: Mutex<VecDeque<ModelTurn>>,
    requests: Mutex<Vec<ModelRequest>>,
    fallback: ModelTurn,
}

impl ScriptedCompletionModel {
    /// Model that plays back `turns` in order, then answers with `done`.
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
            fallback: ModelTurn::Answer("done".to_string()),
        }
    }

    /// Model that always returns the same answer.
    pub fn always_answers(text: impl Into<String>) -> Self {
        let mut model = Self::new(Vec::new());
        model.fallback = ModelTurn::Answer(text.into());
        model
    }

    /// Replace the dry-queue fallback turn.
    pub fn with_fallback(mut self, turn: ModelTurn) -> Self {
        self.fallback = turn;
        self
    }

    /// Requests observed so far, in call order.
    pub fn observed_requests(&self) -> Vec<ModelRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of completion calls made against this model.
    pub fn call_count(&self) -> usize {
        self.observed_requests().len()
    }
}

#[async_trait]
impl CompletionModel for ScriptedCompletionModel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest) -> EngineResult<ModelTurn> {
        self.requests
            .lock()
            .map_err(|_| EngineError::Completion("scripted model lock poisoned".to_string()))?
            .push(request);

        let next = self
            .turns
            .lock()
            .map_err(|_| EngineError::Completion("scripted model lock poisoned".to_string()))?
            .pop_front();

        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn plays_turns_in_order_then_falls_back() {
        let model = ScriptedCompletionModel::new(vec![
            ModelTurn::ToolCall {
                tool_name: "lookup".to_string(),
                arguments: json!({"q": "x"}),
            },
            ModelTurn::Answer("first answer".to_string()),
        ]);

        let request = ModelRequest::new(Vec::new());
        assert!(matches!(
            model.complete(request.clone()).await.unwrap(),
            ModelTurn::ToolCall { .. }
        ));
        assert_eq!(
            model.complete(request.clone()).await.unwrap(),
            ModelTurn::Answer("first answer".to_string())
        );
        assert_eq!(
            model.complete(request).await.unwrap(),
            ModelTurn::Answer("done".to_string())
        );
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn records_observed_requests() {
        let model = ScriptedCompletionModel::always_answers("ok");
        let request = ModelRequest::new(vec![crate::domain::ports::Message::user("hello")]);
        model.complete(request).await.unwrap();

        let observed = model.observed_requests();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].messages[0].content, "hello");
    }
}
