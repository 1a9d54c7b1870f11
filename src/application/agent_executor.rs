//! Agent execution loop.
//!
//! Runs one task through one agent as an explicit state machine: assemble
//! context, call the completion model, and either finish with an answer or
//! invoke a tool and feed its outcome back into the conversation. The loop
//! is bounded by the agent's iteration budget and checks the run's
//! cancellation watch before every collaborator call. Tool errors are data
//! fed back to the model, never faults; collaborator failures after the
//! retry budget fail the task.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::adapters::retry::RetryPolicy;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    AgentSpec, AuditKind, ExecutionContext, RetrievalResult, Task, TaskResult, ToolCallRecord,
};
use crate::domain::ports::{
    CompletionModel, InputSchema, Message, ModelRequest, ModelTurn, ToolDescriptor, ToolOutcome,
};
use crate::services::assembler::{AssemblyInput, ContextAssembler};
use crate::services::retrieval::RetrievalEngine;

/// Chunks retrieved per task when the agent has a knowledge scope.
const RETRIEVAL_TOP_K: usize = 5;

/// Prompt appended for the self-critique pass.
const REFLECTION_PROMPT: &str = "Review your draft answer above against the task and the \
expected output. Correct any errors or omissions and reply with the final answer only.";

/// Executes single tasks through the reasoning/tool-invocation loop.
pub struct AgentExecutor {
    model: Arc<dyn CompletionModel>,
    retrieval: Arc<RetrievalEngine>,
    assembler: ContextAssembler,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl AgentExecutor {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        retrieval: Arc<RetrievalEngine>,
        assembler: ContextAssembler,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            model,
            retrieval,
            assembler,
            retry,
            call_timeout,
        }
    }

    /// Run `task` through `agent` to a terminal result.
    ///
    /// `memory_snippets` carries prior-task outputs in dependency order.
    /// Collaborator failures and budget exhaustion surface as errors; the
    /// orchestrator decides what they mean for the run.
    pub async fn execute(
        &self,
        agent: &AgentSpec,
        task: &Task,
        memory_snippets: Vec<String>,
        ctx: &ExecutionContext,
    ) -> EngineResult<TaskResult> {
        self.check_canceled(ctx)?;

        let retrieval = self.retrieve_knowledge(agent, task, ctx).await?;
        let system = ContextAssembler::system_prompt(&agent.role, &agent.goal, &agent.backstory);
        let assembled = self.assembler.assemble(&AssemblyInput {
            task_description: task.description.clone(),
            expected_output: task.expected_output.clone(),
            retrieval,
            memory_snippets,
        });

        let mut messages = vec![Message::system(system), Message::user(assembled.user)];
        let descriptors = tool_descriptors(agent);
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
        let mut reflected = false;

        for iteration in 0..agent.max_iterations {
            self.check_canceled(ctx)?;

            let request = ModelRequest::new(messages.clone()).with_tools(descriptors.clone());
            let turn = self.call_model(request, agent, task, ctx).await?;

            match turn {
                ModelTurn::Answer(text) => {
                    if agent.verbose {
                        info!(task = %task.name, agent = %agent.name, iteration, "agent answered");
                    }
                    if agent.self_reflect && !reflected {
                        // One critique pass over the draft; the next answer
                        // is final.
                        reflected = true;
                        messages.push(Message::assistant(text));
                        messages.push(Message::user(REFLECTION_PROMPT));
                        continue;
                    }
                    return Ok(TaskResult::completed(task.id, text, tool_calls));
                }
                ModelTurn::ToolCall { tool_name, arguments } => {
                    let record = self
                        .invoke_tool(agent, task, &tool_name, arguments, ctx)
                        .await;
                    messages.push(Message::assistant(format!(
                        "Calling tool '{}' with arguments {}",
                        record.tool_name, record.arguments
                    )));
                    messages.push(Message::tool(record.output.to_string()));
                    tool_calls.push(record);
                }
            }
        }

        Err(EngineError::AgentLoopExceeded {
            task_id: task.id,
            max_iterations: agent.max_iterations,
        })
    }

    fn check_canceled(&self, ctx: &ExecutionContext) -> EngineResult<()> {
        match ctx.cancel_cause() {
            Some(cause) => Err(EngineError::Canceled(cause)),
            None => Ok(()),
        }
    }

    async fn retrieve_knowledge(
        &self,
        agent: &AgentSpec,
        task: &Task,
        ctx: &ExecutionContext,
    ) -> EngineResult<RetrievalResult> {
        let Some(scope) = &agent.knowledge_scope else {
            return Ok(RetrievalResult::empty());
        };

        let result = self
            .retrieval
            .retrieve(&task.description, scope, RETRIEVAL_TOP_K)
            .await?;
        ctx.audit
            .record(
                AuditKind::Retrieval,
                Some(task.id),
                Some(&agent.name),
                format!(
                    "retrieved {} chunks from '{}'",
                    result.len(),
                    scope.collection_name
                ),
            )
            .await;
        Ok(result)
    }

    async fn call_model(
        &self,
        request: ModelRequest,
        agent: &AgentSpec,
        task: &Task,
        ctx: &ExecutionContext,
    ) -> EngineResult<ModelTurn> {
        let turn = self
            .retry
            .run(|| {
                let request = request.clone();
                async move {
                    tokio::time::timeout(self.call_timeout, self.model.complete(request))
                        .await
                        .map_err(|_| {
                            EngineError::Completion(format!(
                                "completion call exceeded {}s",
                                self.call_timeout.as_secs()
                            ))
                        })?
                }
            })
            .await?;

        ctx.audit
            .record(
                AuditKind::ModelCall,
                Some(task.id),
                Some(&agent.name),
                match &turn {
                    ModelTurn::Answer(_) => "model produced an answer".to_string(),
                    ModelTurn::ToolCall { tool_name, .. } => {
                        format!("model requested tool '{tool_name}'")
                    }
                },
            )
            .await;
        Ok(turn)
    }

    /// Resolve, validate and invoke a tool. All failure paths produce an
    /// error-valued record that goes back into the conversation.
    async fn invoke_tool(
        &self,
        agent: &AgentSpec,
        task: &Task,
        tool_name: &str,
        arguments: Value,
        ctx: &ExecutionContext,
    ) -> ToolCallRecord {
        let outcome = match agent.tool(tool_name) {
            None => ToolOutcome::Error(format!("unknown tool '{tool_name}'")),
            Some(tool) => match tool.input_schema().validate(&arguments) {
                Err(reason) => ToolOutcome::Error(format!("invalid arguments: {reason}")),
                Ok(()) => match tokio::time::timeout(self.call_timeout, tool.invoke(arguments.clone())).await {
                    Ok(outcome) => outcome,
                    Err(_) => ToolOutcome::Error(format!(
                        "tool '{tool_name}' exceeded {}s",
                        self.call_timeout.as_secs()
                    )),
                },
            },
        };

        let is_error = outcome.is_error();
        if is_error {
            debug!(task = %task.name, tool = tool_name, "tool returned an error value");
        }
        ctx.audit
            .record(
                AuditKind::ToolInvocation,
                Some(task.id),
                Some(&agent.name),
                format!("tool '{tool_name}' {}", if is_error { "errored" } else { "succeeded" }),
            )
            .await;

        ToolCallRecord {
            tool_name: tool_name.to_string(),
            arguments,
            output: outcome.to_json(),
            is_error,
        }
    }
}

/// Advertise an agent's tools to the completion model.
fn tool_descriptors(agent: &AgentSpec) -> Vec<ToolDescriptor> {
    agent
        .tools
        .iter()
        .map(|tool| ToolDescriptor {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: schema_to_json(&tool.input_schema()),
        })
        .collect()
}

/// Render an input schema as a JSON-schema object.
fn schema_to_json(schema: &InputSchema) -> Value {
    let properties: serde_json::Map<String, Value> = schema
        .parameters
        .iter()
        .map(|p| (p.name.clone(), serde_json::json!({ "type": p.type_name })))
        .collect();
    let required: Vec<&str> = schema
        .parameters
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::completion::ScriptedCompletionModel;
    use crate::adapters::embeddings::DeterministicEmbeddingProvider;
    use crate::adapters::vector::MemoryVectorStore;
    use crate::domain::models::ProcessMode;
    use crate::domain::ports::{Parameter, Tool};
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn input_schema(&self) -> InputSchema {
            InputSchema::single_string("text")
        }

        async fn invoke(&self, args: Value) -> ToolOutcome {
            ToolOutcome::Success(json!({"echoed": args["text"]}))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "Always errors"
        }

        fn input_schema(&self) -> InputSchema {
            InputSchema::single_string("query")
        }

        async fn invoke(&self, _args: Value) -> ToolOutcome {
            ToolOutcome::Error("no such table".to_string())
        }
    }

    fn executor(model: ScriptedCompletionModel) -> AgentExecutor {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(DeterministicEmbeddingProvider::new(16));
        AgentExecutor::new(
            Arc::new(model),
            Arc::new(RetrievalEngine::new(embedder, store)),
            ContextAssembler::new(10_000),
            RetryPolicy::no_retries(),
            Duration::from_secs(5),
        )
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new(ProcessMode::Sequential, "test-user")
    }

    #[tokio::test]
    async fn direct_answer_completes_task() {
        let exec = executor(ScriptedCompletionModel::always_answers("Paris"));
        let agent = AgentSpec::new("geo", "Geographer", "Answer geography questions");
        let task = Task::new("capital", "What is the capital of France?", "one word", "geo");
        let ctx = context();

        let result = exec.execute(&agent, &task, vec![], &ctx).await.unwrap();
        assert_eq!(result.output_text, "Paris");
        assert!(result.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn tool_call_then_answer() {
        let model = ScriptedCompletionModel::new(vec![
            ModelTurn::ToolCall {
                tool_name: "echo".to_string(),
                arguments: json!({"text": "hello"}),
            },
            ModelTurn::Answer("echoed hello".to_string()),
        ]);
        let exec = executor(model);
        let agent = AgentSpec::new("e", "Echoer", "Echo things").with_tool(Arc::new(EchoTool));
        let task = Task::new("t", "Echo hello", "the echo", "e");
        let ctx = context();

        let result = exec.execute(&agent, &task, vec![], &ctx).await.unwrap();
        assert_eq!(result.output_text, "echoed hello");
        assert_eq!(result.tool_calls.len(), 1);
        assert!(!result.tool_calls[0].is_error);
        assert_eq!(result.tool_calls[0].output["echoed"], "hello");
        assert_eq!(ctx.audit.entries_of_kind(AuditKind::ToolInvocation).await.len(), 1);
    }

    #[tokio::test]
    async fn tool_error_is_recoverable() {
        let model = ScriptedCompletionModel::new(vec![
            ModelTurn::ToolCall {
                tool_name: "flaky".to_string(),
                arguments: json!({"query": "SELECT"}),
            },
            ModelTurn::Answer("recovered without the tool".to_string()),
        ]);
        let exec = executor(model);
        let agent = AgentSpec::new("a", "Analyst", "Query data").with_tool(Arc::new(FailingTool));
        let task = Task::new("t", "Query the table", "rows", "a");
        let ctx = context();

        let result = exec.execute(&agent, &task, vec![], &ctx).await.unwrap();
        assert_eq!(result.output_text, "recovered without the tool");
        assert!(result.tool_calls[0].is_error);
        assert_eq!(result.tool_calls[0].output["error"], "no such table");
    }

    #[tokio::test]
    async fn unknown_tool_feeds_error_back() {
        let model = ScriptedCompletionModel::new(vec![
            ModelTurn::ToolCall {
                tool_name: "ghost".to_string(),
                arguments: json!({}),
            },
            ModelTurn::Answer("done".to_string()),
        ]);
        let exec = executor(model);
        let agent = AgentSpec::new("a", "R", "G");
        let task = Task::new("t", "desc", "out", "a");
        let ctx = context();

        let result = exec.execute(&agent, &task, vec![], &ctx).await.unwrap();
        assert!(result.tool_calls[0].is_error);
        assert!(result.tool_calls[0].output["error"]
            .as_str()
            .unwrap()
            .contains("unknown tool"));
    }

    #[tokio::test]
    async fn invalid_arguments_are_rejected_before_invocation() {
        let model = ScriptedCompletionModel::new(vec![
            ModelTurn::ToolCall {
                tool_name: "echo".to_string(),
                arguments: json!({"text": 42}),
            },
            ModelTurn::Answer("done".to_string()),
        ]);
        let exec = executor(model);
        let agent = AgentSpec::new("a", "R", "G").with_tool(Arc::new(EchoTool));
        let task = Task::new("t", "desc", "out", "a");
        let ctx = context();

        let result = exec.execute(&agent, &task, vec![], &ctx).await.unwrap();
        assert!(result.tool_calls[0].is_error);
        assert!(result.tool_calls[0].output["error"]
            .as_str()
            .unwrap()
            .contains("invalid arguments"));
    }

    #[tokio::test]
    async fn loop_budget_exhaustion_errors() {
        // A model that never answers.
        let model = ScriptedCompletionModel::new(Vec::new()).with_fallback(ModelTurn::ToolCall {
            tool_name: "echo".to_string(),
            arguments: json!({"text": "again"}),
        });
        let exec = executor(model);
        let agent = AgentSpec::new("a", "R", "G")
            .with_tool(Arc::new(EchoTool))
            .with_max_iterations(3);
        let task = Task::new("t", "desc", "out", "a");
        let ctx = context();

        let err = exec.execute(&agent, &task, vec![], &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::AgentLoopExceeded { max_iterations: 3, .. }
        ));
    }

    #[tokio::test]
    async fn self_reflect_adds_one_critique_pass() {
        let model = ScriptedCompletionModel::new(vec![
            ModelTurn::Answer("draft".to_string()),
            ModelTurn::Answer("final".to_string()),
        ]);
        let exec = executor(model);
        let agent = AgentSpec::new("a", "R", "G").with_self_reflect(true);
        let task = Task::new("t", "desc", "out", "a");
        let ctx = context();

        let result = exec.execute(&agent, &task, vec![], &ctx).await.unwrap();
        assert_eq!(result.output_text, "final");
        assert_eq!(ctx.audit.entries_of_kind(AuditKind::ModelCall).await.len(), 2);
    }

    #[tokio::test]
    async fn canceled_run_stops_before_model_call() {
        let model = ScriptedCompletionModel::always_answers("never seen");
        let exec = executor(model);
        let agent = AgentSpec::new("a", "R", "G");
        let task = Task::new("t", "desc", "out", "a");
        let ctx = context();
        ctx.cancel("deadline hit");

        let err = exec.execute(&agent, &task, vec![], &ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::Canceled(_)));
    }

    #[test]
    fn schema_renders_as_json_schema() {
        let schema = InputSchema::new(vec![
            Parameter { name: "q".into(), type_name: "string".into(), required: true },
            Parameter { name: "limit".into(), type_name: "number".into(), required: false },
        ]);
        let json = schema_to_json(&schema);
        assert_eq!(json["type"], "object");
        assert_eq!(json["properties"]["q"]["type"], "string");
        assert_eq!(json["required"], json!(["q"]));
    }
}
