//! Task domain model.
//!
//! Tasks are units of work bound to one agent. They form a DAG through
//! `depends_on` edges and are mutated exactly once by the orchestrator,
//! from pending to a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Status of a task in the orchestration pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Defined but not yet started.
    Pending,
    /// Currently executing in an agent loop.
    Running,
    /// Reached a terminal answer.
    Completed,
    /// Agent loop or collaborator failed after its retry budget.
    Failed,
    /// A declared dependency failed; the task never ran.
    Skipped,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Pending => vec![Self::Running, Self::Skipped, Self::Failed],
            Self::Running => vec![Self::Completed, Self::Failed],
            Self::Completed | Self::Failed | Self::Skipped => vec![],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// Task-graph execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessMode {
    /// Strict listed order with implicit chaining between consecutive tasks.
    Sequential,
    /// Dependency-driven concurrent execution.
    Parallel,
}

impl ProcessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }
}

/// One tool invocation made while producing a task's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: Value,
    pub output: Value,
    pub is_error: bool,
}

/// Terminal output of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub output_text: String,
    /// Raw tool calls made on the way to the answer.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Failure or skip cause, when not completed.
    pub error: Option<String>,
}

impl TaskResult {
    pub fn completed(task_id: Uuid, output_text: impl Into<String>, tool_calls: Vec<ToolCallRecord>) -> Self {
        Self {
            task_id,
            status: TaskStatus::Completed,
            output_text: output_text.into(),
            tool_calls,
            error: None,
        }
    }

    pub fn failed(task_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            task_id,
            status: TaskStatus::Failed,
            output_text: String::new(),
            tool_calls: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn skipped(task_id: Uuid, cause: impl Into<String>) -> Self {
        Self {
            task_id,
            status: TaskStatus::Skipped,
            output_text: String::new(),
            tool_calls: Vec::new(),
            error: Some(cause.into()),
        }
    }
}

/// A unit of work bound to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    /// Detailed description / prompt.
    pub description: String,
    /// Expected-output contract, turned into format instructions.
    pub expected_output: String,
    /// Name of the agent that executes this task.
    pub agent_name: String,
    /// Explicit dependency edges. Empty means "implicit chaining" in
    /// sequential mode and "no dependencies" in parallel mode.
    #[serde(default)]
    pub depends_on: Vec<Uuid>,
    #[serde(default)]
    pub status: TaskStatus,
    pub result: Option<TaskResult>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent_name: agent_name.into(),
            depends_on: Vec::new(),
            status: TaskStatus::Pending,
            result: None,
            created_at: Utc::now(),
        }
    }

    /// Add an explicit dependency edge. Self-edges are ignored.
    pub fn with_dependency(mut self, task_id: Uuid) -> Self {
        if task_id != self.id && !self.depends_on.contains(&task_id) {
            self.depends_on.push(task_id);
        }
        self
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        self.status.can_transition_to(next)
    }

    /// Transition and record the result for terminal states.
    pub fn transition_to(&mut self, next: TaskStatus, result: Option<TaskResult>) -> Result<(), String> {
        if !self.can_transition_to(next) {
            return Err(format!(
                "Cannot transition task '{}' from {} to {}",
                self.name,
                self.status.as_str(),
                next.as_str()
            ));
        }
        self.status = next;
        if next.is_terminal() {
            self.result = result;
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Task name cannot be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err(format!("Task '{}' has an empty description", self.name));
        }
        if self.agent_name.trim().is_empty() {
            return Err(format!("Task '{}' is not assigned to an agent", self.name));
        }
        if self.depends_on.contains(&self.id) {
            return Err(format!("Task '{}' cannot depend on itself", self.name));
        }
        Ok(())
    }
}
