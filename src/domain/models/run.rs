//! Per-run execution state: result map, audit trail, cancellation.
//!
//! One `ExecutionContext` is created at run start and discarded at run end;
//! nothing here is shared across runs. The audit trail records every model
//! call, tool invocation and task state change for post-hoc analysis.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use super::task::{ProcessMode, TaskResult};

/// Kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    ModelCall,
    ToolInvocation,
    TaskStateChange,
    Retrieval,
    Warning,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelCall => "model_call",
            Self::ToolInvocation => "tool_invocation",
            Self::TaskStateChange => "task_state_change",
            Self::Retrieval => "retrieval",
            Self::Warning => "warning",
        }
    }
}

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,
    pub task_id: Option<Uuid>,
    pub agent_name: Option<String>,
    pub detail: String,
}

/// Bounded in-memory audit trail. Oldest entries are dropped when the cap
/// is reached.
#[derive(Debug)]
pub struct AuditTrail {
    entries: RwLock<VecDeque<AuditEntry>>,
    max_entries: usize,
}

impl AuditTrail {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub async fn record(
        &self,
        kind: AuditKind,
        task_id: Option<Uuid>,
        agent_name: Option<&str>,
        detail: impl Into<String>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            kind,
            task_id,
            agent_name: agent_name.map(str::to_string),
            detail: detail.into(),
        };
        let mut entries = self.entries.write().await;
        if entries.len() == self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn entries_of_kind(&self, kind: AuditKind) -> Vec<AuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Process-wide state for one orchestration run.
///
/// The result map is written by at most one task at a time (its own slot)
/// and read by the context assembler for dependents, so a `RwLock` map
/// gives the required write-once-per-key discipline.
pub struct ExecutionContext {
    pub run_id: Uuid,
    pub user_id: String,
    pub mode: ProcessMode,
    completed: RwLock<HashMap<Uuid, TaskResult>>,
    pub audit: Arc<AuditTrail>,
    cancel_tx: watch::Sender<Option<String>>,
    cancel_rx: watch::Receiver<Option<String>>,
}

impl ExecutionContext {
    pub fn new(mode: ProcessMode, user_id: impl Into<String>) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(None);
        Self {
            run_id: Uuid::new_v4(),
            user_id: user_id.into(),
            mode,
            completed: RwLock::new(HashMap::new()),
            audit: Arc::new(AuditTrail::default()),
            cancel_tx,
            cancel_rx,
        }
    }

    /// Record a task's terminal result. A slot is written at most once.
    pub async fn record_result(&self, result: TaskResult) {
        let mut completed = self.completed.write().await;
        completed.entry(result.task_id).or_insert(result);
    }

    pub async fn result_of(&self, task_id: Uuid) -> Option<TaskResult> {
        self.completed.read().await.get(&task_id).cloned()
    }

    pub async fn results(&self) -> HashMap<Uuid, TaskResult> {
        self.completed.read().await.clone()
    }

    /// Signal run-level cancellation with a cause. Idempotent; the first
    /// cause wins.
    pub fn cancel(&self, cause: impl Into<String>) {
        self.cancel_tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(cause.into());
                true
            } else {
                false
            }
        });
    }

    pub fn cancel_cause(&self) -> Option<String> {
        self.cancel_rx.borrow().clone()
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel_rx.borrow().is_some()
    }

    /// A receiver that resolves when cancellation is signaled. Each agent
    /// loop holds one as a suspension-point guard.
    pub fn cancel_watch(&self) -> watch::Receiver<Option<String>> {
        self.cancel_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::TaskStatus;

    #[tokio::test]
    async fn audit_trail_caps_entries() {
        let trail = AuditTrail::new(3);
        for i in 0..5 {
            trail.record(AuditKind::ModelCall, None, None, format!("call {i}")).await;
        }
        let entries = trail.entries().await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].detail, "call 2");
    }

    #[tokio::test]
    async fn result_slot_is_write_once() {
        let ctx = ExecutionContext::new(ProcessMode::Sequential, "user-1");
        let id = Uuid::new_v4();
        ctx.record_result(TaskResult::completed(id, "first", vec![])).await;
        ctx.record_result(TaskResult::failed(id, "second write ignored")).await;

        let result = ctx.result_of(id).await.unwrap();
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.output_text, "first");
    }

    #[tokio::test]
    async fn cancellation_keeps_first_cause() {
        let ctx = ExecutionContext::new(ProcessMode::Parallel, "user-1");
        assert!(!ctx.is_canceled());
        ctx.cancel("wall-clock budget exceeded");
        ctx.cancel("later cause");
        assert_eq!(ctx.cancel_cause().unwrap(), "wall-clock budget exceeded");
    }
}
