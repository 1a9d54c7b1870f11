//! Process orchestrator.
//!
//! Drives a set of tasks through their agents in one of two modes.
//! Sequential mode runs tasks in listed order with implicit chaining: a
//! task with no declared dependencies receives the previous task's output
//! as context. Parallel mode releases tasks as their declared dependencies
//! complete, bounded by a concurrency cap. In both modes a failed
//! dependency marks its dependents skipped rather than running them
//! against missing context, and run-level cancellation (wall-clock budget
//! or an explicit request) stops further task starts with the first cause
//! winning.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::agent_executor::AgentExecutor;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    AgentSpec, AuditKind, AuditTrail, ExecutionContext, ProcessMode, Task, TaskResult, TaskStatus,
};

/// Outcome of one orchestration run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub mode: ProcessMode,
    /// Terminal results in the listed task order.
    pub results: Vec<TaskResult>,
    pub audit: Arc<AuditTrail>,
    /// Cancellation cause, when the run was cut short.
    pub cancel_cause: Option<String>,
}

impl RunOutcome {
    pub fn result_for(&self, task_id: Uuid) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.task_id == task_id)
    }

    pub fn all_completed(&self) -> bool {
        self.results.iter().all(|r| r.status == TaskStatus::Completed)
    }
}

/// Drives tasks through agents to terminal states.
pub struct ProcessOrchestrator {
    executor: Arc<AgentExecutor>,
    max_concurrency: usize,
    run_timeout: Duration,
}

impl ProcessOrchestrator {
    pub fn new(executor: Arc<AgentExecutor>, max_concurrency: usize, run_timeout: Duration) -> Self {
        Self {
            executor,
            max_concurrency: max_concurrency.clamp(1, 64),
            run_timeout,
        }
    }

    /// Validate and execute a run.
    ///
    /// Structural problems (unknown agents, dangling dependencies, cycles)
    /// abort before any task starts. Per-task failures do not abort the
    /// run; they fail the task and skip its dependents.
    pub async fn run(
        &self,
        agents: Vec<AgentSpec>,
        mut tasks: Vec<Task>,
        mode: ProcessMode,
        user_id: impl Into<String>,
    ) -> EngineResult<RunOutcome> {
        let agents = validate_run(&agents, &tasks)?;

        let ctx = Arc::new(ExecutionContext::new(mode, user_id));
        info!(run_id = %ctx.run_id, mode = mode.as_str(), tasks = tasks.len(), "starting run");

        // Wall-clock budget; 0 disables it.
        let timer = if self.run_timeout > Duration::ZERO {
            let ctx = ctx.clone();
            let budget = self.run_timeout;
            Some(tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                ctx.cancel(format!("run exceeded {}s wall-clock budget", budget.as_secs()));
            }))
        } else {
            None
        };

        match mode {
            ProcessMode::Sequential => self.run_sequential(&agents, &mut tasks, &ctx).await,
            ProcessMode::Parallel => self.run_parallel(&agents, &mut tasks, &ctx).await?,
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        let results = tasks
            .iter()
            .map(|task| {
                task.result.clone().unwrap_or_else(|| {
                    TaskResult::skipped(task.id, "task never reached a terminal state")
                })
            })
            .collect();

        let cancel_cause = ctx.cancel_cause();
        if let Some(cause) = &cancel_cause {
            warn!(run_id = %ctx.run_id, cause, "run was canceled");
        }

        Ok(RunOutcome {
            run_id: ctx.run_id,
            mode,
            results,
            audit: ctx.audit.clone(),
            cancel_cause,
        })
    }

    async fn run_sequential(
        &self,
        agents: &HashMap<String, AgentSpec>,
        tasks: &mut [Task],
        ctx: &Arc<ExecutionContext>,
    ) {
        let names: HashMap<Uuid, String> = tasks.iter().map(|t| (t.id, t.name.clone())).collect();
        let mut previous: Option<Uuid> = None;

        for i in 0..tasks.len() {
            let task_id = tasks[i].id;
            // Implicit chaining: an undeclared dependency list means
            // "depends on the previous listed task".
            let deps: Vec<Uuid> = if tasks[i].depends_on.is_empty() {
                previous.into_iter().collect()
            } else {
                tasks[i].depends_on.clone()
            };
            previous = Some(task_id);

            if let Some(cause) = ctx.cancel_cause() {
                self.finish_task(&mut tasks[i], TaskResult::skipped(task_id, cause), ctx).await;
                continue;
            }

            match self.gather_memory(&deps, &names, ctx).await {
                Ok(memory) => {
                    self.execute_one(agents, &mut tasks[i], memory, ctx).await;
                }
                Err(blocked_by) => {
                    let cause = format!("dependency '{blocked_by}' did not complete");
                    self.finish_task(&mut tasks[i], TaskResult::skipped(task_id, cause), ctx).await;
                }
            }
        }
    }

    async fn run_parallel(
        &self,
        agents: &HashMap<String, AgentSpec>,
        tasks: &mut [Task],
        ctx: &Arc<ExecutionContext>,
    ) -> EngineResult<()> {
        let names: HashMap<Uuid, String> = tasks.iter().map(|t| (t.id, t.name.clone())).collect();
        let index_of: HashMap<Uuid, usize> =
            tasks.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set: JoinSet<(Uuid, EngineResult<TaskResult>)> = JoinSet::new();
        let mut in_flight: HashSet<Uuid> = HashSet::new();

        loop {
            // Release every pending task whose dependencies are settled.
            let mut progressed = true;
            while progressed {
                progressed = false;
                for i in 0..tasks.len() {
                    if tasks[i].status != TaskStatus::Pending || in_flight.contains(&tasks[i].id) {
                        continue;
                    }
                    let task_id = tasks[i].id;

                    if let Some(cause) = ctx.cancel_cause() {
                        self.finish_task(&mut tasks[i], TaskResult::skipped(task_id, cause), ctx).await;
                        progressed = true;
                        continue;
                    }

                    match dependency_state(&tasks[i].depends_on, &index_of, tasks) {
                        DependencyState::Ready => {
                            let memory = match self.gather_memory(&tasks[i].depends_on, &names, ctx).await {
                                Ok(memory) => memory,
                                Err(blocked_by) => {
                                    let cause = format!("dependency '{blocked_by}' did not complete");
                                    self.finish_task(&mut tasks[i], TaskResult::skipped(task_id, cause), ctx).await;
                                    progressed = true;
                                    continue;
                                }
                            };
                            self.mark_running(&mut tasks[i], ctx).await;
                            in_flight.insert(task_id);

                            let executor = self.executor.clone();
                            let semaphore = semaphore.clone();
                            let ctx = ctx.clone();
                            let agent = agents[&tasks[i].agent_name].clone();
                            let task = tasks[i].clone();
                            join_set.spawn(async move {
                                let permit = semaphore.acquire_owned().await;
                                if permit.is_err() {
                                    return (task.id, Err(EngineError::Canceled("run aborted".to_string())));
                                }
                                let result = executor.execute(&agent, &task, memory, &ctx).await;
                                (task.id, result)
                            });
                        }
                        DependencyState::Blocked(blocked_by) => {
                            let cause = format!("dependency '{}' did not complete", names.get(&blocked_by).cloned().unwrap_or_else(|| blocked_by.to_string()));
                            self.finish_task(&mut tasks[i], TaskResult::skipped(task_id, cause), ctx).await;
                            progressed = true;
                        }
                        DependencyState::Waiting => {}
                    }
                }
            }

            let Some(joined) = join_set.join_next().await else {
                // Nothing running and nothing spawnable.
                if tasks.iter().all(Task::is_terminal) {
                    break;
                }
                // Cycle validation makes this unreachable; treat it as a
                // structural error rather than spinning.
                return Err(EngineError::TaskDependency(
                    "pending tasks remain but none are runnable".to_string(),
                ));
            };

            let (task_id, result) = match joined {
                Ok(pair) => pair,
                Err(join_err) => {
                    warn!(error = %join_err, "task execution aborted");
                    continue;
                }
            };
            in_flight.remove(&task_id);
            if let Some(&i) = index_of.get(&task_id) {
                self.settle(&mut tasks[i], result, ctx).await;
            }
        }

        Ok(())
    }

    /// Collect completed dependency outputs, oldest first. Returns the name
    /// of the first non-completed dependency otherwise.
    async fn gather_memory(
        &self,
        deps: &[Uuid],
        names: &HashMap<Uuid, String>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<String>, String> {
        let mut memory = Vec::with_capacity(deps.len());
        for dep in deps {
            let name = names.get(dep).cloned().unwrap_or_else(|| dep.to_string());
            match ctx.result_of(*dep).await {
                Some(result) if result.status == TaskStatus::Completed => {
                    memory.push(format!("Result of '{name}':\n{}", result.output_text));
                }
                _ => return Err(name),
            }
        }
        Ok(memory)
    }

    async fn execute_one(
        &self,
        agents: &HashMap<String, AgentSpec>,
        task: &mut Task,
        memory: Vec<String>,
        ctx: &Arc<ExecutionContext>,
    ) {
        self.mark_running(task, ctx).await;
        let agent = &agents[&task.agent_name];
        let result = self.executor.execute(agent, task, memory, ctx).await;
        self.settle(task, result, ctx).await;
    }

    async fn mark_running(&self, task: &mut Task, ctx: &ExecutionContext) {
        if task.transition_to(TaskStatus::Running, None).is_ok() {
            ctx.audit
                .record(AuditKind::TaskStateChange, Some(task.id), Some(&task.agent_name), "pending -> running")
                .await;
        }
    }

    /// Apply an execution outcome to the task and the shared result map.
    async fn settle(&self, task: &mut Task, outcome: EngineResult<TaskResult>, ctx: &ExecutionContext) {
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!(task = %task.name, error = %err, "task failed");
                TaskResult::failed(task.id, err.to_string())
            }
        };
        self.finish_task(task, result, ctx).await;
    }

    async fn finish_task(&self, task: &mut Task, result: TaskResult, ctx: &ExecutionContext) {
        let from = task.status.as_str();
        let status = result.status;
        ctx.record_result(result.clone()).await;
        if task.transition_to(status, Some(result)).is_ok() {
            ctx.audit
                .record(
                    AuditKind::TaskStateChange,
                    Some(task.id),
                    Some(&task.agent_name),
                    format!("{from} -> {}", status.as_str()),
                )
                .await;
        }
    }
}

enum DependencyState {
    /// Every dependency completed.
    Ready,
    /// A dependency failed or was skipped.
    Blocked(Uuid),
    /// Some dependency is still pending or running.
    Waiting,
}

fn dependency_state(deps: &[Uuid], index_of: &HashMap<Uuid, usize>, tasks: &[Task]) -> DependencyState {
    for dep in deps {
        let Some(&i) = index_of.get(dep) else {
            return DependencyState::Blocked(*dep);
        };
        match tasks[i].status {
            TaskStatus::Completed => {}
            TaskStatus::Failed | TaskStatus::Skipped => return DependencyState::Blocked(*dep),
            TaskStatus::Pending | TaskStatus::Running => return DependencyState::Waiting,
        }
    }
    DependencyState::Ready
}

/// Pre-run validation: agent and task shape, agent binding, dependency
/// references and acyclicity. Returns the agents keyed by name.
fn validate_run(agents: &[AgentSpec], tasks: &[Task]) -> EngineResult<HashMap<String, AgentSpec>> {
    let mut by_name: HashMap<String, AgentSpec> = HashMap::new();
    for agent in agents {
        agent.validate().map_err(EngineError::ValidationFailed)?;
        if by_name.insert(agent.name.clone(), agent.clone()).is_some() {
            return Err(EngineError::ValidationFailed(format!(
                "duplicate agent name '{}'",
                agent.name
            )));
        }
    }

    let ids: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();
    for task in tasks {
        task.validate().map_err(EngineError::ValidationFailed)?;
        if !by_name.contains_key(&task.agent_name) {
            return Err(EngineError::AgentNotFound(task.agent_name.clone()));
        }
        for dep in &task.depends_on {
            if !ids.contains(dep) {
                return Err(EngineError::TaskDependency(format!(
                    "task '{}' depends on unknown task {dep}",
                    task.name
                )));
            }
        }
    }

    detect_cycle(tasks)?;
    Ok(by_name)
}

/// Depth-first cycle detection over the dependency graph. On a cycle the
/// error carries the offending path, closing back on the repeated node.
fn detect_cycle(tasks: &[Task]) -> EngineResult<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Gray,
        Black,
    }

    let index_of: HashMap<Uuid, usize> = tasks.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
    let mut marks = vec![Mark::White; tasks.len()];

    fn visit(
        i: usize,
        tasks: &[Task],
        index_of: &HashMap<Uuid, usize>,
        marks: &mut [Mark],
        path: &mut Vec<Uuid>,
    ) -> EngineResult<()> {
        marks[i] = Mark::Gray;
        path.push(tasks[i].id);
        for dep in &tasks[i].depends_on {
            let Some(&j) = index_of.get(dep) else { continue };
            match marks[j] {
                Mark::Black => {}
                Mark::Gray => {
                    let start = path.iter().position(|id| *id == *dep).unwrap_or(0);
                    let mut cycle: Vec<Uuid> = path[start..].to_vec();
                    cycle.push(*dep);
                    return Err(EngineError::DependencyCycle(cycle));
                }
                Mark::White => visit(j, tasks, index_of, marks, path)?,
            }
        }
        path.pop();
        marks[i] = Mark::Black;
        Ok(())
    }

    let mut path = Vec::new();
    for i in 0..tasks.len() {
        if marks[i] == Mark::White {
            visit(i, tasks, &index_of, &mut marks, &mut path)?;
        }
    }
    Ok(())
}
