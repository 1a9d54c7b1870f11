//! Workflow file parsing.
//!
//! A workflow is a YAML document declaring agents and tasks by name.
//! Task dependencies reference task names; they are resolved to ids here
//! so the orchestrator only ever sees a validated graph.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{AgentSpec, CollectionConfig, ProcessMode, Task};
use crate::domain::ports::Tool;

/// Parsed workflow document.
#[derive(Debug, Deserialize)]
pub struct WorkflowFile {
    /// "sequential" or "parallel".
    #[serde(default = "default_process")]
    pub process: String,
    pub agents: Vec<AgentEntry>,
    pub tasks: Vec<TaskEntry>,
}

fn default_process() -> String {
    "sequential".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    /// Knowledge source files, ingested before the run.
    #[serde(default)]
    pub knowledge: Vec<PathBuf>,
    /// Tool names resolved against the tool registry.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub self_reflect: bool,
    #[serde(default)]
    pub verbose: bool,
    pub max_iterations: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TaskEntry {
    pub name: String,
    pub description: String,
    pub expected_output: String,
    /// Name of the executing agent.
    pub agent: String,
    /// Names of tasks this one depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl WorkflowFile {
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&text).map_err(|e| {
            EngineError::Configuration(format!("invalid workflow file {}: {e}", path.display()))
        })
    }

    /// Resolve the document into orchestrator inputs.
    ///
    /// Agents with knowledge files get `scope` as their retrieval
    /// collection; tool names resolve through `lookup_tool`.
    pub fn resolve(
        &self,
        scope: &CollectionConfig,
        lookup_tool: impl Fn(&str) -> Option<Arc<dyn Tool>>,
    ) -> EngineResult<(Vec<AgentSpec>, Vec<Task>, ProcessMode)> {
        let mode = ProcessMode::parse(&self.process).ok_or_else(|| {
            EngineError::Configuration(format!(
                "unknown process mode '{}', expected sequential or parallel",
                self.process
            ))
        })?;

        let mut agents = Vec::with_capacity(self.agents.len());
        for entry in &self.agents {
            let mut agent = AgentSpec::new(&entry.name, &entry.role, &entry.goal)
                .with_backstory(&entry.backstory)
                .with_self_reflect(entry.self_reflect)
                .with_verbose(entry.verbose);
            if let Some(max) = entry.max_iterations {
                agent = agent.with_max_iterations(max);
            }
            if !entry.knowledge.is_empty() {
                agent = agent.with_knowledge(entry.knowledge.clone(), scope.clone());
            }
            for tool_name in &entry.tools {
                let tool = lookup_tool(tool_name).ok_or_else(|| {
                    EngineError::Configuration(format!(
                        "agent '{}' references unknown tool '{tool_name}'",
                        entry.name
                    ))
                })?;
                agent = agent.with_tool(tool);
            }
            agents.push(agent);
        }

        let mut tasks: Vec<Task> = Vec::with_capacity(self.tasks.len());
        let mut id_by_name = HashMap::new();
        for entry in &self.tasks {
            let task = Task::new(&entry.name, &entry.description, &entry.expected_output, &entry.agent);
            if id_by_name.insert(entry.name.clone(), task.id).is_some() {
                return Err(EngineError::ValidationFailed(format!(
                    "duplicate task name '{}'",
                    entry.name
                )));
            }
            tasks.push(task);
        }
        for (task, entry) in tasks.iter_mut().zip(&self.tasks) {
            for dep_name in &entry.depends_on {
                let dep_id = id_by_name.get(dep_name).ok_or_else(|| {
                    EngineError::TaskDependency(format!(
                        "task '{}' depends on unknown task '{dep_name}'",
                        entry.name
                    ))
                })?;
                task.depends_on.push(*dep_id);
            }
        }

        Ok((agents, tasks, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = r"
process: parallel
agents:
  - name: researcher
    role: Research Analyst
    goal: Gather the relevant facts
    knowledge:
      - notes/facts.txt
    self_reflect: true
  - name: writer
    role: Technical Writer
    goal: Produce the report
tasks:
  - name: research
    description: Collect facts about the topic
    expected_output: A fact list
    agent: researcher
  - name: write
    description: Write the report from the facts
    expected_output: A two-paragraph report
    agent: writer
    depends_on: [research]
";

    fn no_tools(_: &str) -> Option<Arc<dyn Tool>> {
        None
    }

    #[test]
    fn parses_and_resolves_dependencies() {
        let file: WorkflowFile = serde_yaml::from_str(WORKFLOW).unwrap();
        let scope = CollectionConfig::memory("kb");
        let (agents, tasks, mode) = file.resolve(&scope, no_tools).unwrap();

        assert_eq!(mode, ProcessMode::Parallel);
        assert_eq!(agents.len(), 2);
        assert!(agents[0].self_reflect);
        assert_eq!(agents[0].knowledge_scope.as_ref().unwrap().collection_name, "kb");
        assert!(agents[1].knowledge_scope.is_none());

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].depends_on, vec![tasks[0].id]);
    }

    #[test]
    fn unknown_dependency_name_is_rejected() {
        let mut file: WorkflowFile = serde_yaml::from_str(WORKFLOW).unwrap();
        file.tasks[1].depends_on = vec!["ghost".to_string()];
        let scope = CollectionConfig::memory("kb");
        let err = file.resolve(&scope, no_tools).unwrap_err();
        assert!(matches!(err, EngineError::TaskDependency(_)));
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let mut file: WorkflowFile = serde_yaml::from_str(WORKFLOW).unwrap();
        file.agents[0].tools = vec!["laser".to_string()];
        let scope = CollectionConfig::memory("kb");
        let err = file.resolve(&scope, no_tools).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn bad_process_mode_is_rejected() {
        let mut file: WorkflowFile = serde_yaml::from_str(WORKFLOW).unwrap();
        file.process = "waves".to_string();
        let scope = CollectionConfig::memory("kb");
        assert!(file.resolve(&scope, no_tools).is_err());
    }
}
