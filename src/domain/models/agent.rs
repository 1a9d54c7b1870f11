//! Agent domain model.
//!
//! An agent has an identity, a role/goal description, an optional knowledge
//! scope (one vector collection) and an optional tool set. Agent specs are
//! created at configuration time and are immutable for the lifetime of one
//! orchestration run.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::collection::CollectionConfig;
use crate::domain::ports::tool::Tool;

/// Default cap on reasoning/tool-call iterations per task.
const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Immutable agent specification.
#[derive(Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: Uuid,
    pub name: String,
    /// Role description, e.g. "Research Synthesizer".
    pub role: String,
    /// What the agent is trying to achieve.
    pub goal: String,
    /// Persona background injected into the system context.
    pub backstory: String,
    /// Source files to ingest into the knowledge scope before the run.
    #[serde(default)]
    pub knowledge: Vec<PathBuf>,
    /// Vector collection this agent retrieves from. At most one.
    pub knowledge_scope: Option<CollectionConfig>,
    /// Capability handles available to the execution loop.
    #[serde(skip)]
    pub tools: Vec<Arc<dyn Tool>>,
    /// Run one self-critique pass over a draft answer before finalizing.
    #[serde(default)]
    pub self_reflect: bool,
    /// Log reasoning turns at info level.
    #[serde(default)]
    pub verbose: bool,
    /// Iteration budget for the reasoning/tool loop.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

const fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

impl std::fmt::Debug for AgentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSpec")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("knowledge_scope", &self.knowledge_scope)
            .field("tools", &self.tools.iter().map(|t| t.name().to_string()).collect::<Vec<_>>())
            .field("self_reflect", &self.self_reflect)
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, role: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role: role.into(),
            goal: goal.into(),
            backstory: String::new(),
            knowledge: Vec::new(),
            knowledge_scope: None,
            tools: Vec::new(),
            self_reflect: false,
            verbose: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_knowledge(mut self, paths: Vec<PathBuf>, scope: CollectionConfig) -> Self {
        self.knowledge = paths;
        self.knowledge_scope = Some(scope);
        self
    }

    pub fn with_knowledge_scope(mut self, scope: CollectionConfig) -> Self {
        self.knowledge_scope = Some(scope);
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_self_reflect(mut self, enabled: bool) -> Self {
        self.self_reflect = enabled;
        self
    }

    pub fn with_verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Find a tool by name.
    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Agent name cannot be empty".to_string());
        }
        if self.role.trim().is_empty() {
            return Err("Agent role cannot be empty".to_string());
        }
        if !self.knowledge.is_empty() && self.knowledge_scope.is_none() {
            return Err(format!(
                "Agent '{}' lists knowledge files but has no knowledge_scope collection",
                self.name
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let agent = AgentSpec::new("Searcher", "Search Specialist", "Find facts fast");
        assert!(!agent.self_reflect);
        assert!(agent.tools.is_empty());
        assert_eq!(agent.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(agent.validate().is_ok());
    }

    #[test]
    fn knowledge_without_scope_is_invalid() {
        let mut agent = AgentSpec::new("A", "R", "G");
        agent.knowledge = vec![PathBuf::from("notes.txt")];
        assert!(agent.validate().is_err());

        let agent = agent.with_knowledge_scope(CollectionConfig::memory("kb"));
        assert!(agent.validate().is_ok());
    }

    #[test]
    fn empty_name_is_invalid() {
        let agent = AgentSpec::new("  ", "R", "G");
        assert!(agent.validate().is_err());
    }
}
