//! Application layer: the agent loop and the process orchestrator.

pub mod agent_executor;
pub mod orchestrator;

pub use agent_executor::AgentExecutor;
pub use orchestrator::{ProcessOrchestrator, RunOutcome};
