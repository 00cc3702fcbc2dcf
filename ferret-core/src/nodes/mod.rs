//! Workflow nodes: one step of the research graph each.
//!
//! A node reads the shared [`WorkflowState`] and returns a [`StateUpdate`]; it never
//! mutates the state itself. `reads()` lists the fields that must be present before
//! the node runs and `writes()` the fields its update may touch. The graph engine
//! enforces both.

mod orchestrator;
mod preprocessor;
mod researcher;
mod tool_execution;

pub use orchestrator::OrchestratorNode;
pub use preprocessor::PreprocessorNode;
pub use researcher::ResearcherNode;
pub use tool_execution::ToolExecutionNode;

use crate::error::NodeError;
use crate::state::{RunContext, StateField, StateUpdate, WorkflowState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifies a node in the research graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeName {
    Preprocessor,
    Orchestrator,
    Researcher,
    ToolExecution,
}

impl NodeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeName::Preprocessor => "preprocessor",
            NodeName::Orchestrator => "orchestrator",
            NodeName::Researcher => "researcher",
            NodeName::ToolExecution => "tool_execution",
        }
    }
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step in the research graph.
#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> NodeName;

    /// Fields that must hold a value before the node runs.
    fn reads(&self) -> &'static [StateField];

    /// Fields the node's update may set.
    fn writes(&self) -> &'static [StateField];

    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &mut RunContext,
    ) -> Result<StateUpdate, NodeError>;
}
