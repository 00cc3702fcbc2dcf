use super::{Node, NodeName};
use crate::error::NodeError;
use crate::registry::ToolRegistry;
use crate::state::{RunContext, StateField, StateUpdate, WorkflowState};
use crate::types::Message;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Executes the researcher's pending tool calls and records their results.
pub struct ToolExecutionNode {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutionNode {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Node for ToolExecutionNode {
    fn name(&self) -> NodeName {
        NodeName::ToolExecution
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::ResearcherHistory]
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::ResearcherHistory]
    }

    async fn run(
        &self,
        state: &WorkflowState,
        _ctx: &mut RunContext,
    ) -> Result<StateUpdate, NodeError> {
        let calls = state
            .researcher_history
            .last()
            .map(Message::tool_calls)
            .filter(|calls| !calls.is_empty())
            .ok_or(NodeError::NoPendingToolCalls)?;

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            info!(tool = %call.name, call_id = %call.id, "Running researcher tool call");
            let output = self.registry.invoke(&call.name, &call.arguments).await?;
            debug!(tool = %call.name, bytes = output.len(), "Tool call finished");
            results.push(Message::tool_result(output, call.id.clone()));
        }
        Ok(StateUpdate::new().researcher_messages(results))
    }
}
