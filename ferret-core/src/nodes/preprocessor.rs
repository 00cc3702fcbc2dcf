use super::{Node, NodeName};
use crate::error::NodeError;
use crate::state::{RunContext, StateField, StateUpdate, WorkflowState};
use crate::types::Message;
use async_trait::async_trait;
use tracing::debug;

/// Turns the raw query into the first user turn of the conversation.
pub struct PreprocessorNode;

#[async_trait]
impl Node for PreprocessorNode {
    fn name(&self) -> NodeName {
        NodeName::Preprocessor
    }

    // A blank query is reported as `MissingQuery` by the node itself.
    fn reads(&self) -> &'static [StateField] {
        &[]
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::MessageHistory]
    }

    async fn run(
        &self,
        state: &WorkflowState,
        _ctx: &mut RunContext,
    ) -> Result<StateUpdate, NodeError> {
        if state.query.trim().is_empty() {
            return Err(NodeError::MissingQuery);
        }
        debug!(query_len = state.query.len(), "Preprocessing query");
        Ok(StateUpdate::new().messages(vec![Message::user(state.query.clone())]))
    }
}
