use super::{Node, NodeName};
use crate::brain::ChatClient;
use crate::decision::ResearchDecision;
use crate::error::{NodeError, ToolError};
use crate::prompts;
use crate::registry::{RESEARCH_TOOL, ToolRegistry};
use crate::state::{RunContext, StateField, StateUpdate, WorkflowState};
use crate::types::{AssistantTurn, ChatRequest, ChatResponse, Message};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Decides between answering directly and delegating to the researcher, and
/// writes the final answer once research comes back.
///
/// The mode follows from the history: a trailing tool result means the
/// researcher has handed its findings back and the answer must be synthesized.
pub struct OrchestratorNode {
    client: Arc<dyn ChatClient>,
    registry: Arc<ToolRegistry>,
}

impl OrchestratorNode {
    pub fn new(client: Arc<dyn ChatClient>, registry: Arc<ToolRegistry>) -> Self {
        Self { client, registry }
    }

    async fn decide(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        let tools = self.registry.definitions(&[RESEARCH_TOOL])?;
        let request = ChatRequest::new(
            prompts::orchestrator_prompt(Utc::now()),
            state.message_history.clone(),
        )
        .with_tools(tools, false);
        let response = self.client.chat(request).await?;

        match response.turn() {
            AssistantTurn::ToolCalls(calls) => {
                let call = &calls[0];
                if call.id.is_empty() {
                    return Err(NodeError::MissingToolCallId);
                }
                if call.name != RESEARCH_TOOL {
                    return Err(NodeError::InvalidDecision {
                        reason: format!("unexpected tool '{}'", call.name),
                    });
                }
                let decision = self.validate_decision(&call.arguments).await?;
                info!(
                    subtasks = decision.subtasks.len(),
                    call_id = %call.id,
                    "Delegating to researcher"
                );
                // Record only the honored call; extra calls never get a result.
                let message =
                    Message::assistant_tool_calls(response.content.clone(), vec![call.clone()]);
                Ok(StateUpdate::new()
                    .should_delegate(true)
                    .planned_subtasks(decision.subtasks)
                    .sub_agent_call_id(call.id.clone())
                    .messages(vec![message]))
            }
            AssistantTurn::Text(text) => {
                if text.trim().is_empty() {
                    return Err(NodeError::EmptyOrchestratorResponse);
                }
                info!("Answering directly");
                Ok(final_answer(&response, text))
            }
        }
    }

    async fn validate_decision(&self, arguments: &str) -> Result<ResearchDecision, NodeError> {
        let validated = self
            .registry
            .invoke(RESEARCH_TOOL, arguments)
            .await
            .map_err(|e| match e {
                ToolError::InvalidArguments { reason, .. } => NodeError::InvalidDecision { reason },
                other => NodeError::Tool(other),
            })?;
        serde_json::from_str(&validated).map_err(|e| NodeError::InvalidDecision {
            reason: e.to_string(),
        })
    }

    async fn synthesize(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        let request = ChatRequest::new(
            prompts::orchestrator_prompt(Utc::now()),
            state.message_history.clone(),
        );
        let response = self.client.chat(request).await?;
        let text = response.content.as_deref().unwrap_or_default();
        if text.trim().is_empty() {
            return Err(NodeError::EmptyOrchestratorResponse);
        }
        info!("Synthesized final answer from research");
        Ok(final_answer(&response, text))
    }
}

fn final_answer(response: &ChatResponse, text: &str) -> StateUpdate {
    debug!(
        model = %response.model,
        tokens = response.usage.total(),
        "Orchestrator produced final answer"
    );
    StateUpdate::new()
        .should_delegate(false)
        .response(text)
        .messages(vec![Message::assistant(text)])
}

#[async_trait]
impl Node for OrchestratorNode {
    fn name(&self) -> NodeName {
        NodeName::Orchestrator
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::MessageHistory]
    }

    fn writes(&self) -> &'static [StateField] {
        &[
            StateField::Response,
            StateField::MessageHistory,
            StateField::ShouldDelegate,
            StateField::PlannedSubtasks,
            StateField::SubAgentCallId,
        ]
    }

    async fn run(
        &self,
        state: &WorkflowState,
        _ctx: &mut RunContext,
    ) -> Result<StateUpdate, NodeError> {
        let synthesis = state
            .message_history
            .last()
            .is_some_and(Message::is_tool_result);
        debug!(synthesis, history = state.message_history.len(), "Orchestrator step");
        if synthesis {
            self.synthesize(state).await
        } else {
            self.decide(state).await
        }
    }
}
