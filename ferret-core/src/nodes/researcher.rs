use super::{Node, NodeName};
use crate::brain::ChatClient;
use crate::error::NodeError;
use crate::prompts::{self, MAX_ITERATION_REACHED};
use crate::registry::ToolRegistry;
use crate::sources::{Source, format_synthesis, parse_research_results};
use crate::state::{RunContext, StateField, StateUpdate, WorkflowState};
use crate::types::{AssistantTurn, ChatRequest, ChatResponse, Message};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The iterative research sub-agent.
///
/// Each visit is one iteration: the model either calls a search tool again or
/// replies in text, which hands the research back to the orchestrator. Once
/// `current_iteration` exceeds the run's budget the node stops calling the model
/// and hands back a summary of everything found so far.
pub struct ResearcherNode {
    client: Arc<dyn ChatClient>,
    registry: Arc<ToolRegistry>,
    tools: Vec<String>,
}

impl ResearcherNode {
    /// `tools` names the registry tools bound on every researcher call.
    pub fn new(
        client: Arc<dyn ChatClient>,
        registry: Arc<ToolRegistry>,
        tools: Vec<String>,
    ) -> Self {
        Self {
            client,
            registry,
            tools,
        }
    }

    async fn call_model(&self, messages: Vec<Message>) -> Result<ChatResponse, NodeError> {
        let names: Vec<&str> = self.tools.iter().map(String::as_str).collect();
        let tools = self.registry.definitions(&names)?;
        let request =
            ChatRequest::new(prompts::researcher_prompt(Utc::now()), messages).with_tools(tools, true);
        Ok(self.client.chat(request).await?)
    }

    async fn start(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        let request = Message::user(serde_json::json!(state.planned_subtasks).to_string());
        let mut messages = state.researcher_history.clone();
        messages.push(request.clone());

        let response = self.call_model(messages).await?;
        match response.turn() {
            AssistantTurn::ToolCalls(calls) => {
                debug!(tool_calls = calls.len(), "Researcher started");
                Ok(StateUpdate::new()
                    .current_iteration(1)
                    .researcher_messages(vec![request, response.to_message()])
                    .should_continue(true))
            }
            AssistantTurn::Text(_) => Err(NodeError::ExpectedToolCall),
        }
    }

    async fn step(
        &self,
        state: &WorkflowState,
        ctx: &mut RunContext,
    ) -> Result<StateUpdate, NodeError> {
        let response = self.call_model(state.researcher_history.clone()).await?;
        match response.turn() {
            AssistantTurn::ToolCalls(calls) => {
                let found = previous_findings(&state.researcher_history)?;
                debug!(
                    iteration = state.current_iteration,
                    sources = found.len(),
                    tool_calls = calls.len(),
                    "Researcher continuing"
                );
                ctx.findings.extend(found);
                Ok(StateUpdate::new()
                    .current_iteration(state.current_iteration + 1)
                    .researcher_messages(vec![response.to_message()])
                    .should_continue(true))
            }
            AssistantTurn::Text(text) => {
                info!(iteration = state.current_iteration, "Researcher finished");
                Ok(hand_back(state, text.to_string(), response.to_message()))
            }
        }
    }

    fn force_hand_back(&self, state: &WorkflowState, ctx: &mut RunContext) -> StateUpdate {
        let findings = std::mem::take(&mut ctx.findings);
        info!(
            iteration = state.current_iteration,
            max_iterations = ctx.max_iterations,
            sources = findings.len(),
            "Iteration limit reached, handing back findings"
        );
        hand_back(
            state,
            format_synthesis(&findings),
            Message::assistant(MAX_ITERATION_REACHED),
        )
    }
}

/// Return research to the orchestrator as the answer to its delegation call.
fn hand_back(state: &WorkflowState, content: String, last_message: Message) -> StateUpdate {
    StateUpdate::new()
        .messages(vec![Message::tool_result(
            content,
            state.sub_agent_call_id.clone(),
        )])
        .researcher_messages(vec![last_message])
        .end_handoff()
}

/// Parse the tool results that answer the researcher's most recent tool calls.
fn previous_findings(history: &[Message]) -> Result<Vec<Source>, NodeError> {
    let trailing = history
        .iter()
        .rev()
        .take_while(|m| m.is_tool_result())
        .count();
    if trailing == 0 {
        return Err(NodeError::MissingToolResult);
    }

    let mut found = Vec::new();
    for message in &history[history.len() - trailing..] {
        let sources = parse_research_results(message.text().unwrap_or_default())?;
        if sources.is_empty() {
            warn!("Tool result contained no sources");
        }
        found.extend(sources);
    }
    Ok(found)
}

#[async_trait]
impl Node for ResearcherNode {
    fn name(&self) -> NodeName {
        NodeName::Researcher
    }

    // The delegation call id is checked by `run` so its absence surfaces as
    // `MissingSubAgentCallId`.
    fn reads(&self) -> &'static [StateField] {
        &[]
    }

    fn writes(&self) -> &'static [StateField] {
        &[
            StateField::MessageHistory,
            StateField::ShouldContinue,
            StateField::CurrentIteration,
            StateField::PlannedSubtasks,
            StateField::SubAgentCallId,
            StateField::ResearcherHistory,
        ]
    }

    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &mut RunContext,
    ) -> Result<StateUpdate, NodeError> {
        // Research always answers this delegation call.
        if state.sub_agent_call_id.is_empty() {
            return Err(NodeError::MissingSubAgentCallId);
        }
        if state.current_iteration == 0 {
            self.start(state).await
        } else if state.current_iteration > ctx.max_iterations {
            Ok(self.force_hand_back(state, ctx))
        } else {
            self.step(state, ctx).await
        }
    }
}
