//! `ResearchAgent`: a research graph bundled with its run settings.

use crate::error::{AgentError, Result};
use crate::graph::ResearchGraph;
use crate::state::{RunConfig, WorkflowState};
use std::sync::Arc;
use tracing::info;

/// Answers questions by running the research graph.
///
/// Cheap to clone; clones share the compiled graph and its checkpointer.
#[derive(Debug, Clone)]
pub struct ResearchAgent {
    graph: Arc<ResearchGraph>,
    config: RunConfig,
}

impl ResearchAgent {
    pub fn new(graph: Arc<ResearchGraph>, config: RunConfig) -> Self {
        Self { graph, config }
    }

    pub fn graph(&self) -> &Arc<ResearchGraph> {
        &self.graph
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.config
    }

    /// Answer a standalone question.
    pub async fn ask(&self, query: &str) -> Result<String> {
        info!(query_len = query.len(), "Answering query");
        let state = self.graph.invoke(query, &self.config).await?;
        response_of(state)
    }

    /// Answer a question as the next turn of `thread_id`.
    pub async fn ask_in_thread(&self, thread_id: &str, query: &str) -> Result<String> {
        info!(thread = %thread_id, query_len = query.len(), "Answering query in thread");
        let state = self
            .graph
            .invoke_in_thread(thread_id, query, &self.config)
            .await?;
        response_of(state)
    }
}

fn response_of(state: WorkflowState) -> Result<String> {
    if state.response.trim().is_empty() {
        return Err(AgentError::EmptyResponse.into());
    }
    Ok(state.response)
}
