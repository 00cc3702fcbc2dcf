//! Workflow graph engine.
//!
//! [`GraphBuilder`] collects nodes and edges and `compile()` validates the
//! topology into an immutable [`ResearchGraph`]. A run starts at the entry node
//! with a fresh [`WorkflowState`], executes one node at a time, folds each node's
//! update into the state and follows the node's outgoing edge until it reaches
//! [`Target::End`].
//!
//! Every failure stops the run and is reported as a [`GraphExecutionError`]
//! naming the node and carrying the state accumulated so far.

use crate::brain::ChatClient;
use crate::checkpoint::{Checkpointer, InMemoryCheckpointer};
use crate::error::{CompileError, FerretError, GraphErrorKind, GraphExecutionError};
use crate::nodes::{
    Node, NodeName, OrchestratorNode, PreprocessorNode, ResearcherNode, ToolExecutionNode,
};
use crate::registry::ToolRegistry;
use crate::state::{RunConfig, RunContext, StateField, WorkflowState};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Default maximum number of node executions in one run.
pub const DEFAULT_STEP_LIMIT: usize = 50;

/// Node executions a standard run needs to reach the researcher's forced
/// handoff and the final synthesis: two per research iteration plus the fixed
/// preprocess, decide, start, hand-back and synthesize steps, with slack.
pub fn research_step_budget(max_iterations: usize) -> usize {
    max_iterations.saturating_mul(2).saturating_add(8)
}

/// Where control goes after a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Node(NodeName),
    End,
}

/// Pure routing function evaluated on the state after a node's update is applied.
pub type Router = fn(&WorkflowState) -> Target;

enum Edge {
    Direct(Target),
    Conditional { router: Router, targets: Vec<Target> },
}

impl Edge {
    fn route(&self, state: &WorkflowState) -> Target {
        match self {
            Edge::Direct(target) => *target,
            Edge::Conditional { router, .. } => router(state),
        }
    }

    fn targets(&self) -> &[Target] {
        match self {
            Edge::Direct(target) => std::slice::from_ref(target),
            Edge::Conditional { targets, .. } => targets,
        }
    }
}

/// Builder for a [`ResearchGraph`].
pub struct GraphBuilder {
    nodes: HashMap<NodeName, Arc<dyn Node>>,
    edges: HashMap<NodeName, Edge>,
    entry: Option<NodeName>,
    duplicate: Option<NodeName>,
    step_limit: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            duplicate: None,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    /// Register a node under its own name.
    pub fn add_node(mut self, node: impl Node + 'static) -> Self {
        let name = node.name();
        if self.nodes.insert(name, Arc::new(node)).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(name);
        }
        self
    }

    /// The node that receives the fresh state.
    pub fn set_entry(mut self, name: NodeName) -> Self {
        self.entry = Some(name);
        self
    }

    /// Unconditional edge. Replaces any edge already leaving `from`.
    pub fn add_edge(mut self, from: NodeName, to: Target) -> Self {
        self.edges.insert(from, Edge::Direct(to));
        self
    }

    /// Conditional edge. `targets` lists every target `router` may return.
    pub fn add_conditional_edge(
        mut self,
        from: NodeName,
        router: Router,
        targets: impl IntoIterator<Item = Target>,
    ) -> Self {
        self.edges.insert(
            from,
            Edge::Conditional {
                router,
                targets: targets.into_iter().collect(),
            },
        );
        self
    }

    pub fn step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// Validate the topology and freeze it.
    pub fn compile(self) -> Result<ResearchGraph, CompileError> {
        if let Some(name) = self.duplicate {
            return Err(CompileError::DuplicateNode(name));
        }
        let entry = self.entry.ok_or(CompileError::MissingEntry)?;
        if !self.nodes.contains_key(&entry) {
            return Err(CompileError::UnknownNode(entry));
        }
        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(CompileError::UnknownNode(*from));
            }
            for target in edge.targets() {
                if let Target::Node(to) = target
                    && !self.nodes.contains_key(to)
                {
                    return Err(CompileError::UnknownNode(*to));
                }
            }
        }
        if let Some(name) = self.nodes.keys().find(|n| !self.edges.contains_key(n)) {
            return Err(CompileError::NoOutgoingEdge(*name));
        }

        Ok(ResearchGraph {
            nodes: self.nodes,
            edges: self.edges,
            entry,
            step_limit: self.step_limit,
            checkpointer: Arc::new(InMemoryCheckpointer::new()),
        })
    }
}

/// After the orchestrator: research if it delegated, otherwise finish.
pub fn route_after_orchestrator(state: &WorkflowState) -> Target {
    if state.should_delegate {
        Target::Node(NodeName::Researcher)
    } else {
        Target::End
    }
}

/// After the researcher: run its tool calls, or return to the orchestrator.
pub fn route_after_researcher(state: &WorkflowState) -> Target {
    if state.should_continue {
        Target::Node(NodeName::ToolExecution)
    } else {
        Target::Node(NodeName::Orchestrator)
    }
}

/// A compiled, immutable workflow graph. Safe to share across concurrent runs.
pub struct ResearchGraph {
    nodes: HashMap<NodeName, Arc<dyn Node>>,
    edges: HashMap<NodeName, Edge>,
    entry: NodeName,
    step_limit: usize,
    checkpointer: Arc<dyn Checkpointer>,
}

impl std::fmt::Debug for ResearchGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchGraph")
            .field("entry", &self.entry)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("step_limit", &self.step_limit)
            .finish()
    }
}

impl ResearchGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// The research topology:
    ///
    /// ```text
    /// preprocessor -> orchestrator -> END
    ///                      |  ^
    ///                      v  |
    ///                  researcher <-> tool_execution
    /// ```
    ///
    /// `researcher_tools` names the registry tools bound to researcher calls.
    pub fn standard(
        client: Arc<dyn ChatClient>,
        registry: Arc<ToolRegistry>,
        researcher_tools: Vec<String>,
    ) -> Result<Self, CompileError> {
        GraphBuilder::new()
            .add_node(PreprocessorNode)
            .add_node(OrchestratorNode::new(client.clone(), registry.clone()))
            .add_node(ResearcherNode::new(client, registry.clone(), researcher_tools))
            .add_node(ToolExecutionNode::new(registry))
            .set_entry(NodeName::Preprocessor)
            .add_edge(
                NodeName::Preprocessor,
                Target::Node(NodeName::Orchestrator),
            )
            .add_conditional_edge(
                NodeName::Orchestrator,
                route_after_orchestrator,
                [Target::Node(NodeName::Researcher), Target::End],
            )
            .add_conditional_edge(
                NodeName::Researcher,
                route_after_researcher,
                [
                    Target::Node(NodeName::ToolExecution),
                    Target::Node(NodeName::Orchestrator),
                ],
            )
            .add_edge(
                NodeName::ToolExecution,
                Target::Node(NodeName::Researcher),
            )
            .compile()
    }

    /// Replace the maximum number of node executions per run.
    ///
    /// A run is always allowed [`research_step_budget`] steps for its iteration
    /// budget, so the limit never cuts the research loop short.
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// Replace the checkpointer used by [`ResearchGraph::invoke_in_thread`].
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = checkpointer;
        self
    }

    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    /// Run the graph to completion for a single query.
    pub async fn invoke(
        &self,
        query: impl Into<String>,
        config: &RunConfig,
    ) -> Result<WorkflowState, GraphExecutionError> {
        self.run(WorkflowState::new(query), config).await
    }

    /// Run a query as the next turn of a conversation thread.
    ///
    /// The thread's previous message history is restored before the run and the
    /// final state is saved once it succeeds. A failed run saves nothing.
    pub async fn invoke_in_thread(
        &self,
        thread_id: &str,
        query: impl Into<String>,
        config: &RunConfig,
    ) -> Result<WorkflowState, FerretError> {
        let mut state = WorkflowState::new(query);
        if let Some(prior) = self.checkpointer.get(thread_id).await? {
            debug!(
                thread = %thread_id,
                messages = prior.message_history.len(),
                "Restoring thread history"
            );
            state.message_history = prior.message_history;
        }
        let state = self.run(state, config).await?;
        self.checkpointer.put(thread_id, &state).await?;
        Ok(state)
    }

    /// Execute from the entry node on `state` until a route reaches `End`.
    pub async fn run(
        &self,
        mut state: WorkflowState,
        config: &RunConfig,
    ) -> Result<WorkflowState, GraphExecutionError> {
        let run_id = uuid::Uuid::new_v4();
        let mut ctx = RunContext::new(config);
        let mut current = self.entry;
        let mut steps = 0usize;
        let step_limit = self
            .step_limit
            .max(research_step_budget(config.max_iterations));
        info!(
            %run_id,
            max_iterations = config.max_iterations,
            step_limit,
            "Graph run started"
        );

        loop {
            if steps == step_limit {
                return Err(GraphExecutionError::new(
                    current,
                    GraphErrorKind::StepLimitExceeded { limit: step_limit },
                    state,
                ));
            }
            steps += 1;

            let Some(node) = self.nodes.get(&current) else {
                return Err(GraphExecutionError::new(
                    current,
                    GraphErrorKind::UnknownTarget { target: current },
                    state,
                ));
            };

            let missing = state.missing(node.reads());
            if !missing.is_empty() {
                return Err(GraphExecutionError::new(
                    current,
                    GraphErrorKind::MissingFields { fields: missing },
                    state,
                ));
            }

            debug!(%run_id, node = %current, step = steps, "Running node");
            let update = match node.run(&state, &mut ctx).await {
                Ok(update) => update,
                Err(err) => return Err(GraphExecutionError::new(current, err, state)),
            };

            let undeclared: Vec<StateField> = update
                .touched_fields()
                .into_iter()
                .filter(|field| !node.writes().contains(field))
                .collect();
            if !undeclared.is_empty() {
                return Err(GraphExecutionError::new(
                    current,
                    GraphErrorKind::UndeclaredWrite { fields: undeclared },
                    state,
                ));
            }
            state.apply(update);

            let next = self
                .edges
                .get(&current)
                .map(|edge| edge.route(&state))
                .unwrap_or(Target::End);
            match next {
                Target::End => {
                    info!(%run_id, steps, "Graph run finished");
                    return Ok(state);
                }
                Target::Node(name) => current = name,
            }
        }
    }
}
