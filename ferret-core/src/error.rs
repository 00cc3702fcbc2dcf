//! Error types for the Ferret engine.
//!
//! Uses `thiserror` for public API error types. Every failure inside the engine is
//! one of these values; nothing is swallowed. Node failures surface to callers as a
//! [`GraphExecutionError`] carrying the failing node and the partial state.

use crate::nodes::NodeName;
use crate::state::{StateField, WorkflowState};
use std::path::PathBuf;

/// Top-level error type for the Ferret core library.
#[derive(Debug, thiserror::Error)]
pub enum FerretError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphExecutionError),

    #[error("Graph compilation error: {0}")]
    Compile(#[from] CompileError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from chat-completion clients.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from tool registration and execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool already registered: {name}")]
    Duplicate { name: String },

    #[error("Invalid arguments for tool '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("Tool '{name}' execution failed: {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("Tool '{name}' timed out after {timeout_secs}s")]
    Timeout { name: String, timeout_secs: u64 },
}

/// Errors from validating research results returned by search tools.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid JSON in research results: {message}")]
    InvalidJson { message: String },

    #[error("Invalid research results shape: {message}")]
    InvalidShape { message: String },

    #[error("Source at index {index} missing fields: {}", fields.join(", "))]
    MissingFields { index: usize, fields: Vec<String> },

    #[error("Source at index {index} has invalid type {value}, expected one of: web, document")]
    InvalidSourceType { index: usize, value: String },

    #[error("Source at index {index} field '{field}' must be a string")]
    FieldType { index: usize, field: String },

    #[error("Source at index {index} field '{field}' must not be empty")]
    EmptyField { index: usize, field: String },
}

/// Errors raised by individual workflow nodes.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Query is missing from workflow state")]
    MissingQuery,

    #[error("Research tool call has no id")]
    MissingToolCallId,

    #[error("Sub-agent call id missing from state, cannot hand research back")]
    MissingSubAgentCallId,

    #[error("Expected the researcher to call a tool, received no tool calls")]
    ExpectedToolCall,

    #[error("Orchestrator produced neither tool calls nor text content")]
    EmptyOrchestratorResponse,

    #[error("Invalid research decision: {reason}")]
    InvalidDecision { reason: String },

    #[error("No tool result follows the researcher's last tool call")]
    MissingToolResult,

    #[error("Last researcher message has no tool calls to execute")]
    NoPendingToolCalls,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Why a graph run stopped.
#[derive(Debug, thiserror::Error)]
pub enum GraphErrorKind {
    #[error("{0}")]
    Node(#[from] NodeError),

    #[error("required state fields missing: {}", join_fields(fields))]
    MissingFields { fields: Vec<StateField> },

    #[error("node wrote undeclared state fields: {}", join_fields(fields))]
    UndeclaredWrite { fields: Vec<StateField> },

    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },

    #[error("routed to node '{target}' which is not in the graph")]
    UnknownTarget { target: NodeName },
}

fn join_fields(fields: &[StateField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A failed graph run, labeled with the node that failed.
///
/// `state` holds everything accumulated before the fault so callers can inspect
/// partial progress (for example tool results already in `researcher_history`).
#[derive(Debug, thiserror::Error)]
#[error("node '{node}' failed: {kind}")]
pub struct GraphExecutionError {
    pub node: NodeName,
    #[source]
    pub kind: GraphErrorKind,
    pub state: Box<WorkflowState>,
}

impl GraphExecutionError {
    pub fn new(node: NodeName, kind: impl Into<GraphErrorKind>, state: WorkflowState) -> Self {
        Self {
            node,
            kind: kind.into(),
            state: Box::new(state),
        }
    }

    /// The node-level error, if the failure came from node logic.
    pub fn node_error(&self) -> Option<&NodeError> {
        match &self.kind {
            GraphErrorKind::Node(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors from building a graph topology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("graph has no entry node")]
    MissingEntry,

    #[error("node '{0}' is referenced by an edge but never registered")]
    UnknownNode(NodeName),

    #[error("node '{0}' is registered twice")]
    DuplicateNode(NodeName),

    #[error("node '{0}' has no outgoing edge")]
    NoOutgoingEdge(NodeName),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from checkpoint stores.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("thread id must not be empty")]
    EmptyThreadId,

    #[error("checkpoint storage error: {message}")]
    Storage { message: String },

    #[error("checkpoint serialization error: {message}")]
    Serialization { message: String },
}

/// Errors from the agent facade.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent run completed but the response is empty")]
    EmptyResponse,
}

/// A type alias for results using the top-level `FerretError`.
pub type Result<T> = std::result::Result<T, FerretError>;
