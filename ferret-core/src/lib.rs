//! # Ferret Core
//!
//! Core library for the Ferret research agent.
//! Provides the workflow state model, the orchestrator and researcher nodes, the
//! graph engine that sequences them, the tool registry, the chat-client
//! interface, checkpointing, configuration, and fundamental types.

pub mod agent;
pub mod brain;
pub mod checkpoint;
pub mod config;
pub mod decision;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod providers;
pub mod registry;
pub mod sources;
pub mod state;
pub mod types;

// Re-export commonly used types at the crate root.
pub use agent::ResearchAgent;
pub use brain::{ChatClient, MockChatClient};
pub use checkpoint::{Checkpointer, FileCheckpointer, InMemoryCheckpointer};
pub use config::{FerretConfig, load_config};
pub use decision::{ResearchDecision, ResearchDecisionTool};
pub use error::{FerretError, GraphExecutionError, Result};
pub use graph::{GraphBuilder, ResearchGraph, Target};
pub use nodes::NodeName;
pub use registry::{Tool, ToolRegistry};
pub use sources::{Source, SourceType, format_synthesis, parse_research_results};
pub use state::{RunConfig, StateUpdate, WorkflowState};
pub use types::{AssistantTurn, ChatRequest, ChatResponse, Message, ToolCall, ToolDefinition};
