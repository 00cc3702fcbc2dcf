//! Tool Registry: name-keyed catalog of callable tools.
//!
//! The registry is an explicit value shared by `Arc`. Built-in tools are supplied
//! as a factory and loaded on first access, so constructing a registry is cheap and
//! a caller that only registers its own tools never pays for the defaults. Reads
//! take a shared lock and hand out `Arc<dyn Tool>` clones, so concurrent graph runs
//! never block each other on tool lookup.

use crate::error::ToolError;
use crate::types::ToolDefinition;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

/// Name of the built-in web search tool.
pub const WEB_SEARCH: &str = "web_search";
/// Name of the orchestrator's delegation tool.
pub const RESEARCH_TOOL: &str = "research_tool";

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Maximum execution time before timeout.
    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Produces the built-in tools the first time the registry is touched.
pub type ToolFactory = Box<dyn Fn() -> Vec<Arc<dyn Tool>> + Send + Sync>;

/// The tool registry holds all registered tools and handles execution.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    defaults: Option<ToolFactory>,
    defaults_loaded: OnceLock<()>,
}

impl ToolRegistry {
    /// An empty registry with no built-in tools.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            defaults: None,
            defaults_loaded: OnceLock::new(),
        }
    }

    /// A registry whose built-ins come from `factory`, loaded on first access.
    pub fn with_defaults(
        factory: impl Fn() -> Vec<Arc<dyn Tool>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            defaults: Some(Box::new(factory)),
            ..Self::new()
        }
    }

    fn ensure_defaults(&self) {
        self.defaults_loaded.get_or_init(|| {
            let Some(factory) = &self.defaults else {
                return;
            };
            let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
            for tool in factory() {
                let name = tool.name().to_string();
                debug!(tool = %name, "Loading built-in tool");
                tools.entry(name).or_insert(tool);
            }
        });
    }

    /// Register a tool. Fails if the name is taken, built-ins included.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        self.ensure_defaults();
        let name = tool.name().to_string();
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if tools.contains_key(&name) {
            return Err(ToolError::Duplicate { name });
        }
        debug!(tool = %name, "Registering tool");
        tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.ensure_defaults();
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.ensure_defaults();
        let mut names: Vec<String> = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Tool schemas for `names`, in the order given.
    pub fn definitions(&self, names: &[&str]) -> Result<Vec<ToolDefinition>, ToolError> {
        names
            .iter()
            .map(|name| self.get(name).map(|tool| tool.definition()))
            .collect()
    }

    /// Execute a tool by name with JSON-encoded arguments, applying its timeout.
    ///
    /// Returns the tool's JSON result as a string.
    pub async fn invoke(&self, name: &str, args_json: &str) -> Result<String, ToolError> {
        let tool = self.get(name)?;
        let args: serde_json::Value =
            serde_json::from_str(args_json).map_err(|e| ToolError::InvalidArguments {
                name: name.to_string(),
                reason: format!("arguments are not valid JSON: {e}"),
            })?;

        let timeout = tool.timeout();
        info!(tool = %name, timeout_secs = timeout.as_secs(), "Executing tool");

        let output = match tokio::time::timeout(timeout, tool.execute(args)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ToolError::Timeout {
                    name: name.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        };
        Ok(output.to_string())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
