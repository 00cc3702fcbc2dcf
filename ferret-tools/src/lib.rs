//! # Ferret Tools
//!
//! Built-in tools for the Ferret research agent: the `web_search` tool and the
//! search providers behind it.

pub mod search;
pub mod web;

pub use search::{SearchError, SearchProvider, TavilySearch};
pub use web::WebSearchTool;

use ferret_core::ToolRegistry;
use ferret_core::decision::ResearchDecisionTool;
use ferret_core::registry::{Tool, WEB_SEARCH};
use std::sync::Arc;
use std::time::Duration;

/// Every built-in tool: the orchestrator's `research_tool` and `web_search`.
///
/// `search_timeout` bounds each `web_search` call, normally
/// [`SearchConfig::timeout`](ferret_core::config::SearchConfig::timeout).
pub fn builtin_tools(
    provider: Arc<dyn SearchProvider>,
    search_timeout: Duration,
) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ResearchDecisionTool),
        Arc::new(WebSearchTool::new(provider).with_timeout(search_timeout)),
    ]
}

/// A registry whose built-ins are created on first use.
pub fn default_registry(
    provider: Arc<dyn SearchProvider>,
    search_timeout: Duration,
) -> ToolRegistry {
    ToolRegistry::with_defaults(move || builtin_tools(provider.clone(), search_timeout))
}

/// Tools bound to every researcher call.
pub fn researcher_tools() -> Vec<String> {
    vec![WEB_SEARCH.to_string()]
}
