//! The `web_search` tool used by the researcher.

use crate::search::{SearchError, SearchProvider};
use async_trait::async_trait;
use ferret_core::error::ToolError;
use ferret_core::registry::{Tool, WEB_SEARCH};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const MAX_QUERY_CHARS: usize = 500;

/// Search the web and return the hits as a JSON array of sources.
pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    timeout: Duration,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn validate_query(args: &serde_json::Value) -> Result<&str, ToolError> {
    let invalid = |reason: &str| ToolError::InvalidArguments {
        name: WEB_SEARCH.into(),
        reason: reason.into(),
    };
    let query = args
        .get("query")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid("Missing required parameter: query"))?
        .trim();
    if query.is_empty() {
        return Err(invalid("query must not be empty"));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(invalid("query must be at most 500 characters"));
    }
    Ok(query)
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns a list of sources, each with \
         its URL and the relevant page content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to execute",
                    "minLength": 1,
                    "maxLength": MAX_QUERY_CHARS
                }
            },
            "required": ["query"]
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let query = validate_query(&args)?;
        let sources = self
            .provider
            .search(query)
            .await
            .map_err(|e: SearchError| ToolError::ExecutionFailed {
                name: WEB_SEARCH.into(),
                message: e.to_string(),
            })?;
        info!(provider = %self.provider.name(), results = sources.len(), "Web search finished");
        serde_json::to_value(sources).map_err(|e| ToolError::ExecutionFailed {
            name: WEB_SEARCH.into(),
            message: format!("Failed to serialize sources: {e}"),
        })
    }
}
