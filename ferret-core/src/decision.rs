//! The orchestrator's delegation tool.
//!
//! `research_tool` does no work of its own. Binding it forces the model to emit its
//! delegation decision in a fixed shape, and executing it validates that shape and
//! echoes the subtasks back.

use crate::error::ToolError;
use crate::registry::{RESEARCH_TOOL, Tool};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Arguments of a `research_tool` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResearchDecision {
    pub subtasks: Vec<String>,
}

pub struct ResearchDecisionTool;

#[async_trait]
impl Tool for ResearchDecisionTool {
    fn name(&self) -> &str {
        RESEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Delegate the query to the research sub-agent. Provide the list of focused \
         research subtasks that together answer the user's question."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "subtasks": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "description": "Research subtasks to investigate"
                }
            },
            "required": ["subtasks"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            name: RESEARCH_TOOL.to_string(),
            reason,
        };
        let decision: ResearchDecision =
            serde_json::from_value(args).map_err(|e| invalid(e.to_string()))?;
        if decision.subtasks.is_empty() {
            return Err(invalid("at least one subtask is required".to_string()));
        }
        serde_json::to_value(decision).map_err(|e| ToolError::ExecutionFailed {
            name: RESEARCH_TOOL.to_string(),
            message: e.to_string(),
        })
    }
}
