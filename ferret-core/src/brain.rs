//! Chat-client abstraction used by the orchestrator and researcher nodes.
//!
//! Concrete clients live in [`crate::providers`]. [`MockChatClient`] replays queued
//! replies and records every request, which is what the node and graph tests run on.

use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse, TokenUsage, ToolCall};
use async_trait::async_trait;
use std::sync::Mutex;

/// A chat-completion backend: messages plus optional tool schemas in, one
/// assistant reply out.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Perform one completion.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// A scripted chat client for testing.
///
/// Replies are returned in the order they were queued. Once the queue is drained
/// every call fails, so a test that expects no further chat calls will notice one.
pub struct MockChatClient {
    model: String,
    responses: Mutex<Vec<ChatResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a client pre-loaded with `responses`.
    pub fn with_responses(responses: impl IntoIterator<Item = ChatResponse>) -> Self {
        let client = Self::new();
        for response in responses {
            client.queue_response(response);
        }
        client
    }

    /// Queue a reply for the next `chat` call.
    pub fn queue_response(&self, response: ChatResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push(response);
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// A plain text reply.
    pub fn text_response(text: &str) -> ChatResponse {
        ChatResponse {
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            ..ChatResponse::text(text)
        }
    }

    /// A reply carrying a single tool call with a fixed id.
    pub fn tool_call_response(
        call_id: &str,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> ChatResponse {
        ChatResponse {
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 30,
            },
            model: "mock-model".to_string(),
            ..ChatResponse::tool_calls(vec![ToolCall::new(
                call_id,
                tool_name,
                arguments.to_string(),
            )])
        }
    }
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let mut responses = self.responses.lock().map_err(|_| LlmError::ApiRequest {
            message: "mock response queue poisoned".into(),
        })?;
        if responses.is_empty() {
            Err(LlmError::ApiRequest {
                message: "no queued mock responses".into(),
            })
        } else {
            Ok(responses.remove(0))
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
