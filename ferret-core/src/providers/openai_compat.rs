//! OpenAI-compatible chat client.
//!
//! Works against OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio, and any
//! endpoint that follows the OpenAI chat completions API format.

use crate::brain::ChatClient;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse, Message, TokenUsage, ToolCall, ToolDefinition};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat client.
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
}

impl OpenAiCompatibleClient {
    /// Create a new client from configuration.
    ///
    /// Reads the API key from `config.api_key`, falling back to the environment
    /// variable named in `config.api_key_env`. Local endpoints need no key.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let is_local = config
            .base_url
            .as_ref()
            .map(|u| u.contains("localhost") || u.contains("127.0.0.1"))
            .unwrap_or(false);

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .or_else(|| {
                if is_local {
                    debug!("No API key set for local endpoint; using placeholder bearer token");
                    Some("local".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| LlmError::AuthFailed {
                provider: format!("OpenAI-compatible: env var '{}' not set", config.api_key_env),
            })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new client with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Convert a request's system prompt and messages to OpenAI JSON format.
    fn messages_to_json(system: &str, messages: &[Message]) -> Vec<Value> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            out.push(json!({"role": "system", "content": system}));
        }
        out.extend(messages.iter().map(|msg| match msg {
            Message::System { content } => json!({"role": "system", "content": content}),
            Message::User { content } => json!({"role": "user", "content": content}),
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut value = json!({"role": "assistant", "content": content});
                if !tool_calls.is_empty() {
                    value["tool_calls"] = tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments,
                                }
                            })
                        })
                        .collect();
                }
                value
            }
            Message::ToolResult {
                content,
                tool_call_id,
            } => json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": content,
            }),
        }));
        out
    }

    /// Convert tool definitions to OpenAI format.
    fn tools_to_json(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": Self::messages_to_json(&request.system, &request.messages),
            "temperature": self.temperature,
            "stream": false,
        });
        if let Some(tools) = &request.tools
            && !tools.is_empty()
        {
            body["tools"] = json!(Self::tools_to_json(tools));
            body["tool_choice"] = json!("auto");
            body["parallel_tool_calls"] = json!(request.parallel_tool_calls);
        }
        body
    }

    /// Parse an OpenAI-format response body.
    fn parse_response(body: &Value, model: &str) -> Result<ChatResponse, LlmError> {
        let message = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No choices in response".to_string(),
            })?
            .get("message")
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No message in choice".to_string(),
            })?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let tool_calls = match message.get("tool_calls").and_then(|t| t.as_array()) {
            Some(calls) => calls
                .iter()
                .map(Self::parse_tool_call)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let usage = body
            .get("usage")
            .map(|u| TokenUsage {
                input_tokens: u
                    .get("prompt_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize,
                output_tokens: u
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            tool_calls,
            usage,
            model: body
                .get("model")
                .and_then(|m| m.as_str())
                .unwrap_or(model)
                .to_string(),
        })
    }

    fn parse_tool_call(value: &Value) -> Result<ToolCall, LlmError> {
        let function = value.get("function").ok_or_else(|| LlmError::ResponseParse {
            message: "Tool call without function".to_string(),
        })?;
        let name = function
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Tool call without function name".to_string(),
            })?;
        // A missing id is passed through as empty; the orchestrator rejects it.
        let id = value.get("id").and_then(|i| i.as_str()).unwrap_or_default();
        let arguments = function
            .get("arguments")
            .and_then(|a| a.as_str())
            .unwrap_or("{}");
        Ok(ToolCall::new(id, name, arguments))
    }

    /// Map an HTTP status code to the appropriate LlmError.
    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        match status.as_u16() {
            401 => {
                debug!(body = %body, "Authentication failed (401)");
                LlmError::AuthFailed {
                    provider: "OpenAI-compatible".to_string(),
                }
            }
            429 => {
                // "Rate limit reached ... Please try again in 20s."
                let retry_secs = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| {
                        v.get("error")?
                            .get("message")?
                            .as_str()
                            .map(|s| s.to_string())
                    })
                    .and_then(|msg| {
                        msg.split("in ")
                            .last()
                            .map(|s| s.trim_end_matches('.').trim_end_matches('s').to_string())
                            .and_then(|s| s.parse::<u64>().ok())
                    })
                    .unwrap_or(5);
                LlmError::RateLimited {
                    retry_after_secs: retry_secs,
                }
            }
            status if status >= 500 => LlmError::ApiRequest {
                message: format!("Server error ({status}): {body}"),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {status}: {body}"),
            },
        }
    }

    fn map_transport_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else if err.is_connect() {
            LlmError::Connection {
                message: err.to_string(),
            }
        } else {
            LlmError::ApiRequest {
                message: format!("Request failed: {err}"),
            }
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiCompatibleClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(&request);

        debug!(url = %url, model = %self.model, messages = request.messages.len(), "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON: {e}"),
            })?;

        let parsed = Self::parse_response(&json, &self.model)?;
        debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            tool_calls = parsed.tool_calls.len(),
            "Chat completion received"
        );
        Ok(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> OpenAiCompatibleClient {
        OpenAiCompatibleClient::new_with_key(&LlmConfig::default(), "sk-test".into()).unwrap()
    }

    #[test]
    fn test_new_with_explicit_key() {
        let config = LlmConfig {
            api_key: Some("sk-explicit".into()),
            base_url: Some("http://localhost:11434/v1/".into()),
            ..LlmConfig::default()
        };
        let client = OpenAiCompatibleClient::new(&config).unwrap();
        assert_eq!(client.api_key, "sk-explicit");
        assert_eq!(client.base_url, "http://localhost:11434/v1");
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn test_missing_key_for_remote_endpoint() {
        let config = LlmConfig {
            api_key_env: "FERRET_TEST_NO_SUCH_KEY".into(),
            ..LlmConfig::default()
        };
        let err = OpenAiCompatibleClient::new(&config).err().unwrap();
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[test]
    fn test_messages_to_json() {
        let messages = vec![
            Message::user("What is Rust?"),
            Message::assistant_tool_calls(
                None,
                vec![ToolCall::new("call_1", "web_search", r#"{"query":"rust"}"#)],
            ),
            Message::tool_result("[]", "call_1"),
        ];
        let json = OpenAiCompatibleClient::messages_to_json("be helpful", &messages);
        assert_eq!(json.len(), 4);
        assert_eq!(json[0], json!({"role": "system", "content": "be helpful"}));
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json[2]["content"], Value::Null);
        assert_eq!(json[2]["tool_calls"][0]["function"]["name"], "web_search");
        assert_eq!(
            json[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"query":"rust"}"#
        );
        assert_eq!(
            json[3],
            json!({"role": "tool", "tool_call_id": "call_1", "content": "[]"})
        );
    }

    #[test]
    fn test_request_body_binds_tools() {
        let tools = vec![ToolDefinition {
            name: "research_tool".into(),
            description: "delegate".into(),
            parameters: json!({"type": "object"}),
        }];
        let request = ChatRequest::new("sys", vec![Message::user("q")]).with_tools(tools, false);
        let body = client().request_body(&request);
        assert_eq!(body["tools"][0]["function"]["name"], "research_tool");
        assert_eq!(body["parallel_tool_calls"], false);
        assert_eq!(body["tool_choice"], "auto");

        let plain = client().request_body(&ChatRequest::new("sys", vec![]));
        assert!(plain.get("tools").is_none());
        assert!(plain.get("parallel_tool_calls").is_none());
    }

    #[test]
    fn test_parse_text_response() {
        let body = json!({
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"message": {"role": "assistant", "content": "4"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 1}
        });
        let response = OpenAiCompatibleClient::parse_response(&body, "gpt-4o-mini").unwrap();
        assert_eq!(response.content.as_deref(), Some("4"));
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.usage.total(), 13);
        assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
    }

    #[test]
    fn test_parse_tool_call_response() {
        let body = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": "research_tool", "arguments": "{\"subtasks\":[\"a\"]}"}
                }]
            }}]
        });
        let response = OpenAiCompatibleClient::parse_response(&body, "m").unwrap();
        assert_eq!(response.content, None);
        assert_eq!(
            response.tool_calls,
            vec![ToolCall::new("call_abc", "research_tool", r#"{"subtasks":["a"]}"#)]
        );
        assert_eq!(response.model, "m");
    }

    #[test]
    fn test_parse_response_without_choices() {
        let err = OpenAiCompatibleClient::parse_response(&json!({"choices": []}), "m").unwrap_err();
        assert!(matches!(err, LlmError::ResponseParse { .. }));
    }

    #[test]
    fn test_map_http_error() {
        let err = OpenAiCompatibleClient::map_http_error(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(matches!(err, LlmError::AuthFailed { .. }));

        let body = r#"{"error": {"message": "Rate limit reached. Please try again in 20s."}}"#;
        let err =
            OpenAiCompatibleClient::map_http_error(reqwest::StatusCode::TOO_MANY_REQUESTS, body);
        assert!(matches!(err, LlmError::RateLimited { retry_after_secs: 20 }));

        let err = OpenAiCompatibleClient::map_http_error(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "boom",
        );
        assert!(matches!(err, LlmError::ApiRequest { message } if message.contains("Server error")));
    }
}
