//! Web search providers.
//!
//! [`SearchProvider`] is the seam between the `web_search` tool and a concrete
//! search API. [`TavilySearch`] talks to the Tavily REST API.

use async_trait::async_trait;
use ferret_core::config::{SearchConfig, resolve_secret};
use ferret_core::sources::Source;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Errors from a search provider.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search API key not configured (set {var})")]
    MissingApiKey { var: String },

    #[error("search request failed: {message}")]
    Request { message: String },

    #[error("search API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected search response: {message}")]
    Parse { message: String },
}

/// A web search backend: query in, sources out.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<Source>, SearchError>;
}

/// Tavily search API client.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_results: usize,
}

impl TavilySearch {
    /// Create a client from configuration, reading the key from `config.api_key`
    /// or the environment variable named by `config.api_key_env`.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let api_key = resolve_secret(config.api_key.as_deref(), &config.api_key_env).map_err(
            |_| SearchError::MissingApiKey {
                var: config.api_key_env.clone(),
            },
        )?;
        Self::new_with_key(config, api_key)
    }

    pub fn new_with_key(config: &SearchConfig, api_key: String) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("ferret/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SearchError::Request {
                message: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }

    fn request_body(&self, query: &str) -> Value {
        json!({
            "query": query,
            "max_results": self.max_results,
            "search_depth": "basic",
        })
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str) -> Result<Vec<Source>, SearchError> {
        let url = format!("{}/search", self.base_url);
        debug!(url = %url, query = %query, "Sending Tavily search request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(query))
            .send()
            .await
            .map_err(|e| SearchError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SearchError::Request {
            message: format!("failed to read response body: {e}"),
        })?;
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| SearchError::Parse {
            message: format!("invalid JSON: {e}"),
        })?;
        parse_tavily_response(&json)
    }
}

/// Map a Tavily response body onto web sources.
///
/// Hits without a url or content are skipped.
pub fn parse_tavily_response(body: &Value) -> Result<Vec<Source>, SearchError> {
    let results = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Parse {
            message: "missing 'results' array".into(),
        })?;

    let mut sources = Vec::with_capacity(results.len());
    for (i, item) in results.iter().enumerate() {
        let url = item.get("url").and_then(Value::as_str).unwrap_or_default();
        let content = item
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if url.trim().is_empty() || content.trim().is_empty() {
            warn!(index = i, "Skipping search hit without url or content");
            continue;
        }
        sources.push(Source::web(url, content));
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_tavily_response() {
        let body = json!({
            "query": "rust async",
            "results": [
                {"title": "Async Book", "url": "https://rust-lang.github.io/async-book/", "content": "Asynchronous programming in Rust", "score": 0.9},
                {"title": "Tokio", "url": "https://tokio.rs", "content": "A runtime for async Rust"}
            ]
        });
        let sources = parse_tavily_response(&body).unwrap();
        assert_eq!(
            sources,
            vec![
                Source::web("https://rust-lang.github.io/async-book/", "Asynchronous programming in Rust"),
                Source::web("https://tokio.rs", "A runtime for async Rust"),
            ]
        );
    }

    #[test]
    fn test_parse_skips_incomplete_hits() {
        let body = json!({
            "results": [
                {"url": "https://a.example", "content": ""},
                {"content": "no url"},
                {"url": "https://b.example", "content": "kept"}
            ]
        });
        let sources = parse_tavily_response(&body).unwrap();
        assert_eq!(sources, vec![Source::web("https://b.example", "kept")]);
    }

    #[test]
    fn test_parse_requires_results() {
        let err = parse_tavily_response(&json!({"answer": "x"})).unwrap_err();
        assert!(matches!(err, SearchError::Parse { .. }));
    }

    #[test]
    fn test_new_without_key_fails() {
        let config = SearchConfig {
            api_key_env: "FERRET_TEST_NO_TAVILY_KEY".into(),
            ..SearchConfig::default()
        };
        let err = TavilySearch::new(&config).err().unwrap();
        assert!(matches!(err, SearchError::MissingApiKey { var } if var == "FERRET_TEST_NO_TAVILY_KEY"));
    }

    #[test]
    fn test_request_body_uses_configured_limit() {
        let config = SearchConfig {
            max_results: 3,
            base_url: "https://search.example/".into(),
            ..SearchConfig::default()
        };
        let search = TavilySearch::new_with_key(&config, "tvly-test".into()).unwrap();
        assert_eq!(search.base_url, "https://search.example");
        let body = search.request_body("rust");
        assert_eq!(body["query"], "rust");
        assert_eq!(body["max_results"], 3);
    }
}
