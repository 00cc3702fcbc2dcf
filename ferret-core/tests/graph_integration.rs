//! Integration tests for the research graph.
//!
//! These tests drive complete runs (preprocess, decide, research, synthesize)
//! with scripted chat clients and a fake search tool.

use async_trait::async_trait;
use ferret_core::brain::{ChatClient, MockChatClient};
use ferret_core::error::{GraphErrorKind, LlmError, NodeError, ToolError};
use ferret_core::graph::{Target, route_after_orchestrator, route_after_researcher};
use ferret_core::nodes::{
    Node, NodeName, OrchestratorNode, PreprocessorNode, ResearcherNode, ToolExecutionNode,
};
use ferret_core::registry::{RESEARCH_TOOL, Tool, ToolRegistry, WEB_SEARCH};
use ferret_core::state::{RunContext, StateField, StateUpdate};
use ferret_core::types::{ChatRequest, ChatResponse, Message, ToolCall};
use ferret_core::{GraphBuilder, ResearchDecisionTool, ResearchGraph, RunConfig, WorkflowState};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

/// Returns one web source per query, derived from the query text.
struct FakeSearch;

#[async_trait]
impl Tool for FakeSearch {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "Search the web"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let query = args["query"].as_str().unwrap_or_default().to_string();
        tokio::task::yield_now().await;
        Ok(json!([{
            "source": format!("https://{}.example", query.replace(' ', "-")),
            "content": format!("about {query}"),
            "type": "web"
        }]))
    }
}

fn registry() -> Arc<ToolRegistry> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(ResearchDecisionTool)).unwrap();
    registry.register(Arc::new(FakeSearch)).unwrap();
    registry
}

fn graph(client: Arc<dyn ChatClient>) -> ResearchGraph {
    ResearchGraph::standard(client, registry(), vec![WEB_SEARCH.to_string()]).unwrap()
}

fn delegate(call_id: &str, subtasks: &[&str]) -> ChatResponse {
    MockChatClient::tool_call_response(call_id, RESEARCH_TOOL, json!({ "subtasks": subtasks }))
}

fn search(call_id: &str, query: &str) -> ChatResponse {
    MockChatClient::tool_call_response(call_id, WEB_SEARCH, json!({ "query": query }))
}

#[tokio::test]
async fn test_direct_answer_single_pass() {
    let client = Arc::new(MockChatClient::with_responses([
        MockChatClient::text_response("4"),
    ]));
    let state = graph(client.clone())
        .invoke("What is 2+2?", &RunConfig::new(4))
        .await
        .unwrap();

    assert_eq!(state.response, "4");
    assert!(!state.should_delegate);
    assert_eq!(
        state.message_history,
        vec![Message::user("What is 2+2?"), Message::assistant("4")]
    );
    assert!(state.researcher_history.is_empty());
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn test_delegation_round_trip() {
    let client = Arc::new(MockChatClient::with_responses([
        delegate("call_1", &["rust 2024 edition"]),
        search("s1", "rust 2024 edition"),
        MockChatClient::text_response("The 2024 edition shipped with Rust 1.85."),
        MockChatClient::text_response("Rust's 2024 edition arrived in 1.85."),
    ]));
    let state = graph(client.clone())
        .invoke("When did the Rust 2024 edition ship?", &RunConfig::new(4))
        .await
        .unwrap();

    assert_eq!(state.response, "Rust's 2024 edition arrived in 1.85.");
    assert_eq!(client.call_count(), 4);

    // The synthesis call sees the researcher's report as the answer to call_1.
    let synthesis = &client.requests()[3];
    assert!(synthesis.tools.is_none());
    assert_eq!(
        synthesis.messages.last(),
        Some(&Message::tool_result(
            "The 2024 edition shipped with Rust 1.85.",
            "call_1"
        ))
    );

    // Handoff fields are reset once research is returned.
    assert!(state.planned_subtasks.is_empty());
    assert!(state.sub_agent_call_id.is_empty());
    assert_eq!(state.current_iteration, 0);

    // Only the final tool result crosses into the main history.
    assert_eq!(state.message_history.len(), 4);
    assert_eq!(
        state
            .message_history
            .iter()
            .filter(|m| m.is_tool_result())
            .count(),
        1
    );
    // Subtask request, search call, search result, final researcher reply.
    assert_eq!(state.researcher_history.len(), 4);
    assert_eq!(
        state.researcher_history[0],
        Message::user(r#"["rust 2024 edition"]"#)
    );
}

#[tokio::test]
async fn test_iteration_limit_hands_back_findings() {
    let client = Arc::new(MockChatClient::with_responses([
        delegate("call_1", &["a", "b"]),
        search("s1", "a"),
        search("s2", "b"),
        search("s3", "c"),
        MockChatClient::text_response("final answer"),
    ]));
    let state = graph(client.clone())
        .invoke("compare a and b", &RunConfig::new(2))
        .await
        .unwrap();

    assert_eq!(state.response, "final answer");
    // Orchestrator, three researcher calls, synthesis. The fourth researcher
    // visit is past the limit and never reaches the model.
    assert_eq!(client.call_count(), 5);

    let report = state.message_history[2].text().unwrap();
    assert!(report.starts_with("Research Complete - Findings Summary"));
    assert!(report.contains("Total Sources Gathered: 2"));
    assert!(report.contains("Source: https://a.example"));
    assert!(report.contains("Source: https://b.example"));
    assert!(!report.contains("https://c.example"));
    assert_eq!(
        state.researcher_history.last().unwrap().text(),
        Some(ferret_core::prompts::MAX_ITERATION_REACHED)
    );
}

#[tokio::test]
async fn test_zero_iteration_budget_still_runs_first_search() {
    let client = Arc::new(MockChatClient::with_responses([
        delegate("call_1", &["a"]),
        search("s1", "a"),
        MockChatClient::text_response("done"),
    ]));
    let state = graph(client.clone())
        .invoke("q", &RunConfig::new(0))
        .await
        .unwrap();
    assert_eq!(client.call_count(), 3);
    let report = state.message_history[2].text().unwrap();
    assert!(report.contains("Total Sources Gathered: 0"));
}

#[tokio::test]
async fn test_first_iteration_without_tool_call_fails() {
    let client = Arc::new(MockChatClient::with_responses([
        delegate("call_1", &["a"]),
        MockChatClient::text_response("I'd rather not search"),
    ]));
    let err = graph(client)
        .invoke("q", &RunConfig::new(4))
        .await
        .unwrap_err();

    assert_eq!(err.node, NodeName::Researcher);
    assert!(matches!(
        err.node_error(),
        Some(NodeError::ExpectedToolCall)
    ));
    // The orchestrator's decision is part of the partial state.
    assert!(err.state.should_delegate);
    assert_eq!(err.state.sub_agent_call_id, "call_1");
    assert!(err.state.researcher_history.is_empty());
}

#[tokio::test]
async fn test_tool_call_wins_over_text() {
    let mut decision = delegate("call_1", &["a"]);
    decision.content = Some("Probably 42, but let me check.".into());
    let client = Arc::new(MockChatClient::with_responses([
        decision,
        search("s1", "a"),
        MockChatClient::text_response("report"),
        MockChatClient::text_response("checked answer"),
    ]));
    let state = graph(client)
        .invoke("q", &RunConfig::new(4))
        .await
        .unwrap();
    assert_eq!(state.response, "checked answer");
}

#[tokio::test]
async fn test_invalid_search_results_fail_researcher() {
    /// A search tool that returns a bare string instead of a source list.
    struct BrokenSearch;

    #[async_trait]
    impl Tool for BrokenSearch {
        fn name(&self) -> &str {
            WEB_SEARCH
        }
        fn description(&self) -> &str {
            "broken"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            Ok(json!("no results"))
        }
    }

    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(ResearchDecisionTool)).unwrap();
    registry.register(Arc::new(BrokenSearch)).unwrap();
    let client = Arc::new(MockChatClient::with_responses([
        delegate("call_1", &["a"]),
        search("s1", "a"),
        search("s2", "b"),
    ]));
    let graph = ResearchGraph::standard(client, registry, vec![WEB_SEARCH.to_string()]).unwrap();
    let err = graph.invoke("q", &RunConfig::new(4)).await.unwrap_err();

    assert_eq!(err.node, NodeName::Researcher);
    assert!(matches!(err.node_error(), Some(NodeError::Validation(_))));
    // The raw tool output is preserved for inspection.
    assert!(err.state.researcher_history.last().unwrap().is_tool_result());
}

// --- Monotonic history growth ---

type Lengths = Arc<Mutex<Vec<(usize, usize)>>>;

/// Records both history lengths before delegating to the wrapped node.
struct Recording {
    inner: Box<dyn Node>,
    log: Lengths,
}

#[async_trait]
impl Node for Recording {
    fn name(&self) -> NodeName {
        self.inner.name()
    }

    fn reads(&self) -> &'static [StateField] {
        self.inner.reads()
    }

    fn writes(&self) -> &'static [StateField] {
        self.inner.writes()
    }

    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &mut RunContext,
    ) -> Result<StateUpdate, NodeError> {
        self.log
            .lock()
            .unwrap()
            .push((state.message_history.len(), state.researcher_history.len()));
        self.inner.run(state, ctx).await
    }
}

#[tokio::test]
async fn test_histories_grow_monotonically() {
    let client: Arc<dyn ChatClient> = Arc::new(MockChatClient::with_responses([
        delegate("call_1", &["a", "b"]),
        search("s1", "a"),
        search("s2", "b"),
        search("s3", "c"),
        MockChatClient::text_response("final"),
    ]));
    let registry = registry();
    let log: Lengths = Arc::default();
    let wrap = |inner: Box<dyn Node>| Recording {
        inner,
        log: log.clone(),
    };

    let graph = GraphBuilder::new()
        .add_node(wrap(Box::new(PreprocessorNode)))
        .add_node(wrap(Box::new(OrchestratorNode::new(
            client.clone(),
            registry.clone(),
        ))))
        .add_node(wrap(Box::new(ResearcherNode::new(
            client,
            registry.clone(),
            vec![WEB_SEARCH.to_string()],
        ))))
        .add_node(wrap(Box::new(ToolExecutionNode::new(registry))))
        .set_entry(NodeName::Preprocessor)
        .add_edge(NodeName::Preprocessor, Target::Node(NodeName::Orchestrator))
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
        .add_edge(NodeName::ToolExecution, Target::Node(NodeName::Researcher))
        .compile()
        .unwrap();

    let state = graph.invoke("q", &RunConfig::new(2)).await.unwrap();
    let mut lengths = log.lock().unwrap().clone();
    lengths.push((state.message_history.len(), state.researcher_history.len()));

    // preprocessor, orchestrator, 4 researcher visits, 3 tool executions, synthesis
    assert_eq!(lengths.len(), 11);
    for pair in lengths.windows(2) {
        assert!(pair[1].0 >= pair[0].0, "message history shrank: {lengths:?}");
        assert!(pair[1].1 >= pair[0].1, "researcher history shrank: {lengths:?}");
    }
    assert_eq!(lengths.first(), Some(&(0, 0)));
}

// --- Concurrent invocations ---

/// Answers deterministically from the request alone, so concurrent runs can
/// share one client.
struct EchoResearchClient;

#[async_trait]
impl ChatClient for EchoResearchClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        tokio::task::yield_now().await;
        let tools: Vec<String> = request
            .tools
            .iter()
            .flatten()
            .map(|t| t.name.clone())
            .collect();
        let first_user = request
            .messages
            .iter()
            .find_map(|m| match m {
                Message::User { content } => Some(content.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let response = if tools.iter().any(|t| t == RESEARCH_TOOL) {
            // Delegate the query itself as the only subtask.
            ChatResponse::tool_calls(vec![ToolCall::new(
                "call_root",
                RESEARCH_TOOL,
                json!({ "subtasks": [first_user] }).to_string(),
            )])
        } else if tools.iter().any(|t| t == WEB_SEARCH) {
            let subtasks: Vec<String> = serde_json::from_str(&first_user).unwrap_or_default();
            let query = subtasks.first().cloned().unwrap_or_default();
            ChatResponse::tool_calls(vec![ToolCall::new(
                format!("search_{}", request.messages.len()),
                WEB_SEARCH,
                json!({ "query": query }).to_string(),
            )])
        } else {
            // Synthesis: repeat the research report.
            let report = request
                .messages
                .last()
                .and_then(|m| m.text())
                .unwrap_or_default()
                .to_string();
            ChatResponse::text(report)
        };
        Ok(response)
    }

    fn model_name(&self) -> &str {
        "echo-research"
    }
}

#[tokio::test]
async fn test_concurrent_runs_keep_findings_separate() {
    let graph = Arc::new(graph(Arc::new(EchoResearchClient)));
    let config = RunConfig::new(1);

    let (alpha, beta) = tokio::join!(
        graph.invoke("alpha", &config),
        graph.invoke("beta", &config)
    );
    let alpha = alpha.unwrap();
    let beta = beta.unwrap();

    assert!(alpha.response.contains("https://alpha.example"));
    assert!(!alpha.response.contains("beta"));
    assert!(beta.response.contains("https://beta.example"));
    assert!(!beta.response.contains("alpha"));
    assert!(alpha.response.contains("Total Sources Gathered: 1"));
    assert!(beta.response.contains("Total Sources Gathered: 1"));
}

#[tokio::test]
async fn test_low_step_limit_still_reaches_forced_handoff() {
    let client = Arc::new(MockChatClient::with_responses([
        delegate("call_1", &["a"]),
        search("s1", "a"),
        search("s2", "a"),
        search("s3", "a"),
        search("s4", "a"),
        MockChatClient::text_response("done"),
    ]));
    let state = graph(client.clone())
        .with_step_limit(6)
        .invoke("q", &RunConfig::new(3))
        .await
        .unwrap();
    assert_eq!(state.response, "done");
    assert_eq!(client.call_count(), 6);
}

#[tokio::test]
async fn test_large_iteration_budget_ends_in_synthesis() {
    let client = Arc::new(EchoResearchClient);
    let state = graph(client)
        .invoke("deep dive", &RunConfig::new(25))
        .await
        .unwrap();

    assert!(state.response.contains("Total Sources Gathered: 25"));
    assert_eq!(
        state.researcher_history.last(),
        Some(&Message::assistant(ferret_core::prompts::MAX_ITERATION_REACHED))
    );
    assert_eq!(state.current_iteration, 0);
}

#[tokio::test]
async fn test_blank_query_is_a_node_error() {
    let client = Arc::new(MockChatClient::new());
    let err = graph(client.clone())
        .invoke("", &RunConfig::new(2))
        .await
        .unwrap_err();
    assert_eq!(err.node, NodeName::Preprocessor);
    assert!(matches!(err.kind, GraphErrorKind::Node(NodeError::MissingQuery)));
    assert_eq!(client.call_count(), 0);
}
