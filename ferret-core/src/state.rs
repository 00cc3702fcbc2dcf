//! Workflow state shared by every node of the research graph.
//!
//! Nodes never mutate [`WorkflowState`] directly. Each returns a [`StateUpdate`]
//! and the engine folds it in with [`WorkflowState::apply`], using the per-field
//! policy declared in [`MERGE_POLICIES`]: the two message histories append,
//! everything else is overwritten by the most recent update.

use crate::sources::Source;
use crate::types::Message;
use serde::{Deserialize, Serialize};

/// Names of the fields in [`WorkflowState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Query,
    Response,
    MessageHistory,
    ShouldDelegate,
    ShouldContinue,
    CurrentIteration,
    PlannedSubtasks,
    SubAgentCallId,
    ResearcherHistory,
}

impl std::fmt::Display for StateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StateField::Query => "query",
            StateField::Response => "response",
            StateField::MessageHistory => "message_history",
            StateField::ShouldDelegate => "should_delegate",
            StateField::ShouldContinue => "should_continue",
            StateField::CurrentIteration => "current_iteration",
            StateField::PlannedSubtasks => "planned_subtasks",
            StateField::SubAgentCallId => "sub_agent_call_id",
            StateField::ResearcherHistory => "researcher_history",
        };
        f.write_str(name)
    }
}

/// How an update to a field is folded into the running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The update replaces the current value.
    Overwrite,
    /// The update is concatenated after the current value.
    Append,
}

/// Merge policy for every field a node may update.
///
/// `query` is absent: it is fixed when the state is created.
pub const MERGE_POLICIES: &[(StateField, MergePolicy)] = &[
    (StateField::Response, MergePolicy::Overwrite),
    (StateField::MessageHistory, MergePolicy::Append),
    (StateField::ShouldDelegate, MergePolicy::Overwrite),
    (StateField::ShouldContinue, MergePolicy::Overwrite),
    (StateField::CurrentIteration, MergePolicy::Overwrite),
    (StateField::PlannedSubtasks, MergePolicy::Overwrite),
    (StateField::SubAgentCallId, MergePolicy::Overwrite),
    (StateField::ResearcherHistory, MergePolicy::Append),
];

/// Look up the merge policy for `field`. Fields without an entry are overwritten.
pub fn merge_policy(field: StateField) -> MergePolicy {
    MERGE_POLICIES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, policy)| *policy)
        .unwrap_or(MergePolicy::Overwrite)
}

/// A value that can absorb an update under a [`MergePolicy`].
trait Mergeable {
    fn merge(&mut self, incoming: Self, policy: MergePolicy);
}

impl<T> Mergeable for Vec<T> {
    fn merge(&mut self, incoming: Self, policy: MergePolicy) {
        match policy {
            MergePolicy::Append => self.extend(incoming),
            MergePolicy::Overwrite => *self = incoming,
        }
    }
}

// Scalars have nothing to append to; they always take the latest value.
macro_rules! overwrite_only {
    ($($ty:ty),*) => {
        $(impl Mergeable for $ty {
            fn merge(&mut self, incoming: Self, _policy: MergePolicy) {
                *self = incoming;
            }
        })*
    };
}

overwrite_only!(String, bool, usize);

/// The single state object threaded through the research graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub query: String,
    pub response: String,
    pub message_history: Vec<Message>,
    pub should_delegate: bool,
    pub should_continue: bool,
    pub current_iteration: usize,
    pub planned_subtasks: Vec<String>,
    pub sub_agent_call_id: String,
    pub researcher_history: Vec<Message>,
}

impl WorkflowState {
    /// Fresh state for one top-level invocation.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Whether `field` currently holds a usable value.
    ///
    /// Strings and sequences count as present when non-empty. Flags and counters
    /// always have a value.
    pub fn has(&self, field: StateField) -> bool {
        match field {
            StateField::Query => !self.query.trim().is_empty(),
            StateField::Response => !self.response.is_empty(),
            StateField::MessageHistory => !self.message_history.is_empty(),
            StateField::ShouldDelegate
            | StateField::ShouldContinue
            | StateField::CurrentIteration => true,
            StateField::PlannedSubtasks => !self.planned_subtasks.is_empty(),
            StateField::SubAgentCallId => !self.sub_agent_call_id.is_empty(),
            StateField::ResearcherHistory => !self.researcher_history.is_empty(),
        }
    }

    /// The subset of `fields` that are not present.
    pub fn missing(&self, fields: &[StateField]) -> Vec<StateField> {
        fields.iter().copied().filter(|f| !self.has(*f)).collect()
    }

    /// Whether the run has produced a final answer.
    pub fn is_terminal(&self) -> bool {
        !self.response.is_empty()
    }

    /// Fold a node's update into the state.
    pub fn apply(&mut self, update: StateUpdate) {
        fn fold<T: Mergeable>(target: &mut T, incoming: Option<T>, field: StateField) {
            if let Some(value) = incoming {
                target.merge(value, merge_policy(field));
            }
        }

        fold(&mut self.response, update.response, StateField::Response);
        fold(
            &mut self.message_history,
            update.message_history,
            StateField::MessageHistory,
        );
        fold(
            &mut self.should_delegate,
            update.should_delegate,
            StateField::ShouldDelegate,
        );
        fold(
            &mut self.should_continue,
            update.should_continue,
            StateField::ShouldContinue,
        );
        fold(
            &mut self.current_iteration,
            update.current_iteration,
            StateField::CurrentIteration,
        );
        fold(
            &mut self.planned_subtasks,
            update.planned_subtasks,
            StateField::PlannedSubtasks,
        );
        fold(
            &mut self.sub_agent_call_id,
            update.sub_agent_call_id,
            StateField::SubAgentCallId,
        );
        fold(
            &mut self.researcher_history,
            update.researcher_history,
            StateField::ResearcherHistory,
        );
    }
}

/// A node's contribution to the workflow state. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub response: Option<String>,
    pub message_history: Option<Vec<Message>>,
    pub should_delegate: Option<bool>,
    pub should_continue: Option<bool>,
    pub current_iteration: Option<usize>,
    pub planned_subtasks: Option<Vec<String>>,
    pub sub_agent_call_id: Option<String>,
    pub researcher_history: Option<Vec<Message>>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.message_history = Some(messages);
        self
    }

    pub fn should_delegate(mut self, value: bool) -> Self {
        self.should_delegate = Some(value);
        self
    }

    pub fn should_continue(mut self, value: bool) -> Self {
        self.should_continue = Some(value);
        self
    }

    pub fn current_iteration(mut self, value: usize) -> Self {
        self.current_iteration = Some(value);
        self
    }

    pub fn planned_subtasks(mut self, subtasks: Vec<String>) -> Self {
        self.planned_subtasks = Some(subtasks);
        self
    }

    pub fn sub_agent_call_id(mut self, id: impl Into<String>) -> Self {
        self.sub_agent_call_id = Some(id.into());
        self
    }

    pub fn researcher_messages(mut self, messages: Vec<Message>) -> Self {
        self.researcher_history = Some(messages);
        self
    }

    /// Clear the handoff fields once research is returned to the orchestrator.
    pub fn end_handoff(self) -> Self {
        self.planned_subtasks(Vec::new())
            .sub_agent_call_id("")
            .current_iteration(0)
            .should_continue(false)
    }

    /// Fields this update sets.
    pub fn touched_fields(&self) -> Vec<StateField> {
        let mut fields = Vec::new();
        let mut mark = |set: bool, field| {
            if set {
                fields.push(field);
            }
        };
        mark(self.response.is_some(), StateField::Response);
        mark(self.message_history.is_some(), StateField::MessageHistory);
        mark(self.should_delegate.is_some(), StateField::ShouldDelegate);
        mark(self.should_continue.is_some(), StateField::ShouldContinue);
        mark(self.current_iteration.is_some(), StateField::CurrentIteration);
        mark(self.planned_subtasks.is_some(), StateField::PlannedSubtasks);
        mark(self.sub_agent_call_id.is_some(), StateField::SubAgentCallId);
        mark(
            self.researcher_history.is_some(),
            StateField::ResearcherHistory,
        );
        fields
    }
}

/// Caller-supplied settings for one graph run.
///
/// Has no `Default`; callers always choose the iteration budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Researcher iterations before the findings are handed back unconditionally.
    pub max_iterations: usize,
}

impl RunConfig {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }
}

/// Scratch space owned by a single invocation.
///
/// Created fresh by every run, so concurrent runs over one graph never share
/// findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub max_iterations: usize,
    /// Sources accumulated by the researcher across iterations.
    pub findings: Vec<Source>,
}

impl RunContext {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            findings: Vec::new(),
        }
    }
}
