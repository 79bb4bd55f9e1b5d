//! Orchestrator state and the patches nodes return.
//!
//! Nodes never mutate a [`State`]. They read it and return a [`StatePatch`];
//! the orchestrator folds the patch in with [`State::merged`], which appends
//! messages, overwrites only the fields the patch sets, and carries every
//! other field through unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::message::{Annotation, Message};
use super::params::{AlignmentParams, DatabaseQuery};

/// Maximum number of evaluation rounds per question.
pub const MAX_EVAL_ROUNDS: u32 = 5;

/// Run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Processing normally.
    #[default]
    Ok,
    /// A fatal condition ended the run.
    Error,
}

/// Why the router picked its last destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingReason {
    /// Free-text rationale from the router.
    Reason(String),
    /// The question is outside the system's domain.
    OutOfDomain,
}

impl fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reason(text) => f.write_str(text),
            Self::OutOfDomain => f.write_str("IRRELEVANT REQUEST."),
        }
    }
}

/// The specialist tool agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    /// Sequence alignment (BLAST).
    Alignment,
    /// Structured database lookup (E-utilities).
    Database,
    /// Web search.
    Search,
}

impl ToolKind {
    /// Returns the node name used in traces and router decisions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alignment => "alignment-agent",
            Self::Database => "database-agent",
            Self::Search => "search-agent",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A phase inside a tool agent's sub-flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Alignment job submission.
    Submit,
    /// Alignment job polling.
    Poll,
    /// Database identifier search.
    Search,
    /// Database detail fetch.
    Fetch,
    /// Single-shot lookup.
    Lookup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submit => "submit",
            Self::Poll => "poll",
            Self::Search => "search",
            Self::Fetch => "fetch",
            Self::Lookup => "lookup",
        };
        f.write_str(name)
    }
}

/// Where control goes after a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Next {
    /// Delegate to a tool agent.
    Tool(ToolKind),
    /// Produce the final answer.
    Generate,
    /// Loop back to the router.
    Router,
    /// Continue the current tool agent in another phase.
    Phase(Phase),
}

impl fmt::Display for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool(kind) => write!(f, "{kind}"),
            Self::Generate => f.write_str("generate"),
            Self::Router => f.write_str("router"),
            Self::Phase(phase) => write!(f, "{phase}"),
        }
    }
}

/// Typed per-question context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Evaluator invocations so far.
    pub eval_count: u32,
    /// The router's last rationale.
    pub routing_reason: Option<RoutingReason>,
    /// The evaluator's last rationale.
    pub eval_reason: Option<String>,
    /// Issued alignment submissions.
    pub alignment_history: Vec<AlignmentParams>,
    /// Issued database searches and fetches.
    pub database_history: Vec<DatabaseQuery>,
    /// Token of the submitted alignment job.
    pub job_token: Option<String>,
    /// Polls issued for the current job.
    pub poll_attempt: u32,
    /// Last node's human-readable note.
    pub diagnostic: Option<String>,
    /// Set when the evaluator cap forced generation.
    pub forced_generation: bool,
}

/// Explicit metadata updates. Unset fields are inherited.
///
/// The dedup records are appended, never replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    /// New evaluation count.
    pub eval_count: Option<u32>,
    /// New routing reason.
    pub routing_reason: Option<RoutingReason>,
    /// New evaluation reason.
    pub eval_reason: Option<String>,
    /// Alignment submission to record.
    pub alignment_params: Option<AlignmentParams>,
    /// Database query to record.
    pub database_query: Option<DatabaseQuery>,
    /// New job token.
    pub job_token: Option<String>,
    /// New poll attempt counter.
    pub poll_attempt: Option<u32>,
    /// Diagnostic note.
    pub diagnostic: Option<String>,
    /// Forced-generation flag.
    pub forced_generation: Option<bool>,
}

impl Metadata {
    fn apply(&mut self, patch: &MetadataPatch) {
        if let Some(n) = patch.eval_count {
            self.eval_count = n;
        }
        if let Some(ref reason) = patch.routing_reason {
            self.routing_reason = Some(reason.clone());
        }
        if let Some(ref reason) = patch.eval_reason {
            self.eval_reason = Some(reason.clone());
        }
        if let Some(ref params) = patch.alignment_params {
            self.alignment_history.push(params.clone());
        }
        if let Some(ref query) = patch.database_query {
            self.database_history.push(query.clone());
        }
        if let Some(ref token) = patch.job_token {
            self.job_token = Some(token.clone());
        }
        if let Some(n) = patch.poll_attempt {
            self.poll_attempt = n;
        }
        if let Some(ref note) = patch.diagnostic {
            self.diagnostic = Some(note.clone());
        }
        if let Some(flag) = patch.forced_generation {
            self.forced_generation = flag;
        }
    }

    /// Returns `true` if the router rejected the question as out of domain.
    #[must_use]
    pub fn is_out_of_domain(&self) -> bool {
        matches!(self.routing_reason, Some(RoutingReason::OutOfDomain))
    }
}

/// A node's result: messages to append, fields to overwrite, and the edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    /// Messages appended to the history, in order.
    pub messages: Vec<Message>,
    /// New status.
    pub status: Option<Status>,
    /// New error text.
    pub error: Option<String>,
    /// Metadata updates.
    pub metadata: MetadataPatch,
    /// Requested next step.
    pub next: Option<Next>,
}

impl StatePatch {
    /// Creates a patch that ends the run with `status = error`.
    #[must_use]
    pub fn fatal(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: Some(Status::Error),
            metadata: MetadataPatch {
                diagnostic: Some(error.clone()),
                ..MetadataPatch::default()
            },
            error: Some(error),
            ..Self::default()
        }
    }

    /// Appends a message.
    #[must_use]
    pub fn message(mut self, msg: Message) -> Self {
        self.messages.push(msg);
        self
    }

    /// Sets the next step.
    #[must_use]
    pub const fn next(mut self, next: Next) -> Self {
        self.next = Some(next);
        self
    }

    /// Sets the diagnostic note.
    #[must_use]
    pub fn diagnostic(mut self, note: impl Into<String>) -> Self {
        self.metadata.diagnostic = Some(note.into());
        self
    }

    /// Returns `true` if the patch ends the run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.status == Some(Status::Error)
    }
}

/// State threaded through every node for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Append-only conversation history.
    pub history: Vec<Message>,
    /// Run status.
    pub status: Status,
    /// Error text when `status` is `Error`.
    pub error: Option<String>,
    /// Typed context.
    pub metadata: Metadata,
}

impl State {
    /// Creates the initial state for a question.
    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            history: vec![Message::question(question)],
            ..Self::default()
        }
    }

    /// Returns the original question, if present.
    #[must_use]
    pub fn question(&self) -> Option<&str> {
        self.history
            .iter()
            .find(|m| m.annotation == Annotation::Question)
            .map(|m| m.content.as_str())
    }

    /// Returns tool progress and response messages, in order.
    pub fn tool_evidence(&self) -> impl Iterator<Item = &Message> {
        self.history
            .iter()
            .filter(|m| m.annotation.is_tool_evidence())
    }

    /// Returns the most recent message carrying `annotation`.
    #[must_use]
    pub fn latest(&self, annotation: Annotation) -> Option<&Message> {
        self.history
            .iter()
            .rev()
            .find(|m| m.annotation == annotation)
    }

    /// Returns the final answer text, if one was produced.
    #[must_use]
    pub fn final_answer(&self) -> Option<&str> {
        self.latest(Annotation::FinalAnswer)
            .map(|m| m.content.as_str())
    }

    /// Returns `true` if the run ended in error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// Returns a new state with `patch` applied.
    #[must_use]
    pub fn merged(&self, patch: &StatePatch) -> Self {
        let mut next = self.clone();
        next.history.extend(patch.messages.iter().cloned());
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(ref error) = patch.error {
            next.error = Some(error.clone());
        }
        next.metadata.apply(&patch.metadata);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::{Database, SearchParams};
    use proptest::prelude::*;

    #[test]
    fn test_new_state_has_question() {
        let state = State::new("What is TP53?");
        assert_eq!(state.question(), Some("What is TP53?"));
        assert_eq!(state.status, Status::Ok);
        assert_eq!(state.metadata.eval_count, 0);
    }

    #[test]
    fn test_merge_inherits_unset_fields() {
        let mut state = State::new("q");
        state.metadata.routing_reason = Some(RoutingReason::Reason("gene question".into()));
        state.metadata.job_token = Some("RID1".into());

        let patch = StatePatch {
            metadata: MetadataPatch {
                eval_count: Some(1),
                ..MetadataPatch::default()
            },
            ..StatePatch::default()
        };
        let merged = state.merged(&patch);

        assert_eq!(merged.metadata.eval_count, 1);
        assert_eq!(merged.metadata.job_token.as_deref(), Some("RID1"));
        assert_eq!(
            merged.metadata.routing_reason,
            Some(RoutingReason::Reason("gene question".into()))
        );
        // Input untouched.
        assert_eq!(state.metadata.eval_count, 0);
    }

    #[test]
    fn test_merge_appends_dedup_records() {
        let state = State::new("q");
        let query = DatabaseQuery::Search(SearchParams {
            db: Database::Gene,
            term: "TTTY7".into(),
            limit: 10,
        });
        let patch = StatePatch {
            metadata: MetadataPatch {
                database_query: Some(query.clone()),
                ..MetadataPatch::default()
            },
            ..StatePatch::default()
        };
        let once = state.merged(&patch);
        let twice = once.merged(&patch);
        assert_eq!(once.metadata.database_history, vec![query.clone()]);
        assert_eq!(twice.metadata.database_history.len(), 2);
    }

    #[test]
    fn test_fatal_patch() {
        let state = State::new("q").merged(&StatePatch::fatal("boom"));
        assert!(state.is_error());
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert_eq!(state.metadata.diagnostic.as_deref(), Some("boom"));
    }

    #[test]
    fn test_latest_and_final_answer() {
        let state = State::new("q").merged(
            &StatePatch::default()
                .message(Message::tool(Annotation::DatabaseProgress, "first"))
                .message(Message::tool(Annotation::DatabaseProgress, "second"))
                .message(Message::final_answer("Y")),
        );
        assert_eq!(
            state
                .latest(Annotation::DatabaseProgress)
                .map(|m| m.content.as_str()),
            Some("second")
        );
        assert_eq!(state.final_answer(), Some("Y"));
        assert_eq!(state.tool_evidence().count(), 2);
    }

    #[test]
    fn test_out_of_domain_display() {
        assert_eq!(RoutingReason::OutOfDomain.to_string(), "IRRELEVANT REQUEST.");
        let mut meta = Metadata::default();
        assert!(!meta.is_out_of_domain());
        meta.routing_reason = Some(RoutingReason::OutOfDomain);
        assert!(meta.is_out_of_domain());
    }

    #[test]
    fn test_next_display() {
        assert_eq!(Next::Tool(ToolKind::Database).to_string(), "database-agent");
        assert_eq!(Next::Phase(Phase::Poll).to_string(), "poll");
        assert_eq!(Next::Generate.to_string(), "generate");
    }

    proptest! {
        #[test]
        fn prop_history_never_shrinks(contents in proptest::collection::vec(".{0,20}", 0..8)) {
            let state = State::new("q");
            let mut patch = StatePatch::default();
            for c in &contents {
                patch = patch.message(Message::tool(Annotation::SearchResponse, c.clone()));
            }
            let merged = state.merged(&patch);
            prop_assert_eq!(merged.history.len(), state.history.len() + contents.len());
            prop_assert_eq!(&merged.history[..1], &state.history[..]);
        }
    }
}
