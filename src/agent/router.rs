//! Router node: picks the next tool agent or rejects the question.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::config::AgentConfig;
use super::decode::decode;
use super::prompt::{PromptSet, build_router_prompt};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::message::format_transcript;
use crate::core::state::{MetadataPatch, Next, RoutingReason, State, StatePatch, ToolKind};

/// Attempts at getting a valid decision before falling back.
pub const MAX_ROUTE_ATTEMPTS: usize = 3;
/// Destination used when every attempt fails.
pub const FALLBACK_TOOL: ToolKind = ToolKind::Database;

/// Agents the router may choose. Legacy names are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum Choice {
    #[serde(alias = "alignment_agent", alias = "blast_agent")]
    AlignmentAgent,
    #[serde(alias = "database_agent", alias = "eutils_agent")]
    DatabaseAgent,
    #[serde(alias = "search_agent")]
    SearchAgent,
    #[serde(alias = "irrelevant_questions")]
    Reject,
}

#[derive(Debug, Deserialize)]
struct RouteDecision {
    agent: Choice,
    #[serde(default)]
    reason: String,
}

/// Chooses the next destination from the question and gathered evidence.
pub struct Router {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    max_tokens: u32,
}

impl Router {
    /// Creates a router backed by `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, config: &AgentConfig, prompts: &PromptSet) -> Self {
        Self {
            provider,
            model: config.router_model.clone(),
            system_prompt: prompts.router.clone(),
            max_tokens: config.router_max_tokens,
        }
    }

    /// Runs the router node.
    ///
    /// Invalid replies are re-prompted up to [`MAX_ROUTE_ATTEMPTS`] times,
    /// then control falls back to [`FALLBACK_TOOL`].
    pub async fn route(&self, state: &State) -> StatePatch {
        let Some(question) = state.question() else {
            return StatePatch::fatal("No user question found");
        };

        let history = format_transcript(state.tool_evidence());
        let prompt = build_router_prompt(question, &history, state.metadata.eval_reason.as_deref());

        for attempt in 1..=MAX_ROUTE_ATTEMPTS {
            let reply = match self.execute(self.provider.as_ref(), &prompt).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(attempt, error = %e, "router call failed");
                    continue;
                }
            };
            match decode::<RouteDecision>(&reply.content) {
                Ok(decision) => return Self::decided(decision),
                Err(e) => {
                    warn!(attempt, kind = ?e.kind, reply = %reply.content, "invalid router decision");
                }
            }
        }

        warn!(
            attempts = MAX_ROUTE_ATTEMPTS,
            fallback = %FALLBACK_TOOL,
            "router failed, using fallback agent"
        );
        StatePatch::default()
            .next(Next::Tool(FALLBACK_TOOL))
            .diagnostic(format!(
                "Router gave no valid decision after {MAX_ROUTE_ATTEMPTS} attempts; falling back to {FALLBACK_TOOL}"
            ))
    }

    fn decided(decision: RouteDecision) -> StatePatch {
        let (next, reason) = match decision.agent {
            Choice::AlignmentAgent => (Next::Tool(ToolKind::Alignment), None),
            Choice::DatabaseAgent => (Next::Tool(ToolKind::Database), None),
            Choice::SearchAgent => (Next::Tool(ToolKind::Search), None),
            Choice::Reject => (Next::Generate, Some(RoutingReason::OutOfDomain)),
        };
        let reason = reason.unwrap_or_else(|| RoutingReason::Reason(decision.reason.clone()));
        info!(next = %next, reason = %reason, "routing decision");
        debug!(raw_reason = %decision.reason, "router rationale");

        StatePatch {
            next: Some(next),
            metadata: MetadataPatch {
                diagnostic: Some(format!("Routing to {next}: {reason}")),
                routing_reason: Some(reason),
                ..MetadataPatch::default()
            },
            ..StatePatch::default()
        }
    }
}

#[async_trait]
impl Agent for Router {
    fn name(&self) -> &'static str {
        "router"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedProvider;
    use crate::core::message::{Annotation, Message};
    use crate::core::state::Status;
    use test_case::test_case;

    fn router(provider: &Arc<ScriptedProvider>) -> Router {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        Router::new(provider.clone(), &config, &PromptSet::defaults())
    }

    #[test_case(r#"{"agent": "database-agent", "reason": "gene lookup"}"#, Next::Tool(ToolKind::Database); "database")]
    #[test_case(r#"{"agent": "alignment-agent", "reason": "sequence"}"#, Next::Tool(ToolKind::Alignment); "alignment")]
    #[test_case(r#"{"agent": "search-agent", "reason": "web"}"#, Next::Tool(ToolKind::Search); "search")]
    #[test_case(r#"{"agent": "blast_agent", "reason": "legacy name"}"#, Next::Tool(ToolKind::Alignment); "legacy alias")]
    #[tokio::test]
    async fn test_route_choices(reply: &str, expected: Next) {
        let provider = Arc::new(ScriptedProvider::new([reply]));
        let patch = router(&provider).route(&State::new("q")).await;
        assert_eq!(patch.next, Some(expected));
        assert!(matches!(
            patch.metadata.routing_reason,
            Some(RoutingReason::Reason(_))
        ));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_reject_sets_out_of_domain() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"agent": "reject", "reason": "cooking question"}"#,
        ]));
        let patch = router(&provider).route(&State::new("How do I bake bread?")).await;
        assert_eq!(patch.next, Some(Next::Generate));
        assert_eq!(
            patch.metadata.routing_reason,
            Some(RoutingReason::OutOfDomain)
        );
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let provider = Arc::new(ScriptedProvider::new([
            "I would use the database.",
            r#"{"agent": "pubmed-agent", "reason": "not allowed"}"#,
            r#"{"agent": "search-agent", "reason": "third time"}"#,
        ]));
        let patch = router(&provider).route(&State::new("q")).await;
        assert_eq!(patch.next, Some(Next::Tool(ToolKind::Search)));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_falls_back_after_three_failures() {
        let provider = Arc::new(ScriptedProvider::new(["nope", "still nope", "{broken", "unused"]));
        let patch = router(&provider).route(&State::new("q")).await;
        assert_eq!(patch.next, Some(Next::Tool(FALLBACK_TOOL)));
        assert_eq!(provider.calls(), MAX_ROUTE_ATTEMPTS);
        assert!(patch.metadata.routing_reason.is_none());
        assert!(patch.status.is_none());
    }

    #[tokio::test]
    async fn test_missing_question_is_fatal() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<&str>::new()));
        let patch = router(&provider).route(&State::default()).await;
        assert_eq!(patch.status, Some(Status::Error));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_prompt_carries_evidence_and_eval_reason() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"agent": "database-agent", "reason": "r"}"#,
        ]));
        let mut state = State::new("Which chromosome is TTTY7 on?").merged(
            &StatePatch::default()
                .message(Message::tool(Annotation::DatabaseProgress, "idlist 246119"))
                .message(Message::tool(Annotation::DatabaseError, "duplicate query")),
        );
        state.metadata.eval_reason = Some("only ids so far".to_string());

        let _ = router(&provider).route(&state).await;
        let requests = provider.requests();
        let user = &requests[0].messages[1].content;
        assert!(user.contains("idlist 246119"));
        assert!(!user.contains("duplicate query"));
        assert!(user.contains("only ids so far"));
    }
}
