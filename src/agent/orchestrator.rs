//! Control graph for one question.
//!
//! Runs Router → tool agent → Evaluator, looping back to the Router until the
//! Evaluator picks generation, then exits through the Generator. Any node that
//! sets `status = error` exits immediately.
//!
//! ```text
//! Router ──▶ {alignment | database | search} ──▶ Evaluator ──▶ Generator
//!   ▲   └──────────────── reject ───────────────────┼──────────────▲
//!   └──────────────────── continue ◀────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::client::create_provider;
use super::config::AgentConfig;
use super::evaluator::Evaluator;
use super::generator::Generator;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::router::Router;
use super::tools::{AlignmentAgent, DatabaseAgent, SearchAgent, ToolAgent};
use crate::api::client::{ApiClient, HttpApiClient};
use crate::core::message::Message;
use crate::core::state::{Next, Phase, State, StatePatch, Status, ToolKind};
use crate::error::AgentError;

/// A node of the control graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    /// Picks the next tool agent.
    Router,
    /// Judges evidence sufficiency.
    Evaluator,
    /// Writes the final answer.
    Generator,
    /// A tool agent in one of its phases.
    Tool(ToolKind, Phase),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Router => f.write_str("router"),
            Self::Evaluator => f.write_str("evaluator"),
            Self::Generator => f.write_str("generator"),
            Self::Tool(kind, phase) => write!(f, "{kind}/{phase}"),
        }
    }
}

/// What one node execution produced.
#[derive(Debug, Clone, Serialize)]
pub struct NodeEvent {
    /// Node name, `tool/phase` for tool agents.
    pub node: String,
    /// Requested next step, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Next>,
    /// Status after the node ran.
    pub status: Status,
    /// Messages the node appended.
    pub messages: Vec<Message>,
    /// The node's diagnostic line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// The original question.
    pub question: String,
    /// Final answer text, absent when the run ended in error.
    pub answer: Option<String>,
    /// Terminal status.
    pub status: Status,
    /// Error description when `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Evaluator invocations.
    pub eval_rounds: u32,
    /// Whether generation was forced by the evaluation cap.
    pub low_confidence: bool,
    /// Node executions.
    pub steps: usize,
    /// Per-node trace in execution order.
    pub trace: Vec<NodeEvent>,
    /// Full message history.
    pub history: Vec<Message>,
    /// Wall-clock time of the run.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl QueryResult {
    /// Returns the answer, or an `Error: …` line for failed runs.
    #[must_use]
    pub fn answer_or_error(&self) -> String {
        match (&self.answer, &self.error) {
            (Some(answer), _) => answer.clone(),
            (None, Some(error)) => format!("Error: {error}"),
            (None, None) => "Error: no answer produced".to_string(),
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

/// Callback invoked after every node execution.
pub type Observer = Box<dyn Fn(&NodeEvent) + Send + Sync>;

/// Runs the control graph.
pub struct Orchestrator {
    router: Router,
    evaluator: Evaluator,
    generator: Generator,
    alignment: AlignmentAgent,
    database: DatabaseAgent,
    search: SearchAgent,
    max_steps: usize,
    observer: Option<Observer>,
}

impl Orchestrator {
    /// Creates an orchestrator from explicit collaborators.
    ///
    /// Loads prompt templates from [`AgentConfig::prompt_dir`], falling back
    /// to compiled-in defaults.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        api: Arc<dyn ApiClient>,
        config: &AgentConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self::with_prompts(provider, api, config, &prompts)
    }

    /// Creates an orchestrator with an explicit prompt set.
    #[must_use]
    pub fn with_prompts(
        provider: Arc<dyn LlmProvider>,
        api: Arc<dyn ApiClient>,
        config: &AgentConfig,
        prompts: &PromptSet,
    ) -> Self {
        Self {
            router: Router::new(Arc::clone(&provider), config, prompts),
            evaluator: Evaluator::new(Arc::clone(&provider), config, prompts),
            generator: Generator::new(Arc::clone(&provider), config, prompts),
            alignment: AlignmentAgent::new(
                Arc::clone(&provider),
                Arc::clone(&api),
                config,
                prompts,
            ),
            database: DatabaseAgent::new(Arc::clone(&provider), Arc::clone(&api), config, prompts),
            search: SearchAgent::new(api, config),
            max_steps: config.max_steps,
            observer: None,
        }
    }

    /// Creates an orchestrator with the configured provider and HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the provider is unknown or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let provider: Arc<dyn LlmProvider> = Arc::from(create_provider(config)?);
        let api: Arc<dyn ApiClient> = Arc::new(HttpApiClient::from_config(config)?);
        Ok(Self::new(provider, api, config))
    }

    /// Installs a callback run after every node.
    #[must_use]
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    fn tool(&self, kind: ToolKind) -> &dyn ToolAgent {
        match kind {
            ToolKind::Alignment => &self.alignment,
            ToolKind::Database => &self.database,
            ToolKind::Search => &self.search,
        }
    }

    /// Resolves the edge out of `node` for the `next` it returned.
    ///
    /// Returns `Ok(None)` when `node` is an exit.
    fn transition(&self, node: Node, next: Option<Next>) -> Result<Option<Node>, AgentError> {
        let resolved = match (node, next) {
            (Node::Generator, None) => return Ok(None),
            (Node::Router, Some(Next::Tool(kind))) => Node::Tool(kind, self.tool(kind).entry()),
            (Node::Router | Node::Evaluator, Some(Next::Generate)) => Node::Generator,
            (Node::Evaluator, Some(Next::Router)) => Node::Router,
            (Node::Tool(..), None) => Node::Evaluator,
            (Node::Tool(kind, _), Some(Next::Phase(phase))) => Node::Tool(kind, phase),
            (from, next) => {
                return Err(AgentError::InvalidTransition {
                    from: from.to_string(),
                    next: next.map_or_else(|| "none".to_string(), |n| n.to_string()),
                });
            }
        };
        Ok(Some(resolved))
    }

    async fn run_node(&self, node: Node, state: &State) -> StatePatch {
        match node {
            Node::Router => self.router.route(state).await,
            Node::Evaluator => self.evaluator.evaluate(state).await,
            Node::Generator => self.generator.generate(state).await,
            Node::Tool(kind, phase) => self.tool(kind).step(phase, state).await,
        }
    }

    /// Answers one question.
    ///
    /// Graph faults (an invalid edge, the step guard) end the run with
    /// `status = error` in the result rather than an `Err`. The step guard
    /// never stops the generator.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] if the question is empty.
    pub async fn ask(&self, question: &str) -> Result<QueryResult, AgentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::Orchestration {
                message: "Question cannot be empty".to_string(),
            });
        }

        let start = Instant::now();
        let mut state = State::new(question);
        let mut trace = Vec::new();
        let mut node = Node::Router;
        let mut steps = 0usize;

        info!(question, "run started");
        loop {
            // The generator always runs once reached.
            if steps >= self.max_steps && node != Node::Generator {
                let err = AgentError::StepLimitExceeded {
                    max_steps: self.max_steps,
                };
                error!(steps, "step limit reached");
                state = state.merged(&StatePatch::fatal(err.to_string()));
                break;
            }
            steps += 1;

            debug!(step = steps, node = %node, "running node");
            let patch = self.run_node(node, &state).await;
            state = state.merged(&patch);

            let event = NodeEvent {
                node: node.to_string(),
                next: patch.next,
                status: state.status,
                messages: patch.messages.clone(),
                diagnostic: patch.metadata.diagnostic.clone(),
            };
            if let Some(ref observer) = self.observer {
                observer(&event);
            }
            trace.push(event);

            if patch.is_fatal() {
                warn!(node = %node, error = ?state.error, "run ended with error");
                break;
            }

            match self.transition(node, patch.next) {
                Ok(Some(following)) => node = following,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "invalid transition");
                    state = state.merged(&StatePatch::fatal(e.to_string()));
                    break;
                }
            }
        }

        let elapsed = start.elapsed();
        info!(
            steps,
            eval_rounds = state.metadata.eval_count,
            status = ?state.status,
            elapsed_ms = elapsed.as_millis(),
            "run finished"
        );

        let answer = if state.is_error() {
            None
        } else {
            state.final_answer().map(str::to_string)
        };
        Ok(QueryResult {
            question: question.to_string(),
            answer,
            status: state.status,
            error: state.error,
            eval_rounds: state.metadata.eval_count,
            low_confidence: state.metadata.forced_generation,
            steps,
            trace,
            history: state.history,
            elapsed,
        })
    }
}
