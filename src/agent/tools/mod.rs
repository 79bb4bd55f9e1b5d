//! Specialist tool agents.
//!
//! Each agent is a small state machine over [`Phase`]s. The orchestrator
//! enters it at [`ToolAgent::entry`] and keeps calling [`ToolAgent::step`]
//! while the returned patch asks for another phase. A patch with no `next`
//! hands control to the evaluator.

pub mod alignment;
pub mod database;
pub mod search;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;

pub use alignment::AlignmentAgent;
pub use database::DatabaseAgent;
pub use search::SearchAgent;

use super::decode::decode;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::message::{Annotation, Message};
use crate::core::state::{Phase, State, StatePatch, ToolKind};

/// A tool agent driven phase by phase.
#[async_trait]
pub trait ToolAgent: Send + Sync {
    /// Which tool this is.
    fn kind(&self) -> ToolKind;

    /// The first phase run on delegation.
    fn entry(&self) -> Phase;

    /// Runs one phase against `state`.
    ///
    /// Recoverable failures come back as tool-error messages with no
    /// `next`; only missing input and exhausted attempts set
    /// `status = error`.
    async fn step(&self, phase: Phase, state: &State) -> StatePatch;
}

/// Ends the tool's turn with a visible, non-fatal error message.
pub(crate) fn tool_error(annotation: Annotation, text: impl Into<String>) -> StatePatch {
    let text = text.into();
    StatePatch::default()
        .diagnostic(text.clone())
        .message(Message::tool(annotation, text))
}

/// Ends the run, recording the reason as a tool-error message too.
pub(crate) fn tool_fatal(annotation: Annotation, text: impl Into<String>) -> StatePatch {
    let text = text.into();
    StatePatch::fatal(text.clone()).message(Message::tool(annotation, text))
}

/// Patch for a phase the agent does not have.
pub(crate) fn unknown_phase(kind: ToolKind, phase: Phase) -> StatePatch {
    StatePatch::fatal(format!("{kind} has no {phase} phase"))
}

/// LLM-backed parameter extractor used inside tool agents.
pub(crate) struct Extractor {
    name: &'static str,
    model: String,
    system_prompt: String,
    max_tokens: u32,
}

impl Extractor {
    pub(crate) const fn new(
        name: &'static str,
        model: String,
        system_prompt: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            name,
            model,
            system_prompt,
            max_tokens,
        }
    }

    /// Asks the model for a parameter object and decodes it.
    ///
    /// The error string is ready to show in a tool-error message.
    pub(crate) async fn extract<T: DeserializeOwned>(
        &self,
        provider: &dyn LlmProvider,
        prompt: &str,
    ) -> Result<T, String> {
        let reply = self
            .execute(provider, prompt)
            .await
            .map_err(|e| e.to_string())?;
        decode(&reply.content).map_err(|e| {
            warn!(extractor = self.name, kind = ?e.kind, reply = %reply.content, "invalid parameters");
            e.into_agent_error(&reply.content).to_string()
        })
    }
}

#[async_trait]
impl Agent for Extractor {
    fn name(&self) -> &'static str {
        self.name
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

/// Formats a request/response pair for the history.
pub(crate) fn exchange(target: &str, payload: &str) -> String {
    format!("[{target}]->\n[{payload}]")
}
