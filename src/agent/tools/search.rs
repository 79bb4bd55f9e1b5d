//! Web-search agent: one instant-answer lookup for the question.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{ToolAgent, exchange, tool_error, tool_fatal, unknown_phase};
use crate::agent::config::AgentConfig;
use crate::api::client::{ApiClient, MAX_PAYLOAD_CHARS, encode_query_value, truncate_payload};
use crate::core::message::{Annotation, Message};
use crate::core::state::{Phase, State, StatePatch, ToolKind};

/// Related topics kept from one lookup.
const MAX_TOPICS: usize = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InstantAnswer {
    heading: String,
    abstract_text: String,
    abstract_source: String,
    answer: String,
    definition: String,
    related_topics: Vec<Topic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct Topic {
    text: String,
}

impl InstantAnswer {
    /// Flattens the non-empty fields into plain text.
    fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.heading.is_empty() {
            parts.push(format!("Heading: {}", self.heading));
        }
        if !self.answer.is_empty() {
            parts.push(format!("Answer: {}", self.answer));
        }
        if !self.abstract_text.is_empty() {
            if self.abstract_source.is_empty() {
                parts.push(format!("Abstract: {}", self.abstract_text));
            } else {
                parts.push(format!(
                    "Abstract ({}): {}",
                    self.abstract_source, self.abstract_text
                ));
            }
        }
        if !self.definition.is_empty() {
            parts.push(format!("Definition: {}", self.definition));
        }
        let topics: Vec<_> = self
            .related_topics
            .iter()
            .filter(|t| !t.text.is_empty())
            .take(MAX_TOPICS)
            .map(|t| format!("- {}", t.text))
            .collect();
        if !topics.is_empty() {
            parts.push(format!("Related:\n{}", topics.join("\n")));
        }
        parts.join("\n")
    }

    fn is_empty(&self) -> bool {
        self.answer.is_empty()
            && self.abstract_text.is_empty()
            && self.definition.is_empty()
            && self.related_topics.iter().all(|t| t.text.is_empty())
    }
}

/// Single-shot web lookup against an instant-answer endpoint.
pub struct SearchAgent {
    api: Arc<dyn ApiClient>,
    search_url: String,
}

impl SearchAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(api: Arc<dyn ApiClient>, config: &AgentConfig) -> Self {
        Self {
            api,
            search_url: config.search_url.clone(),
        }
    }

    async fn lookup(&self, state: &State) -> StatePatch {
        let Some(question) = state.question() else {
            return tool_fatal(Annotation::SearchError, "No user question found");
        };

        let url = format!(
            "{}?q={}&format=json&no_html=1&skip_disambig=1",
            self.search_url,
            encode_query_value(question)
        );
        debug!(url = %url, "web lookup");

        let Some(body) = self.api.get(&url).await else {
            return tool_error(Annotation::SearchError, format!("Web search failed: {url}"));
        };
        let answer: InstantAnswer = match serde_json::from_str(&body) {
            Ok(answer) => answer,
            Err(e) => {
                return tool_error(
                    Annotation::SearchError,
                    format!("Web search returned an unreadable response: {e}"),
                );
            }
        };
        if answer.is_empty() {
            return tool_error(Annotation::SearchError, "Web search found no relevant results");
        }

        let summary = answer.summary();
        info!(chars = summary.len(), "web lookup complete");
        StatePatch::default()
            .message(Message::tool(
                Annotation::SearchResponse,
                exchange(&url, &truncate_payload(&summary, MAX_PAYLOAD_CHARS)),
            ))
            .diagnostic("Web search returned results")
    }
}

#[async_trait]
impl ToolAgent for SearchAgent {
    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }

    fn entry(&self) -> Phase {
        Phase::Lookup
    }

    async fn step(&self, phase: Phase, state: &State) -> StatePatch {
        match phase {
            Phase::Lookup => self.lookup(state).await,
            other => unknown_phase(self.kind(), other),
        }
    }
}
