//! Database agent: NCBI E-utilities search followed by fetch.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Extractor, ToolAgent, exchange, tool_error, tool_fatal, unknown_phase};
use crate::agent::config::AgentConfig;
use crate::agent::prompt::{PromptSet, build_fetch_prompt, build_search_prompt};
use crate::agent::provider::LlmProvider;
use crate::api::client::{ApiClient, MAX_PAYLOAD_CHARS, encode_query_value, truncate_payload};
use crate::core::message::{Annotation, Message, format_transcript};
use crate::core::params::{DatabaseQuery, FetchParams, SearchParams};
use crate::core::state::{MetadataPatch, Next, Phase, State, StatePatch, ToolKind};

/// Two-phase E-utilities agent.
pub struct DatabaseAgent {
    provider: Arc<dyn LlmProvider>,
    api: Arc<dyn ApiClient>,
    search_extractor: Extractor,
    fetch_extractor: Extractor,
    base: String,
}

impl DatabaseAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        api: Arc<dyn ApiClient>,
        config: &AgentConfig,
        prompts: &PromptSet,
    ) -> Self {
        Self {
            provider,
            api,
            search_extractor: Extractor::new(
                "database-search",
                config.tool_model.clone(),
                prompts.database_search.clone(),
                config.tool_max_tokens,
            ),
            fetch_extractor: Extractor::new(
                "database-fetch",
                config.tool_model.clone(),
                prompts.database_fetch.clone(),
                config.tool_max_tokens,
            ),
            base: config.eutils_base.clone(),
        }
    }

    fn search_url(&self, params: &SearchParams) -> String {
        format!(
            "{}/esearch.fcgi?db={}&term={}&retmode=json&sort=relevance&retmax={}",
            self.base,
            params.db,
            encode_query_value(&params.term),
            params.limit
        )
    }

    fn fetch_url(&self, params: &FetchParams) -> String {
        let ids = params
            .ids
            .iter()
            .map(|id| urlencoding::encode(id.trim()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/{}.fcgi?db={}&id={ids}&retmode=json&sort=relevance",
            self.base,
            params.method.as_str(),
            params.db
        )
    }

    async fn search(&self, state: &State) -> StatePatch {
        let Some(question) = state.question() else {
            return tool_fatal(Annotation::DatabaseError, "No user question found");
        };

        let history = format_transcript(state.tool_evidence());
        let prompt = build_search_prompt(question, &history, &state.metadata.database_history);

        let params: SearchParams =
            match self.search_extractor.extract(self.provider.as_ref(), &prompt).await {
                Ok(params) => params,
                Err(e) => {
                    return tool_error(
                        Annotation::DatabaseError,
                        format!("Cannot extract valid search parameters: {e}"),
                    );
                }
            };

        if params.term.trim().is_empty() {
            return tool_error(Annotation::DatabaseError, "Missing search term parameter");
        }

        if params.is_duplicate(&state.metadata.database_history) {
            warn!(db = %params.db, term = %params.term, "duplicate search");
            return tool_error(
                Annotation::DatabaseError,
                "Duplicate parameters detected (same database and term), please try with \
                 different parameters or a different database",
            );
        }

        let url = self.search_url(&params);
        debug!(url = %url, "esearch");
        let Some(response) = self.api.get(&url).await else {
            return tool_error(
                Annotation::DatabaseError,
                format!("E-utilities esearch API call failed: {url}"),
            );
        };
        let payload = truncate_payload(&response, MAX_PAYLOAD_CHARS);
        info!(db = %params.db, term = %params.term, chars = response.len(), "esearch complete");

        StatePatch {
            messages: vec![Message::tool(
                Annotation::DatabaseProgress,
                exchange(&url, &payload),
            )],
            next: Some(Next::Phase(Phase::Fetch)),
            metadata: MetadataPatch {
                diagnostic: Some(format!("Searched {} for \"{}\"", params.db, params.term)),
                database_query: Some(DatabaseQuery::Search(params)),
                ..MetadataPatch::default()
            },
            ..StatePatch::default()
        }
    }

    async fn fetch(&self, state: &State) -> StatePatch {
        let Some(question) = state.question() else {
            return tool_fatal(Annotation::DatabaseError, "No user question found");
        };

        let history = format_transcript(state.history.iter().filter(|m| {
            matches!(
                m.annotation,
                Annotation::DatabaseProgress | Annotation::DatabaseResponse
            )
        }));
        let prompt = build_fetch_prompt(question, &history, &state.metadata.database_history);

        let params: FetchParams =
            match self.fetch_extractor.extract(self.provider.as_ref(), &prompt).await {
                Ok(params) => params,
                Err(e) => {
                    return tool_error(
                        Annotation::DatabaseError,
                        format!("Cannot extract valid fetch parameters: {e}"),
                    );
                }
            };

        if params.is_duplicate(&state.metadata.database_history) {
            warn!(db = %params.db, ids = %params.joined_ids(), "duplicate fetch");
            return tool_error(
                Annotation::DatabaseError,
                "Duplicate parameters detected (same database and IDs), please try with \
                 different parameters or a different database",
            );
        }

        let url = self.fetch_url(&params);
        debug!(url = %url, "fetch");
        let Some(response) = self.api.get(&url).await else {
            return tool_error(
                Annotation::DatabaseError,
                format!(
                    "E-utilities {} API call failed: {url}",
                    params.method.as_str()
                ),
            );
        };
        let payload = truncate_payload(&response, MAX_PAYLOAD_CHARS);
        info!(
            db = %params.db,
            method = params.method.as_str(),
            ids = params.ids.len(),
            chars = response.len(),
            "fetch complete"
        );

        StatePatch {
            messages: vec![Message::tool(
                Annotation::DatabaseResponse,
                exchange(&url, &payload),
            )],
            metadata: MetadataPatch {
                diagnostic: Some(format!(
                    "Fetched {} record(s) from {}",
                    params.ids.len(),
                    params.db
                )),
                database_query: Some(DatabaseQuery::Fetch(params)),
                ..MetadataPatch::default()
            },
            ..StatePatch::default()
        }
    }
}

#[async_trait]
impl ToolAgent for DatabaseAgent {
    fn kind(&self) -> ToolKind {
        ToolKind::Database
    }

    fn entry(&self) -> Phase {
        Phase::Search
    }

    async fn step(&self, phase: Phase, state: &State) -> StatePatch {
        match phase {
            Phase::Search => self.search(state).await,
            Phase::Fetch => self.fetch(state).await,
            other => unknown_phase(self.kind(), other),
        }
    }
}
