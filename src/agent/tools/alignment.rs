//! Sequence-alignment agent: BLAST submit, then poll with backoff.
//!
//! Submit extracts a sequence from the question, rejects a sequence already
//! submitted for this question, and stores the returned job token (RID).
//! Poll waits `min(15 * (attempt + 1), 60)` seconds before each status
//! check and gives up after the fourth check that does not complete.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{Extractor, ToolAgent, tool_error, tool_fatal, unknown_phase};
use crate::agent::config::AgentConfig;
use crate::agent::prompt::{PromptSet, build_alignment_prompt};
use crate::agent::provider::LlmProvider;
use crate::api::client::{ApiClient, MAX_PAYLOAD_CHARS, encode_query_value, truncate_payload};
use crate::core::message::{Annotation, Message, format_transcript};
use crate::core::params::AlignmentParams;
use crate::core::state::{MetadataPatch, Next, Phase, State, StatePatch, ToolKind};

/// Polls that may report "not done" and still be retried.
pub const MAX_POLL_RETRIES: u32 = 3;
/// Base poll interval step.
const POLL_STEP_SECS: u64 = 15;
/// Longest single poll wait.
const POLL_CAP_SECS: u64 = 60;

static RID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*RID = (\S+)").ok());

/// Wait before poll `attempt` (0-indexed).
#[must_use]
pub fn poll_wait(attempt: u32) -> Duration {
    let secs = POLL_STEP_SECS.saturating_mul(u64::from(attempt) + 1);
    Duration::from_secs(secs.min(POLL_CAP_SECS))
}

/// Extracts the job token from a BLAST submission response.
#[must_use]
pub fn extract_rid(response: &str) -> Option<&str> {
    RID_PATTERN
        .as_ref()?
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// State of a submitted job as reported by a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Not finished yet.
    Running,
    /// The service reports the search failed.
    Failed,
    /// The token is unknown or expired.
    Unknown,
    /// Results are available.
    Done,
}

impl JobStatus {
    /// Classifies a status response body.
    #[must_use]
    pub fn classify(response: &str) -> Self {
        if response.contains("Status=WAITING") || response.contains("is still running") {
            Self::Running
        } else if response.contains("Status=FAILED") {
            Self::Failed
        } else if response.contains("Status=UNKNOWN") {
            Self::Unknown
        } else {
            Self::Done
        }
    }
}

/// Normalizes an extracted sequence: whitespace removed, uppercased.
///
/// Returns `None` unless the result is a non-empty IUPAC nucleotide string.
fn clean_sequence(raw: &str) -> Option<String> {
    let seq: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let valid = !seq.is_empty() && seq.chars().all(|c| "ACGTURYKMSWBDHVN-".contains(c));
    valid.then_some(seq)
}

/// BLAST submit/poll agent.
pub struct AlignmentAgent {
    provider: Arc<dyn LlmProvider>,
    api: Arc<dyn ApiClient>,
    extractor: Extractor,
    blast_url: String,
}

impl AlignmentAgent {
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
            extractor: Extractor::new(
                "alignment",
                config.tool_model.clone(),
                prompts.alignment.clone(),
                config.tool_max_tokens,
            ),
            blast_url: config.blast_url.clone(),
        }
    }

    async fn submit(&self, state: &State) -> StatePatch {
        let Some(question) = state.question() else {
            return tool_fatal(Annotation::AlignmentError, "No user question found");
        };

        let history = format_transcript(state.tool_evidence());
        let prompt = build_alignment_prompt(question, &history, &state.metadata.alignment_history);

        let params: AlignmentParams =
            match self.extractor.extract(self.provider.as_ref(), &prompt).await {
                Ok(params) => params,
                Err(e) => {
                    return tool_error(
                        Annotation::AlignmentError,
                        format!("Cannot extract valid alignment parameters: {e}"),
                    );
                }
            };

        let Some(sequence) = clean_sequence(&params.sequence) else {
            return tool_error(
                Annotation::AlignmentError,
                "Missing or invalid nucleotide sequence parameter",
            );
        };
        let params = AlignmentParams {
            sequence,
            hitlist_size: params.hitlist_size,
        };

        if params.is_duplicate(&state.metadata.alignment_history) {
            warn!(len = params.sequence.len(), "duplicate alignment submission");
            return tool_error(
                Annotation::AlignmentError,
                "Duplicate sequence detected: this sequence was already submitted for alignment, \
                 please try a different approach",
            );
        }

        let url = format!(
            "{}?CMD=Put&PROGRAM=blastn&MEGABLAST=on&DATABASE=nt&FORMAT_TYPE=XML&QUERY={}&HITLIST_SIZE={}",
            self.blast_url,
            encode_query_value(&params.sequence),
            params.hitlist_size
        );
        debug!(url = %url, "submitting BLAST job");

        let Some(response) = self.api.get(&url).await else {
            return tool_error(
                Annotation::AlignmentError,
                format!("BLAST submission failed: {url}"),
            );
        };

        let Some(rid) = extract_rid(&response) else {
            warn!("no RID in BLAST submission response");
            return tool_error(
                Annotation::AlignmentError,
                "Could not extract RID from BLAST response",
            );
        };
        info!(rid, "BLAST job submitted");

        StatePatch {
            messages: vec![Message::tool(
                Annotation::AlignmentProgress,
                format!("Initiated BLAST query with: [{url}]\nReceived RID: {rid}"),
            )],
            next: Some(Next::Phase(Phase::Poll)),
            metadata: MetadataPatch {
                job_token: Some(rid.to_string()),
                poll_attempt: Some(0),
                alignment_params: Some(params),
                diagnostic: Some(format!("BLAST job submitted, RID {rid}")),
                ..MetadataPatch::default()
            },
            ..StatePatch::default()
        }
    }

    async fn poll(&self, state: &State) -> StatePatch {
        let Some(rid) = state.metadata.job_token.as_deref() else {
            return tool_fatal(Annotation::AlignmentError, "No RID found for BLAST query");
        };

        let attempt = state.metadata.poll_attempt;
        let wait = poll_wait(attempt);
        info!(rid, attempt = attempt + 1, wait_secs = wait.as_secs(), "polling BLAST job");
        tokio::time::sleep(wait).await;

        let url = format!("{}?CMD=Get&FORMAT_TYPE=Text&RID={rid}", self.blast_url);
        let response = self.api.get(&url).await;

        let mut patch = match response.as_deref().map(JobStatus::classify) {
            None if attempt < MAX_POLL_RETRIES => retry(format!(
                "Waiting for BLAST results (attempt {}/{MAX_POLL_RETRIES})...",
                attempt + 1
            )),
            None => tool_fatal(
                Annotation::AlignmentError,
                "Failed to retrieve BLAST results after multiple attempts",
            ),
            Some(JobStatus::Running) if attempt < MAX_POLL_RETRIES => retry(format!(
                "BLAST analysis still running (attempt {}/{MAX_POLL_RETRIES})...",
                attempt + 1
            )),
            Some(JobStatus::Running) => tool_fatal(
                Annotation::AlignmentError,
                "BLAST analysis is taking too long, please try again later",
            ),
            Some(JobStatus::Failed) => tool_error(
                Annotation::AlignmentError,
                format!("BLAST job {rid} failed on the server"),
            ),
            Some(JobStatus::Unknown) => tool_error(
                Annotation::AlignmentError,
                format!("BLAST job {rid} is unknown or has expired"),
            ),
            Some(JobStatus::Done) => {
                let body = response.as_deref().unwrap_or_default();
                let text = truncate_payload(body, MAX_PAYLOAD_CHARS);
                info!(rid, chars = body.len(), "BLAST results received");
                StatePatch::default()
                    .message(Message::tool(
                        Annotation::AlignmentResponse,
                        format!("BLAST Results:\n\n{text}"),
                    ))
                    .diagnostic(format!("BLAST results received for RID {rid}"))
            }
        };
        patch.metadata.poll_attempt = Some(attempt + 1);
        patch
    }
}

fn retry(note: String) -> StatePatch {
    StatePatch::default()
        .diagnostic(note.clone())
        .message(Message::tool(Annotation::AlignmentProgress, note))
        .next(Next::Phase(Phase::Poll))
}

#[async_trait]
impl ToolAgent for AlignmentAgent {
    fn kind(&self) -> ToolKind {
        ToolKind::Alignment
    }

    fn entry(&self) -> Phase {
        Phase::Submit
    }

    async fn step(&self, phase: Phase, state: &State) -> StatePatch {
        match phase {
            Phase::Submit => self.submit(state).await,
            Phase::Poll => self.poll(state).await,
            other => unknown_phase(self.kind(), other),
        }
    }
}
