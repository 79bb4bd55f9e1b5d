//! Evaluator node: decides whether the evidence answers the question.
//!
//! Bounded to [`MAX_EVAL_ROUNDS`] invocations per question. The call that
//! reaches the cap forces generation without consulting the model.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::config::AgentConfig;
use super::decode::decode;
use super::prompt::{PromptSet, build_evaluator_prompt};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::message::format_transcript;
use crate::core::state::{MAX_EVAL_ROUNDS, MetadataPatch, Next, State, StatePatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum Verdict {
    #[serde(alias = "generate")]
    Generate,
    #[serde(alias = "continue")]
    Continue,
}

#[derive(Debug, Deserialize)]
struct Evaluation {
    next_step: Verdict,
    #[serde(default)]
    reason: String,
}

/// Judges evidence sufficiency and picks between looping and answering.
pub struct Evaluator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    max_tokens: u32,
}

impl Evaluator {
    /// Creates an evaluator backed by `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, config: &AgentConfig, prompts: &PromptSet) -> Self {
        Self {
            provider,
            model: config.evaluator_model.clone(),
            system_prompt: prompts.evaluator.clone(),
            max_tokens: config.evaluator_max_tokens,
        }
    }

    /// Runs the evaluator node.
    ///
    /// Never fails hard on a bad model reply: decoding or transport
    /// failures continue the loop through the router.
    pub async fn evaluate(&self, state: &State) -> StatePatch {
        let eval_count = state.metadata.eval_count + 1;

        if eval_count >= MAX_EVAL_ROUNDS {
            info!(eval_count, max = MAX_EVAL_ROUNDS, "evaluation cap reached, forcing generation");
            return StatePatch {
                next: Some(Next::Generate),
                metadata: MetadataPatch {
                    eval_count: Some(eval_count),
                    forced_generation: Some(true),
                    diagnostic: Some(format!(
                        "Evaluation cap reached ({eval_count}/{MAX_EVAL_ROUNDS}); generating with the evidence so far"
                    )),
                    ..MetadataPatch::default()
                },
                ..StatePatch::default()
            };
        }

        let Some(question) = state.question() else {
            let mut patch = StatePatch::fatal("No user question found");
            patch.metadata.eval_count = Some(eval_count);
            return patch;
        };

        let history = format_transcript(state.tool_evidence());
        let routing_reason = state.metadata.routing_reason.as_ref().map(ToString::to_string);
        let prompt = build_evaluator_prompt(question, &history, routing_reason.as_deref());

        let (next, reason) = match self.execute(self.provider.as_ref(), &prompt).await {
            Ok(reply) => match decode::<Evaluation>(&reply.content) {
                Ok(eval) => {
                    let next = match eval.next_step {
                        Verdict::Generate => Next::Generate,
                        Verdict::Continue => Next::Router,
                    };
                    (next, eval.reason)
                }
                Err(e) => {
                    warn!(eval_count, kind = ?e.kind, reply = %reply.content, "invalid evaluator reply");
                    (
                        Next::Router,
                        format!("Evaluator reply could not be decoded ({e}); continuing"),
                    )
                }
            },
            Err(e) => {
                warn!(eval_count, error = %e, "evaluator call failed");
                (Next::Router, format!("Evaluator call failed ({e}); continuing"))
            }
        };

        info!(eval_count, next = %next, reason = %reason, "evaluation");
        StatePatch {
            next: Some(next),
            metadata: MetadataPatch {
                eval_count: Some(eval_count),
                diagnostic: Some(format!(
                    "Evaluation {eval_count}/{MAX_EVAL_ROUNDS}: {next}. {reason}"
                )),
                eval_reason: Some(reason),
                ..MetadataPatch::default()
            },
            ..StatePatch::default()
        }
    }
}

#[async_trait]
impl Agent for Evaluator {
    fn name(&self) -> &'static str {
        "evaluator"
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
