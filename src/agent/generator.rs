//! Generator node: writes the final answer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use super::config::AgentConfig;
use super::prompt::{OUT_OF_DOMAIN_REPLY, PromptSet, build_generator_prompt};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::message::{Message, Role, format_transcript};
use crate::core::state::{State, StatePatch};

/// Produces the terminal `final_answer` message.
pub struct Generator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    max_tokens: u32,
}

impl Generator {
    /// Creates a generator backed by `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, config: &AgentConfig, prompts: &PromptSet) -> Self {
        Self {
            provider,
            model: config.generator_model.clone(),
            system_prompt: prompts.generator.clone(),
            max_tokens: config.generator_max_tokens,
        }
    }

    /// Runs the generator node. Always a graph exit.
    ///
    /// An out-of-domain question gets [`OUT_OF_DOMAIN_REPLY`] without a
    /// model call; gathered evidence is ignored.
    pub async fn generate(&self, state: &State) -> StatePatch {
        let Some(question) = state.question() else {
            return StatePatch::fatal("No user question found");
        };

        if state.metadata.is_out_of_domain() {
            info!("question is out of domain, returning canned reply");
            return StatePatch::default()
                .message(Message::final_answer(OUT_OF_DOMAIN_REPLY))
                .diagnostic("Question is outside the bioinformatics domain");
        }

        let history = format_transcript(
            state
                .history
                .iter()
                .filter(|m| matches!(m.role, Role::Tool | Role::Assistant)),
        );
        let low_confidence = state.metadata.forced_generation;
        let prompt = build_generator_prompt(question, &history, low_confidence);

        match self.execute(self.provider.as_ref(), &prompt).await {
            Ok(reply) => {
                info!(
                    eval_count = state.metadata.eval_count,
                    low_confidence,
                    chars = reply.content.len(),
                    "final answer generated"
                );
                StatePatch::default()
                    .message(Message::final_answer(reply.content))
                    .diagnostic(if low_confidence {
                        "Final answer generated (low confidence)"
                    } else {
                        "Final answer generated"
                    })
            }
            Err(e) => {
                error!(error = %e, "answer generation failed");
                StatePatch::fatal(format!("Answer generation failed: {e}"))
            }
        }
    }
}

#[async_trait]
impl Agent for Generator {
    fn name(&self) -> &'static str {
        "generator"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedProvider;
    use crate::core::message::Annotation;
    use crate::core::state::{RoutingReason, Status};

    fn generator(provider: &Arc<ScriptedProvider>) -> Generator {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        Generator::new(provider.clone(), &config, &PromptSet::defaults())
    }

    fn state_with_evidence() -> State {
        State::new("Which chromosome is TTTY7 on?").merged(
            &StatePatch::default()
                .message(Message::tool(Annotation::DatabaseProgress, "idlist 246119"))
                .message(Message::tool(Annotation::DatabaseResponse, "chromosome: Y")),
        )
    }

    #[tokio::test]
    async fn test_answer_from_evidence() {
        let provider = Arc::new(ScriptedProvider::new(["TTTY7 is on chromosome Y."]));
        let patch = generator(&provider).generate(&state_with_evidence()).await;

        assert_eq!(patch.messages.len(), 1);
        assert_eq!(patch.messages[0].annotation, Annotation::FinalAnswer);
        assert_eq!(patch.messages[0].role, Role::Assistant);
        assert_eq!(patch.messages[0].content, "TTTY7 is on chromosome Y.");
        assert!(patch.next.is_none());

        let prompt = &provider.requests()[0].messages[1].content;
        assert!(prompt.contains("chromosome: Y"));
        assert!(prompt.find("idlist 246119") < prompt.find("chromosome: Y"));
        assert!(!prompt.contains("low-confidence"));
    }

    #[tokio::test]
    async fn test_out_of_domain_ignores_history() {
        let provider = Arc::new(ScriptedProvider::new(["should not be used"]));
        let mut state = state_with_evidence();
        state.metadata.routing_reason = Some(RoutingReason::OutOfDomain);

        let patch = generator(&provider).generate(&state).await;
        assert_eq!(patch.messages[0].content, OUT_OF_DOMAIN_REPLY);
        assert_eq!(patch.messages[0].annotation, Annotation::FinalAnswer);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_forced_generation_is_low_confidence() {
        let provider = Arc::new(ScriptedProvider::new(["Possibly chromosome Y."]));
        let mut state = state_with_evidence();
        state.metadata.forced_generation = true;

        let patch = generator(&provider).generate(&state).await;
        assert_eq!(patch.messages[0].annotation, Annotation::FinalAnswer);
        assert!(provider.requests()[0].messages[1].content.contains("low-confidence"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_fatal() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<&str>::new()));
        let patch = generator(&provider).generate(&state_with_evidence()).await;
        assert_eq!(patch.status, Some(Status::Error));
        assert!(patch.messages.is_empty());
    }

    #[tokio::test]
    async fn test_missing_question_is_fatal() {
        let provider = Arc::new(ScriptedProvider::new(["x"]));
        let patch = generator(&provider).generate(&State::default()).await;
        assert_eq!(patch.status, Some(Status::Error));
        assert_eq!(patch.error.as_deref(), Some("No user question found"));
    }
}
