//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::agent::tools::alignment::MAX_POLL_RETRIES;
use crate::core::state::MAX_EVAL_ROUNDS;
use crate::error::AgentError;

/// Default model for the router, evaluator and generator.
const DEFAULT_REASONING_MODEL: &str = "qwen2.5:32b";
/// Default model for tool-agent parameter extraction.
const DEFAULT_TOOL_MODEL: &str = "qwen2.5:14b";
/// Default router max tokens.
const DEFAULT_ROUTER_MAX_TOKENS: u32 = 512;
/// Default evaluator max tokens.
const DEFAULT_EVALUATOR_MAX_TOKENS: u32 = 512;
/// Default generator max tokens.
const DEFAULT_GENERATOR_MAX_TOKENS: u32 = 4096;
/// Default tool-agent max tokens. Sequences can be long.
const DEFAULT_TOOL_MAX_TOKENS: u32 = 2048;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default attempts on a transient external API failure.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default pause between transient-failure retries.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
/// Default pause before each external API call.
const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);
/// Longest evaluation round: router, tool entry, every BLAST poll, evaluator.
const MAX_ROUND_STEPS: usize = 1 + 1 + (MAX_POLL_RETRIES as usize + 1) + 1;
/// Default graph step guard: every round at its caps, then the generator.
const DEFAULT_MAX_STEPS: usize = MAX_EVAL_ROUNDS as usize * MAX_ROUND_STEPS + 1;
/// Default NCBI E-utilities base URL.
pub const DEFAULT_EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
/// Default NCBI BLAST URL API endpoint.
pub const DEFAULT_BLAST_URL: &str = "https://blast.ncbi.nlm.nih.gov/blast/Blast.cgi";
/// Default instant-answer search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://api.duckduckgo.com/";

/// Configuration for the agent system.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies, Ollama or compatible APIs).
    pub base_url: Option<String>,
    /// Model for the router.
    pub router_model: String,
    /// Model for the evaluator.
    pub evaluator_model: String,
    /// Model for the generator.
    pub generator_model: String,
    /// Model for tool-agent parameter extraction.
    pub tool_model: String,
    /// Maximum tokens for router responses.
    pub router_max_tokens: u32,
    /// Maximum tokens for evaluator responses.
    pub evaluator_max_tokens: u32,
    /// Maximum tokens for generator responses.
    pub generator_max_tokens: u32,
    /// Maximum tokens for tool-agent responses.
    pub tool_max_tokens: u32,
    /// Request timeout for external APIs.
    pub timeout: Duration,
    /// Attempts on an HTTP 500 from an external API.
    pub max_retries: u32,
    /// Pause between HTTP 500 retries.
    pub retry_delay: Duration,
    /// Pause before every external API call.
    pub request_delay: Duration,
    /// Maximum node executions per question.
    pub max_steps: usize,
    /// E-utilities base URL (no trailing slash).
    pub eutils_base: String,
    /// BLAST URL API endpoint.
    pub blast_url: String,
    /// Instant-answer search endpoint.
    pub search_url: String,
    /// Directory containing prompt template files.
    ///
    /// When set, system prompts are loaded from markdown files in this
    /// directory, falling back to compiled-in defaults for any missing files.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    router_model: Option<String>,
    evaluator_model: Option<String>,
    generator_model: Option<String>,
    tool_model: Option<String>,
    router_max_tokens: Option<u32>,
    evaluator_max_tokens: Option<u32>,
    generator_max_tokens: Option<u32>,
    tool_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_delay: Option<Duration>,
    request_delay: Option<Duration>,
    max_steps: Option<usize>,
    eutils_base: Option<String>,
    blast_url: Option<String>,
    search_url: Option<String>,
    prompt_dir: Option<PathBuf>,
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("OPENBIO_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("OPENBIO_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("OPENBIO_BASE_URL"))
                .ok();
        }
        if self.router_model.is_none() {
            self.router_model = std::env::var("OPENBIO_ROUTER_MODEL").ok();
        }
        if self.evaluator_model.is_none() {
            self.evaluator_model = std::env::var("OPENBIO_EVALUATOR_MODEL").ok();
        }
        if self.generator_model.is_none() {
            self.generator_model = std::env::var("OPENBIO_GENERATOR_MODEL").ok();
        }
        if self.tool_model.is_none() {
            self.tool_model = std::env::var("OPENBIO_TOOL_MODEL").ok();
        }
        if self.eutils_base.is_none() {
            self.eutils_base = std::env::var("OPENBIO_EUTILS_BASE").ok();
        }
        if self.blast_url.is_none() {
            self.blast_url = std::env::var("OPENBIO_BLAST_URL").ok();
        }
        if self.search_url.is_none() {
            self.search_url = std::env::var("OPENBIO_SEARCH_URL").ok();
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("OPENBIO_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the router model.
    #[must_use]
    pub fn router_model(mut self, model: impl Into<String>) -> Self {
        self.router_model = Some(model.into());
        self
    }

    /// Sets the evaluator model.
    #[must_use]
    pub fn evaluator_model(mut self, model: impl Into<String>) -> Self {
        self.evaluator_model = Some(model.into());
        self
    }

    /// Sets the generator model.
    #[must_use]
    pub fn generator_model(mut self, model: impl Into<String>) -> Self {
        self.generator_model = Some(model.into());
        self
    }

    /// Sets the tool-agent model.
    #[must_use]
    pub fn tool_model(mut self, model: impl Into<String>) -> Self {
        self.tool_model = Some(model.into());
        self
    }

    /// Sets the router max tokens.
    #[must_use]
    pub const fn router_max_tokens(mut self, n: u32) -> Self {
        self.router_max_tokens = Some(n);
        self
    }

    /// Sets the evaluator max tokens.
    #[must_use]
    pub const fn evaluator_max_tokens(mut self, n: u32) -> Self {
        self.evaluator_max_tokens = Some(n);
        self
    }

    /// Sets the generator max tokens.
    #[must_use]
    pub const fn generator_max_tokens(mut self, n: u32) -> Self {
        self.generator_max_tokens = Some(n);
        self
    }

    /// Sets the tool-agent max tokens.
    #[must_use]
    pub const fn tool_max_tokens(mut self, n: u32) -> Self {
        self.tool_max_tokens = Some(n);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the max retries.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the pause between transient-failure retries.
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets the pause before every external API call.
    #[must_use]
    pub const fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = Some(delay);
        self
    }

    /// Sets the graph step guard.
    #[must_use]
    pub const fn max_steps(mut self, n: usize) -> Self {
        self.max_steps = Some(n);
        self
    }

    /// Sets the E-utilities base URL.
    #[must_use]
    pub fn eutils_base(mut self, url: impl Into<String>) -> Self {
        self.eutils_base = Some(url.into());
        self
    }

    /// Sets the BLAST endpoint.
    #[must_use]
    pub fn blast_url(mut self, url: impl Into<String>) -> Self {
        self.blast_url = Some(url.into());
        self
    }

    /// Sets the instant-answer search endpoint.
    #[must_use]
    pub fn search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = Some(url.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            router_model: self
                .router_model
                .unwrap_or_else(|| DEFAULT_REASONING_MODEL.to_string()),
            evaluator_model: self
                .evaluator_model
                .unwrap_or_else(|| DEFAULT_REASONING_MODEL.to_string()),
            generator_model: self
                .generator_model
                .unwrap_or_else(|| DEFAULT_REASONING_MODEL.to_string()),
            tool_model: self
                .tool_model
                .unwrap_or_else(|| DEFAULT_TOOL_MODEL.to_string()),
            router_max_tokens: self.router_max_tokens.unwrap_or(DEFAULT_ROUTER_MAX_TOKENS),
            evaluator_max_tokens: self
                .evaluator_max_tokens
                .unwrap_or(DEFAULT_EVALUATOR_MAX_TOKENS),
            generator_max_tokens: self
                .generator_max_tokens
                .unwrap_or(DEFAULT_GENERATOR_MAX_TOKENS),
            tool_max_tokens: self.tool_max_tokens.unwrap_or(DEFAULT_TOOL_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
            request_delay: self.request_delay.unwrap_or(DEFAULT_REQUEST_DELAY),
            max_steps: self.max_steps.unwrap_or(DEFAULT_MAX_STEPS),
            eutils_base: self
                .eutils_base
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_EUTILS_BASE.to_string()),
            blast_url: self
                .blast_url
                .unwrap_or_else(|| DEFAULT_BLAST_URL.to_string()),
            search_url: self
                .search_url
                .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            prompt_dir: self.prompt_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.router_model, "qwen2.5:32b");
        assert_eq!(config.tool_model, "qwen2.5:14b");
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.max_steps, 36);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.request_delay, Duration::from_secs(1));
        assert_eq!(config.eutils_base, DEFAULT_EUTILS_BASE);
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .provider("custom")
            .generator_model("llama3.1:70b")
            .max_steps(10)
            .eutils_base("http://localhost:9000/eutils/")
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "custom");
        assert_eq!(config.generator_model, "llama3.1:70b");
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.eutils_base, "http://localhost:9000/eutils");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
