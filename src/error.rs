//! Error types for openbio-rs.
//!
//! Library code returns [`AgentError`] for LLM, transport and graph faults,
//! and [`CommandError`] for CLI-level failures. Both fold into the crate-wide
//! [`Error`].

use thiserror::Error;

/// Errors raised by the agent system (LLM provider, decoding, orchestration).
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured for the LLM provider.
    #[error("no API key configured (set OPENAI_API_KEY or OPENBIO_API_KEY)")]
    ApiKeyMissing,

    /// The configured provider name is not known.
    #[error("unsupported LLM provider: {name}")]
    UnsupportedProvider {
        /// Requested provider name.
        name: String,
    },

    /// A request to the LLM provider failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error description from the transport or provider.
        message: String,
        /// HTTP status code, when known.
        status: Option<u16>,
    },

    /// The model reply could not be decoded into the expected schema.
    #[error("failed to parse model response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// The raw model reply.
        content: String,
    },

    /// A generic orchestration failure.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Error description.
        message: String,
    },

    /// A node requested an edge the control graph does not have.
    #[error("invalid transition from {from}: {next}")]
    InvalidTransition {
        /// Node that produced the transition.
        from: String,
        /// The requested next step.
        next: String,
    },

    /// The graph ran more node steps than the configured guard allows.
    #[error("control graph exceeded {max_steps} steps without reaching an exit")]
    StepLimitExceeded {
        /// Configured step limit.
        max_steps: usize,
    },
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered in the requested format.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),

    /// A CLI argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Agent system error.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// CLI command error.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias using the crate-wide [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
