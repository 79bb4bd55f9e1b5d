//! LLM-driven question answering.
//!
//! Every node of the control graph is an [`Agent`] bound to an injected
//! [`LlmProvider`]. Tool agents additionally hold an
//! [`ApiClient`](crate::api::ApiClient) for the external REST services.
//!
//! # Architecture
//!
//! ```text
//! Question → Orchestrator
//!   ├── Router (picks a tool agent or rejects)
//!   ├── Tool agent
//!   │   ├── alignment: submit → poll (backoff) …
//!   │   ├── database:  search → fetch
//!   │   └── search:    lookup
//!   ├── Evaluator (≤ 5 rounds, then forced generation)
//!   └── Generator → final answer
//! ```

pub mod client;
pub mod config;
pub mod decode;
pub mod evaluator;
pub mod generator;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod router;
pub mod tools;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use client::create_provider;
pub use config::AgentConfig;
pub use decode::{DecodeError, DecodeErrorKind, decode};
pub use evaluator::Evaluator;
pub use generator::Generator;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::{Node, NodeEvent, Observer, Orchestrator, QueryResult};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use router::Router;
pub use tools::{AlignmentAgent, DatabaseAgent, SearchAgent, ToolAgent};
pub use traits::{Agent, AgentResponse};
