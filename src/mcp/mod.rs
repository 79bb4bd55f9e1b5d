//! MCP (Model Context Protocol) server for openbio-rs.
//!
//! Exposes the question-answering graph as a single `ask` tool so external
//! agents can delegate bioinformatics lookups.
//!
//! # Feature Gate
//!
//! This module requires the `mcp` feature flag:
//! ```toml
//! [dependencies]
//! openbio-rs = { version = "...", features = ["mcp"] }
//! ```
//!
//! # Architecture
//!
//! ```text
//! MCP Client
//!   ↓ ask(question)
//! OpenBioMcpServer
//!   ↓
//! Orchestrator::ask()
//!   ├── Router → tool agent → Evaluator (loop)
//!   └── Generator → answer
//!   ↓
//! QueryResult JSON → MCP Client
//! ```

pub mod params;
pub mod server;
pub mod transport;

pub use params::AskParams;
pub use server::OpenBioMcpServer;
pub use transport::{serve_http, serve_stdio};
