//! CLI layer for openbio-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! answering questions, running batches, managing prompts, and serving MCP.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
#[cfg(feature = "mcp")]
pub use parser::McpCommands;
pub use parser::{Cli, Commands};
