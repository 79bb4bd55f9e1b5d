//! # openbio-rs
//!
//! LLM-routed question answering for bioinformatics.
//!
//! A router model sends each question to a specialist tool agent (BLAST
//! sequence alignment, NCBI E-utilities lookups, or web search). An
//! evaluator decides whether the gathered evidence answers the question,
//! looping back to the router at most five times, and a generator writes
//! the final answer.
//!
//! ## Modules
//!
//! - [`core`]: annotated messages, typed tool parameters, orchestrator state
//! - [`api`]: retrying REST client for the external services
//! - [`agent`]: LLM provider, router, evaluator, generator, tool agents and
//!   the orchestrator that wires them together
//! - [`batch`]: resumable batch runs over a question file
//! - [`cli`]: command-line interface
//! - `mcp` (feature `mcp`): MCP server exposing the `ask` tool
//!
//! ## Example
//!
//! ```no_run
//! use openbio_rs::agent::{AgentConfig, Orchestrator};
//!
//! # async fn run() -> Result<(), openbio_rs::Error> {
//! let config = AgentConfig::from_env()?;
//! let orchestrator = Orchestrator::from_config(&config)?;
//! let result = orchestrator
//!     .ask("Which chromosome is TTTY7 gene located on human genome?")
//!     .await?;
//! assert!(result.answer.is_some() || result.error.is_some());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod api;
pub mod batch;
pub mod cli;
pub mod core;
pub mod error;

#[cfg(feature = "mcp")]
pub mod mcp;

pub use error::{AgentError, CommandError, Error, Result};
