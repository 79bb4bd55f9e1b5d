//! MCP tool parameter types.
//!
//! Input schemas for MCP tools, with `schemars` generating the JSON Schema
//! the protocol requires.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `ask` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskParams {
    /// A natural-language biology question.
    pub question: String,

    /// Include the per-node trace and full message history in the result.
    #[serde(default)]
    pub include_trace: bool,
}
