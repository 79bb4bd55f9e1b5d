//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// openbio-rs: LLM-routed bioinformatics question answering.
///
/// Routes questions to BLAST, NCBI E-utilities or web search, evaluates
/// the gathered evidence and writes an answer.
#[derive(Parser, Debug)]
#[command(name = "openbio-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (per-node trace, debug logging).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Override every LLM model (router, evaluator, generator, tools).
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// OpenAI-compatible base URL, e.g. an Ollama `/v1` endpoint.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Directory containing prompt template files.
    #[arg(long, global = true, env = "OPENBIO_PROMPT_DIR")]
    pub prompt_dir: Option<PathBuf>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer one question.
    ///
    /// Requires an OpenAI-compatible API key (or a local endpoint via
    /// `--base-url`).
    #[command(after_help = r#"Examples:
  openbio-rs ask "Which chromosome is TTTY7 gene located on human genome?"
  openbio-rs ask "What is the official gene symbol of SNAT6?" --verbose
  openbio-rs --format json ask "Which gene is rs1217074595 associated with?" | jq .answer
  openbio-rs --base-url http://localhost:11434/v1 ask "Align ATTCTGCCTTTAGTAATTTGATG"
"#)]
    Ask {
        /// The question.
        question: String,
    },

    /// Answer every question in a nested JSON file, resumably.
    ///
    /// Input maps task names to `{question: expected}` objects. Results are
    /// saved after every question; rerunning skips questions already in the
    /// output.
    #[command(after_help = r#"Examples:
  openbio-rs batch questions.json --output results.json

Input format:
{
  "gene_location": {"Which chromosome is TTTY7 gene located on human genome?": "chrY"},
  "snp_gene": {"Which gene is SNP rs1217074595 associated with?": "LINC01270"}
}"#)]
    Batch {
        /// Input JSON file.
        input: PathBuf,

        /// Output JSON file (created or resumed).
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write the default prompt templates for customization.
    ///
    /// Existing files are left untouched.
    #[command(after_help = r#"Examples:
  openbio-rs init-prompts                      # ~/.config/openbio-rs/prompts
  openbio-rs init-prompts --dir ./prompts
"#)]
    InitPrompts {
        /// Target directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Start MCP (Model Context Protocol) server.
    #[cfg(feature = "mcp")]
    #[command(subcommand)]
    Mcp(McpCommands),
}

/// MCP server transports.
#[cfg(feature = "mcp")]
#[derive(Subcommand, Debug)]
pub enum McpCommands {
    /// Start MCP server with stdio transport.
    ///
    /// Reads JSON-RPC messages from stdin, writes responses to stdout.
    #[command(after_help = r#"Examples:
  openbio-rs mcp stdio
  OPENAI_API_KEY=sk-... openbio-rs mcp stdio
"#)]
    Stdio,

    /// Start MCP server with streamable HTTP transport.
    #[command(after_help = r#"Examples:
  openbio-rs mcp serve                            # Listen on 127.0.0.1:3000
  openbio-rs mcp serve --host 0.0.0.0 --port 8080
"#)]
    Serve {
        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to.
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}
