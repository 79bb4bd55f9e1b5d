//! CLI command implementations.
//!
//! Each command returns its output as a string; `main` writes it to stdout.

use std::path::Path;

use tracing::info;

use crate::agent::config::AgentConfig;
use crate::agent::orchestrator::{NodeEvent, Orchestrator};
use crate::agent::prompt::PromptSet;
use crate::batch::run_batch;
use crate::cli::output::{OutputFormat, format_event, format_query_result};
#[cfg(feature = "mcp")]
use crate::cli::parser::McpCommands;
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Ask { question } => cmd_ask(cli, question, format),
        Commands::Batch { input, output } => cmd_batch(cli, input, output, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
        #[cfg(feature = "mcp")]
        Commands::Mcp(cmd) => cmd_mcp(cli, cmd),
    }
}

/// Builds the agent configuration from the environment plus CLI overrides.
fn build_config(cli: &Cli) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder();
    if let Some(ref model) = cli.model {
        builder = builder
            .router_model(model)
            .evaluator_model(model)
            .generator_model(model)
            .tool_model(model);
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(ref dir) = cli.prompt_dir {
        builder = builder.prompt_dir(dir);
    }

    builder.from_env().build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}")).into()
    })
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn build_orchestrator(config: &AgentConfig, verbose: bool) -> Result<Orchestrator> {
    let orchestrator = Orchestrator::from_config(config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Orchestrator setup failed: {e}"))
    })?;
    Ok(if verbose {
        orchestrator.with_observer(Box::new(|event: &NodeEvent| {
            info!(target: "openbio_rs::trace", "{}", format_event(event));
        }))
    } else {
        orchestrator
    })
}

fn cmd_ask(cli: &Cli, question: &str, format: OutputFormat) -> Result<String> {
    let config = build_config(cli)?;
    let orchestrator = build_orchestrator(&config, cli.verbose)?;

    let rt = runtime()?;
    let result = rt
        .block_on(orchestrator.ask(question))
        .map_err(|e| CommandError::ExecutionFailed(format!("Query failed: {e}")))?;

    match format {
        OutputFormat::Text => Ok(format_query_result(&result, cli.verbose)),
        OutputFormat::Json => serde_json::to_string_pretty(&result).map_err(|e| {
            CommandError::OutputFormat(format!("JSON serialization failed: {e}")).into()
        }),
    }
}

fn cmd_batch(cli: &Cli, input: &Path, output: &Path, format: OutputFormat) -> Result<String> {
    if !input.exists() {
        return Err(CommandError::InvalidArgument(format!(
            "input file not found: {}",
            input.display()
        ))
        .into());
    }

    let config = build_config(cli)?;
    let orchestrator = build_orchestrator(&config, cli.verbose)?;

    let rt = runtime()?;
    let summary = rt.block_on(run_batch(&orchestrator, input, output))?;

    match format {
        OutputFormat::Text => Ok(format!(
            "Batch complete: {} question(s), {} answered ({} failed), {} skipped\nResults: {}\n",
            summary.total,
            summary.answered,
            summary.failed,
            summary.skipped,
            output.display()
        )),
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({
            "summary": summary,
            "output": output.to_string_lossy(),
        }))),
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                output.push_str("  ");
                output.push_str(
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown"),
                );
                output.push('\n');
            }
            output.push_str("\nEdit these files to customize agent system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({
            "directory": target_dir.to_string_lossy(),
            "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
            "count": written.len(),
        }))),
    }
}

#[cfg(feature = "mcp")]
fn cmd_mcp(cli: &Cli, cmd: &McpCommands) -> Result<String> {
    use crate::mcp::{OpenBioMcpServer, serve_http, serve_stdio};

    let config = build_config(cli)?;
    let server = OpenBioMcpServer::new(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create MCP server: {e}"))
    })?;

    let rt = runtime()?;
    rt.block_on(async {
        match cmd {
            McpCommands::Stdio => serve_stdio(server).await,
            McpCommands::Serve { host, port } => serve_http(server, host, *port).await,
        }
    })
    .map_err(|e| CommandError::ExecutionFailed(format!("MCP server error: {e}")))?;

    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_init_prompts_writes_once() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let target = dir.path().join("prompts");

        let first = cmd_init_prompts(Some(&target), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(first.contains("Wrote 6 prompt template(s)"));
        assert!(target.join("router.md").exists());

        let second = cmd_init_prompts(Some(&target), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(second.contains("already exist"));
    }

    #[test]
    fn test_init_prompts_json() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let output = cmd_init_prompts(Some(dir.path()), OutputFormat::Json)
            .unwrap_or_else(|_| unreachable!());
        let json: serde_json::Value =
            serde_json::from_str(&output).unwrap_or_else(|_| unreachable!());
        assert_eq!(json["count"], 6);
    }

    #[test]
    fn test_batch_missing_input() {
        let cli = Cli::try_parse_from([
            "openbio-rs",
            "batch",
            "/nonexistent/questions.json",
            "--output",
            "/tmp/out.json",
        ])
        .unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            execute(&cli),
            Err(crate::error::Error::Command(CommandError::InvalidArgument(_)))
        ));
    }
}
