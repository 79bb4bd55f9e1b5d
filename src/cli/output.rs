//! Output formatting for CLI commands.

use std::fmt::Write as _;

use serde::Serialize;

use crate::agent::{NodeEvent, QueryResult};
use crate::core::Status;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything unknown is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON.
    #[must_use]
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// One trace line: `[node] -> next: diagnostic`.
#[must_use]
pub fn format_event(event: &NodeEvent) -> String {
    let mut line = format!("[{}]", event.node);
    if let Some(next) = event.next {
        let _ = write!(line, " -> {next}");
    }
    if event.status == Status::Error {
        line.push_str(" (error)");
    }
    if let Some(ref note) = event.diagnostic {
        let _ = write!(line, ": {note}");
    }
    line
}

/// Renders a run result as text.
#[must_use]
pub fn format_query_result(result: &QueryResult, verbose: bool) -> String {
    let mut output = result.answer_or_error();
    if result.low_confidence {
        output.push_str("\n\n(low confidence: evaluation limit reached)");
    }
    let _ = write!(
        output,
        "\n\n---\nSteps: {} | Evaluations: {} | Time: {:.1}s",
        result.steps,
        result.eval_rounds,
        result.elapsed.as_secs_f64()
    );
    if verbose {
        output.push_str("\n\nTrace:");
        for event in &result.trace {
            let _ = write!(output, "\n  {}", format_event(event));
        }
    }
    output.push('\n');
    output
}
