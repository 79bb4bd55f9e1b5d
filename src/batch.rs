//! Resumable batch runs.
//!
//! Input is a nested JSON object mapping task names to `{question: expected}`
//! objects. Output is a JSON array of [`BatchRecord`]s, rewritten after every
//! question so an interrupted run picks up where it stopped.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::agent::Orchestrator;
use crate::error::{CommandError, Result};

/// One question to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Task group name.
    pub task: String,
    /// The question.
    pub question: String,
    /// Reference answer.
    pub expected: String,
}

/// One persisted result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Task group name.
    pub task: String,
    /// The question.
    pub question: String,
    /// Reference answer.
    pub expected: String,
    /// Produced answer, `Error: …` for failed runs.
    pub answer: String,
    /// Per-node trace of the run.
    #[serde(default)]
    pub trace: Value,
}

/// Counts for a finished batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Items in the input.
    pub total: usize,
    /// Items already present in the output.
    pub skipped: usize,
    /// Items answered in this run.
    pub answered: usize,
    /// Items that ended in error in this run.
    pub failed: usize,
}

/// Parses the nested `{task: {question: expected}}` input.
///
/// Non-string expected values are kept as their JSON text.
///
/// # Errors
///
/// Returns an error if the text is not JSON or does not have the nested
/// object shape.
pub fn parse_items(text: &str) -> Result<Vec<BatchItem>> {
    let root: Value = serde_json::from_str(text)?;
    let Value::Object(tasks) = root else {
        return Err(CommandError::InvalidArgument(
            "batch input must be a JSON object of tasks".to_string(),
        )
        .into());
    };

    let mut items = Vec::new();
    for (task, questions) in tasks {
        let Value::Object(questions) = questions else {
            return Err(CommandError::InvalidArgument(format!(
                "task '{task}' must map questions to expected answers"
            ))
            .into());
        };
        for (question, expected) in questions {
            let expected = match expected {
                Value::String(s) => s,
                other => other.to_string(),
            };
            items.push(BatchItem {
                task: task.clone(),
                question,
                expected,
            });
        }
    }
    Ok(items)
}

/// Reads previously saved records, or none if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_records(path: &Path) -> Result<Vec<BatchRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&text)?)
}

/// Writes `records` to `path` through a sibling temporary file.
///
/// # Errors
///
/// Returns an error on serialization or filesystem failure.
pub fn save_records(path: &Path, records: &[BatchRecord]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(records)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Answers every item not already in `output`, saving after each one.
///
/// # Errors
///
/// Returns an error if the input cannot be read or parsed, or if the output
/// cannot be written. Per-question failures are recorded, not returned.
pub async fn run_batch(
    orchestrator: &Orchestrator,
    input: &Path,
    output: &Path,
) -> Result<BatchSummary> {
    let items = parse_items(&std::fs::read_to_string(input)?)?;
    let mut records = load_records(output)?;
    let done: HashSet<(String, String)> = records
        .iter()
        .map(|r| (r.task.clone(), r.question.clone()))
        .collect();

    let mut summary = BatchSummary {
        total: items.len(),
        ..BatchSummary::default()
    };

    for (index, item) in items.into_iter().enumerate() {
        if done.contains(&(item.task.clone(), item.question.clone())) {
            summary.skipped += 1;
            continue;
        }
        info!(index, task = %item.task, question = %item.question, "batch item");

        let (answer, trace) = match orchestrator.ask(&item.question).await {
            Ok(result) => {
                if result.answer.is_none() {
                    summary.failed += 1;
                }
                (result.answer_or_error(), serde_json::to_value(&result.trace)?)
            }
            Err(e) => {
                warn!(task = %item.task, error = %e, "batch item failed");
                summary.failed += 1;
                (format!("Error: {e}"), Value::Array(Vec::new()))
            }
        };
        summary.answered += 1;

        records.push(BatchRecord {
            task: item.task,
            question: item.question,
            expected: item.expected,
            answer,
            trace,
        });
        save_records(output, &records)?;
    }

    info!(
        total = summary.total,
        skipped = summary.skipped,
        answered = summary.answered,
        failed = summary.failed,
        "batch finished"
    );
    Ok(summary)
}
