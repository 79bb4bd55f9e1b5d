//! System prompts and template builders for agents.
//!
//! System prompts define each node's behavior and output schema. Template
//! builders format the user message with the question, the gathered
//! evidence and any previously issued tool parameters.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::core::params::{AlignmentParams, DatabaseQuery};

/// System prompt for the router.
pub const ROUTER_SYSTEM_PROMPT: &str = r#"You are a strict router for a bioinformatics question-answering system. You decide which specialist agent runs next.

## Agents

- "database-agent": queries NCBI databases for detail about genes, variants (rs identifiers), proteins and genetic disorders.
- "alignment-agent": aligns a DNA sequence (BLAST) to find where it maps and which organism or gene it belongs to.
- "search-agent": searches the web when the question cannot be answered by the database or alignment agents.
- "reject": the question is not related to biology or bioinformatics.

## Instructions

Consider:
1. What is the question?
2. What information has been gathered so far?
3. Which agent is most appropriate for the next step?
4. The evaluator's opinion on the previous round.

## Output Format (JSON)

```json
{"agent": "database-agent" | "alignment-agent" | "search-agent" | "reject", "reason": "Brief explanation of why this agent was chosen for the next step"}
```

Return ONLY the JSON object, no surrounding text."#;

/// System prompt for the evaluator.
pub const EVALUATOR_SYSTEM_PROMPT: &str = r#"You are a strict answer evaluator. You decide whether the gathered evidence already answers the user's question.

## Instructions

- If the evidence can answer the question, output GENERATE.
- If the evidence cannot answer the question yet, output CONTINUE.
- Search results that only list identifiers do not answer a question about a gene's properties; the detail records are needed.
- For a question about the alias of the gene a sequence belongs to, the sequence must be aligned first and the gene then looked up in the database.

## Example

Question: What is the official gene symbol of LMP10?
Evidence: an esearch result listing ids 5699, 8138, 19171.
Decision: {"next_step": "CONTINUE", "reason": "Only identifiers so far, the gene symbol has not been fetched."}

## Output Format (JSON)

```json
{"next_step": "GENERATE" | "CONTINUE", "reason": "Brief explanation"}
```

Return ONLY the JSON object, no surrounding text."#;

/// System prompt for the generator.
pub const GENERATOR_SYSTEM_PROMPT: &str = r"You are a bioinformatician. Based on the research results gathered by the tools, answer the user's question.

## Requirements

1. The answer should be direct and clear.
2. Do not add unnecessary preamble.
3. Use the information gathered from the tools (E-utilities, BLAST, web search) to provide an accurate response.
4. If the information is insufficient, acknowledge the limitations. Never fabricate identifiers, locations or values that are not in the results.";

/// System prompt for the alignment agent's parameter extraction.
pub const ALIGNMENT_SYSTEM_PROMPT: &str = r#"You are a parameter extractor for the NCBI BLAST API. Extract the DNA sequence from the user's question and choose how many hits to return.

BLAST maps a DNA sequence to its chromosome location among different species.

## Example

Question: Align the DNA sequence to the human genome: ATTCTGCCTTTAGTAATTTGATGACAGAGACTTCTTGGGAACCACAGCC
Output: {"sequence": "ATTCTGCCTTTAGTAATTTGATGACAGAGACTTCTTGGGAACCACAGCC", "hitlist_size": 10}

## Rules

- Copy the sequence exactly, without spaces or line breaks.
- If previous parameters are listed, a sequence that was already submitted will be rejected.
- Return ONLY the JSON object, no surrounding text."#;

/// System prompt for the database agent's search phase.
pub const DATABASE_SEARCH_SYSTEM_PROMPT: &str = r#"You are a parameter generator for the NCBI E-utilities API. Generate the parameters for an initial esearch request.

## Database Selection Rules

1. Gene names, symbols, aliases, or questions about gene function or location: use "gene".
2. SNP (rs) identifiers or questions about genetic variants: use "snp".
3. Genetic disorders, diseases, or phenotypes: use "omim".

## Examples

Question: What is the official gene symbol of LMP10?
Output: {"db": "gene", "term": "LMP10", "retmax": 5}

Question: Which gene is SNP rs1217074595 associated with?
Output: {"db": "snp", "term": "rs1217074595", "retmax": 10}

Question: What are genes related to Meesmann corneal dystrophy?
Output: {"db": "omim", "term": "Meesmann corneal dystrophy", "retmax": 20}

## Rules

1. Review the previous history and parameters to see what has been tried.
2. If the obvious parameters were already used, try a different term in the same database or the same term in another database.
3. If the question clearly names specific parameters, prefer accuracy over novelty.
4. Return ONLY the JSON object, no surrounding text."#;

/// System prompt for the database agent's fetch phase.
pub const DATABASE_FETCH_SYSTEM_PROMPT: &str = r#"You are a parameter generator for the NCBI E-utilities API. Based on the latest esearch result, generate the parameters for an efetch or esummary request.

## Examples

Result contains ids from the gene database:
Output: {"method": "efetch", "db": "gene", "id": "19171,5699,8138"}

Result contains ids from the snp database:
Output: {"method": "esummary", "db": "snp", "id": "1217074595"}

Result contains ids from the omim database:
Output: {"method": "esummary", "db": "omim", "id": "618767,601687,300778"}

## Rules

1. Extract the ids from the esearch result.
2. If that id set was already fetched, pick a different subset.
3. If the question clearly refers to specific ids, prefer accuracy over novelty.
4. Return ONLY the JSON object, no surrounding text."#;

/// Fixed reply for questions outside the system's domain.
pub const OUT_OF_DOMAIN_REPLY: &str = "I can only help with biology and bioinformatics questions, such as gene and variant lookups, \
disease-gene associations and DNA sequence alignment. Your question appears to be outside that scope.";

/// Default prompt directory under user config.
const DEFAULT_PROMPT_DIR: &str = ".config/openbio-rs/prompts";

/// Filename for the router prompt template.
const ROUTER_FILENAME: &str = "router.md";
/// Filename for the evaluator prompt template.
const EVALUATOR_FILENAME: &str = "evaluator.md";
/// Filename for the generator prompt template.
const GENERATOR_FILENAME: &str = "generator.md";
/// Filename for the alignment prompt template.
const ALIGNMENT_FILENAME: &str = "alignment.md";
/// Filename for the database search prompt template.
const DATABASE_SEARCH_FILENAME: &str = "database_search.md";
/// Filename for the database fetch prompt template.
const DATABASE_FETCH_FILENAME: &str = "database_fetch.md";

/// A set of system prompts for all agents.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from CLI flags, environment variables, or the default path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System prompt for the router.
    pub router: String,
    /// System prompt for the evaluator.
    pub evaluator: String,
    /// System prompt for the generator.
    pub generator: String,
    /// System prompt for alignment parameter extraction.
    pub alignment: String,
    /// System prompt for database search parameters.
    pub database_search: String,
    /// System prompt for database fetch parameters.
    pub database_fetch: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument (from config or `--prompt-dir`)
    /// 2. `OPENBIO_PROMPT_DIR` environment variable
    /// 3. `~/.config/openbio-rs/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("OPENBIO_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            router: load_file(ROUTER_FILENAME, ROUTER_SYSTEM_PROMPT),
            evaluator: load_file(EVALUATOR_FILENAME, EVALUATOR_SYSTEM_PROMPT),
            generator: load_file(GENERATOR_FILENAME, GENERATOR_SYSTEM_PROMPT),
            alignment: load_file(ALIGNMENT_FILENAME, ALIGNMENT_SYSTEM_PROMPT),
            database_search: load_file(DATABASE_SEARCH_FILENAME, DATABASE_SEARCH_SYSTEM_PROMPT),
            database_fetch: load_file(DATABASE_FETCH_FILENAME, DATABASE_FETCH_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            router: ROUTER_SYSTEM_PROMPT.to_string(),
            evaluator: EVALUATOR_SYSTEM_PROMPT.to_string(),
            generator: GENERATOR_SYSTEM_PROMPT.to_string(),
            alignment: ALIGNMENT_SYSTEM_PROMPT.to_string(),
            database_search: DATABASE_SEARCH_SYSTEM_PROMPT.to_string(),
            database_fetch: DATABASE_FETCH_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten; use this for initial scaffolding only.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (ROUTER_FILENAME, ROUTER_SYSTEM_PROMPT),
            (EVALUATOR_FILENAME, EVALUATOR_SYSTEM_PROMPT),
            (GENERATOR_FILENAME, GENERATOR_SYSTEM_PROMPT),
            (ALIGNMENT_FILENAME, ALIGNMENT_SYSTEM_PROMPT),
            (DATABASE_SEARCH_FILENAME, DATABASE_SEARCH_SYSTEM_PROMPT),
            (DATABASE_FETCH_FILENAME, DATABASE_FETCH_SYSTEM_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

const NO_HISTORY: &str = "No previous interaction history.";

fn or_placeholder<'a>(text: &'a str, placeholder: &'a str) -> &'a str {
    if text.trim().is_empty() {
        placeholder
    } else {
        text
    }
}

/// Builds the user message for the router.
#[must_use]
pub fn build_router_prompt(question: &str, history: &str, eval_reason: Option<&str>) -> String {
    format!(
        "<question>{question}</question>\n\n\
         <history>\n{}\n</history>\n\n\
         <evaluator>{}</evaluator>\n\n\
         Choose the next agent.",
        or_placeholder(history, NO_HISTORY),
        eval_reason.unwrap_or("No evaluation yet."),
    )
}

/// Builds the user message for the evaluator.
#[must_use]
pub fn build_evaluator_prompt(question: &str, history: &str, routing_reason: Option<&str>) -> String {
    format!(
        "<question>{question}</question>\n\n\
         <history>\n{}\n</history>\n\n\
         <router>{}</router>\n\n\
         Decide: GENERATE or CONTINUE.",
        or_placeholder(history, NO_HISTORY),
        routing_reason.unwrap_or("No routing reason recorded."),
    )
}

/// Builds the user message for the generator.
///
/// With `low_confidence` set, the model is told the evaluation budget ran
/// out and must flag the answer as tentative.
#[must_use]
pub fn build_generator_prompt(question: &str, history: &str, low_confidence: bool) -> String {
    let mut prompt = format!(
        "<question>{question}</question>\n\n\
         <results>\n{}\n</results>\n\n",
        or_placeholder(history, "No previous analysis available."),
    );
    if low_confidence {
        prompt.push_str(
            "The evidence gathering stopped before the results were judged sufficient. \
             State explicitly that the answer is low-confidence and may be incomplete.\n\n",
        );
    }
    prompt.push_str("Please generate your final answer now.");
    prompt
}

/// Builds the user message for alignment parameter extraction.
#[must_use]
pub fn build_alignment_prompt(question: &str, history: &str, prior: &[AlignmentParams]) -> String {
    let mut prompt = format!(
        "<question>{question}</question>\n\n\
         <history>\n{}\n</history>\n\n",
        or_placeholder(history, NO_HISTORY),
    );
    push_prior(&mut prompt, prior);
    prompt.push_str("Extract the BLAST parameters.");
    prompt
}

/// Builds the user message for database search parameters.
#[must_use]
pub fn build_search_prompt(question: &str, history: &str, prior: &[DatabaseQuery]) -> String {
    let mut prompt = format!(
        "<question>{question}</question>\n\n\
         <history>\n{}\n</history>\n\n",
        or_placeholder(history, NO_HISTORY),
    );
    push_prior(&mut prompt, prior);
    prompt.push_str("Generate the esearch parameters.");
    prompt
}

/// Builds the user message for database fetch parameters.
#[must_use]
pub fn build_fetch_prompt(question: &str, history: &str, prior: &[DatabaseQuery]) -> String {
    let mut prompt = format!(
        "<question>{question}</question>\n\n\
         <history>\n{}\n</history>\n\n",
        or_placeholder(history, NO_HISTORY),
    );
    push_prior(&mut prompt, prior);
    prompt.push_str("Generate the efetch or esummary parameters.");
    prompt
}

fn push_prior<T: serde::Serialize>(prompt: &mut String, prior: &[T]) {
    prompt.push_str("<previous_parameters>\n");
    if prior.is_empty() {
        prompt.push_str("No previously used parameters.\n");
    }
    for params in prior {
        let json = serde_json::to_string(params).unwrap_or_default();
        let _ = writeln!(prompt, "{json}");
    }
    prompt.push_str("</previous_parameters>\n\n");
}
