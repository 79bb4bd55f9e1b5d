//! Annotated conversation messages.
//!
//! A [`Message`] is immutable once created. The [`Annotation`] tag marks its
//! semantic role in the run (the question, a tool's progress or response, a
//! tool error, the final answer). Consumers locate messages by annotation,
//! never by position.

use serde::{Deserialize, Serialize};

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
    /// Tool-agent output.
    Tool,
}

/// Semantic tag attached to every history message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    /// The user's question.
    Question,
    /// Sequence-alignment job submitted or still running.
    AlignmentProgress,
    /// Sequence-alignment results.
    AlignmentResponse,
    /// Sequence-alignment failure.
    AlignmentError,
    /// Database search results (identifiers).
    DatabaseProgress,
    /// Database detail records.
    DatabaseResponse,
    /// Database lookup failure.
    DatabaseError,
    /// Web-search answer.
    SearchResponse,
    /// Web-search failure.
    SearchError,
    /// The orchestrator's terminal output.
    FinalAnswer,
}

impl Annotation {
    /// Returns `true` for tool progress and response tags.
    ///
    /// These are the messages the router and evaluator treat as evidence.
    #[must_use]
    pub const fn is_tool_evidence(self) -> bool {
        matches!(
            self,
            Self::AlignmentProgress
                | Self::AlignmentResponse
                | Self::DatabaseProgress
                | Self::DatabaseResponse
                | Self::SearchResponse
        )
    }

    /// Returns `true` for tool error tags.
    #[must_use]
    pub const fn is_tool_error(self) -> bool {
        matches!(
            self,
            Self::AlignmentError | Self::DatabaseError | Self::SearchError
        )
    }

    /// Returns the wire name of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::AlignmentProgress => "alignment_progress",
            Self::AlignmentResponse => "alignment_response",
            Self::AlignmentError => "alignment_error",
            Self::DatabaseProgress => "database_progress",
            Self::DatabaseResponse => "database_response",
            Self::DatabaseError => "database_error",
            Self::SearchResponse => "search_response",
            Self::SearchError => "search_error",
            Self::FinalAnswer => "final_answer",
        }
    }
}

impl std::fmt::Display for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Semantic tag.
    pub annotation: Annotation,
}

impl Message {
    /// Creates the user question message.
    #[must_use]
    pub fn question(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            annotation: Annotation::Question,
        }
    }

    /// Creates a tool-agent message with the given tag.
    #[must_use]
    pub fn tool(annotation: Annotation, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            annotation,
        }
    }

    /// Creates the final answer message.
    #[must_use]
    pub fn final_answer(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            annotation: Annotation::FinalAnswer,
        }
    }
}

/// Formats messages as a labelled transcript for prompts.
///
/// Each message becomes a `--- <annotation> ---` header followed by its
/// content. Returns an empty string for an empty slice.
#[must_use]
pub fn format_transcript<'a>(messages: impl IntoIterator<Item = &'a Message>) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for msg in messages {
        let _ = write!(out, "\n--- {} ---\n{}\n", msg.annotation, msg.content);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_message() {
        let msg = Message::question("Which chromosome is TTTY7 on?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.annotation, Annotation::Question);
    }

    #[test]
    fn test_evidence_tags() {
        assert!(Annotation::DatabaseProgress.is_tool_evidence());
        assert!(Annotation::SearchResponse.is_tool_evidence());
        assert!(!Annotation::DatabaseError.is_tool_evidence());
        assert!(!Annotation::FinalAnswer.is_tool_evidence());
        assert!(Annotation::AlignmentError.is_tool_error());
        assert!(!Annotation::Question.is_tool_error());
    }

    #[test]
    fn test_annotation_serialization() {
        let json = serde_json::to_string(&Annotation::FinalAnswer).unwrap_or_default();
        assert_eq!(json, "\"final_answer\"");
        assert_eq!(Annotation::AlignmentProgress.to_string(), "alignment_progress");
    }

    #[test]
    fn test_format_transcript() {
        let msgs = [
            Message::tool(Annotation::DatabaseProgress, "ids: 1,2"),
            Message::tool(Annotation::DatabaseResponse, "Chromosome: Y"),
        ];
        let text = format_transcript(&msgs);
        assert!(text.contains("--- database_progress ---\nids: 1,2"));
        assert!(text.find("database_progress") < text.find("database_response"));
        assert!(format_transcript(&[]).is_empty());
    }
}
