//! Strict decoding of structured model replies.
//!
//! A reply is first parsed whole (after stripping a Markdown code fence).
//! If it is not valid JSON, the single fallback is to parse the first
//! balanced `{...}` span in the text. Valid JSON with the wrong shape is a
//! schema failure and is not re-parsed.

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::AgentError;

/// Why a reply could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The reply contains no `{`.
    NoObject,
    /// An object-like span was found but is not valid JSON.
    Malformed,
    /// Valid JSON that does not match the expected schema.
    Schema,
}

/// A failed decode, tagged with its kind.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct DecodeError {
    /// Failure kind.
    pub kind: DecodeErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl DecodeError {
    fn new(kind: DecodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Converts into an [`AgentError::ResponseParse`] carrying the raw reply.
    #[must_use]
    pub fn into_agent_error(self, content: &str) -> AgentError {
        AgentError::ResponseParse {
            message: self.to_string(),
            content: content.to_string(),
        }
    }
}

fn classify(err: &serde_json::Error) -> DecodeErrorKind {
    if err.is_data() {
        DecodeErrorKind::Schema
    } else {
        DecodeErrorKind::Malformed
    }
}

/// Decodes a model reply into `T`.
///
/// # Errors
///
/// Returns a [`DecodeError`] tagged [`DecodeErrorKind::NoObject`],
/// [`DecodeErrorKind::Malformed`] or [`DecodeErrorKind::Schema`].
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    let body = strip_code_fence(text.trim());

    match serde_json::from_str::<T>(body) {
        Ok(value) => return Ok(value),
        Err(e) if e.is_data() => {
            return Err(DecodeError::new(DecodeErrorKind::Schema, e.to_string()));
        }
        Err(_) => {}
    }

    let span = first_object_span(text)?;
    serde_json::from_str::<T>(span).map_err(|e| DecodeError::new(classify(&e), e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Returns the first balanced `{...}` span, honoring JSON string escapes.
///
/// # Errors
///
/// [`DecodeErrorKind::NoObject`] if there is no `{`, and
/// [`DecodeErrorKind::Malformed`] if the first object never closes.
pub fn first_object_span(text: &str) -> Result<&str, DecodeError> {
    let start = text
        .find('{')
        .ok_or_else(|| DecodeError::new(DecodeErrorKind::NoObject, "no JSON object in reply"))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    Err(DecodeError::new(
        DecodeErrorKind::Malformed,
        "unterminated JSON object in reply",
    ))
}
