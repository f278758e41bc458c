//! Extraction of a JSON intent document from raw model output.
//!
//! Models frequently wrap their answer in markdown fences or surround it with
//! prose. The parser strips fences first, then falls back to the outermost
//! `{ ... }` span before giving up.

use serde_json::Value as JsonValue;
use thiserror::Error;

/// Errors when raw model text cannot be turned into a JSON object.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Model output is empty")]
    Empty,

    #[error("Model output is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Model output is JSON but not an object")]
    NotAnObject,
}

/// Parse raw model text into a JSON object.
pub fn parse_document(raw: &str) -> Result<JsonValue, ParseError> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let value = match serde_json::from_str::<JsonValue>(text) {
        Ok(value) => value,
        Err(first_error) => match outermost_object(text) {
            Some(span) => serde_json::from_str(span)
                .map_err(|e| ParseError::InvalidJson(e.to_string()))?,
            None => return Err(ParseError::InvalidJson(first_error.to_string())),
        },
    };

    if value.is_object() {
        Ok(value)
    } else {
        Err(ParseError::NotAnObject)
    }
}

/// Remove a surrounding markdown code fence (```json ... ``` or ``` ... ```).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip the info string on the opening fence line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Return `expression.expressionValue` when present as a string.
pub fn expression_value(document: &JsonValue) -> Option<&str> {
    document
        .pointer("/expression/expressionValue")
        .and_then(JsonValue::as_str)
}
