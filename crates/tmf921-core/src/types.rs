//! Data model shared by the validator, the orchestrator and the batch runner.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Errors that can occur when loading the input collection.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read intents file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse intents JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Duplicate intent id: {0}")]
    DuplicateId(u64),

    #[error("Intent {0} has empty text")]
    EmptyText(u64),
}

/// A natural-language intent to translate. Loaded once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputIntent {
    /// Stable identifier, unique within a run
    pub id: u64,

    /// Natural-language description
    pub text: String,
}

impl InputIntent {
    pub fn new(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// Outcome of validating one generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// Model output passed every validation level
    Valid,

    /// Neither model output nor the template passed validation
    Invalid,

    /// Model output was rejected and a template document was substituted
    Fallback,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Invalid => "invalid",
            ValidationStatus::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The artifact produced for exactly one [`InputIntent`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedIntent {
    pub source_id: u64,

    /// The TMF921 intent document (model-generated or template-derived)
    pub structured_document: JsonValue,

    pub validation_status: ValidationStatus,

    /// Validator diagnostics, in level order. Empty for valid documents.
    #[serde(default)]
    pub diagnostics: Vec<String>,

    /// Name of the backend that produced the document, or "template"
    pub provider_used: String,

    pub generated_at: DateTime<Utc>,
}

impl GeneratedIntent {
    pub fn is_valid(&self) -> bool {
        self.validation_status == ValidationStatus::Valid
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIntent {
    Text(String),
    Record {
        id: u64,
        #[serde(alias = "user_intent")]
        text: String,
    },
}

/// Parse an intents collection.
///
/// Accepts either a JSON array of strings (ids are assigned from position,
/// starting at 1) or an array of `{id, text}` records.
pub fn parse_intents(json: &str) -> Result<Vec<InputIntent>, InputError> {
    let raw: Vec<RawIntent> = serde_json::from_str(json)?;
    let mut seen = HashSet::new();
    let mut intents = Vec::with_capacity(raw.len());

    for (position, entry) in raw.into_iter().enumerate() {
        let intent = match entry {
            RawIntent::Text(text) => InputIntent::new(position as u64 + 1, text),
            RawIntent::Record { id, text } => InputIntent::new(id, text),
        };

        if intent.text.trim().is_empty() {
            return Err(InputError::EmptyText(intent.id));
        }
        if !seen.insert(intent.id) {
            return Err(InputError::DuplicateId(intent.id));
        }
        intents.push(intent);
    }

    Ok(intents)
}

/// Load an intents collection from a JSON file.
pub fn load_intents(path: impl AsRef<Path>) -> Result<Vec<InputIntent>, InputError> {
    let contents = fs::read_to_string(path)?;
    parse_intents(&contents)
}
