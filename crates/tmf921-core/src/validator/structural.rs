//! Structural level: JSON Schema validation of the intent envelope.
//!
//! The schema is embedded at compile time from
//! `schema/tmf921-intent.schema.json`. Unknown extra fields are tolerated.

use std::sync::OnceLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use super::Findings;

/// Embedded intent schema (loaded at compile time).
const INTENT_SCHEMA_JSON: &str = include_str!("../../schema/tmf921-intent.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: JsonValue = match serde_json::from_str(INTENT_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

pub(crate) fn check(document: &JsonValue, findings: &mut Findings<'_>) {
    let validator = match get_validator() {
        Ok(v) => v,
        Err(e) => {
            findings.fail(e.to_string());
            return;
        }
    };

    for error in validator.iter_errors(document) {
        let path = error.instance_path.to_string();
        let location = if path.is_empty() { "/" } else { path.as_str() };
        findings.fail(format!("{} at {}", error, location));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{ValidationFailure, ValidationLevel};
    use serde_json::json;

    fn run(document: &JsonValue) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        let mut warnings = Vec::new();
        check(document, &mut Findings {
            level: ValidationLevel::Structural,
            failures: &mut failures,
            warnings: &mut warnings,
        });
        failures
    }

    fn minimal() -> JsonValue {
        json!({
            "name": "Intent_Test",
            "description": "test",
            "lifecycleStatus": "Created",
            "creationDate": "2025-01-01T00:00:00Z",
            "@type": "Intent",
            "@baseType": "Intent",
            "expression": {
                "iri": "http://tio.models.tmforum.org/tio/v3.2.0/IntentCommonModel/",
                "@type": "TurtleExpression",
                "expressionLanguage": "Turtle",
                "expressionValue": "@prefix a: <http://a/> ."
            }
        })
    }

    #[test]
    fn test_schema_compiles() {
        assert!(get_validator().is_ok());
    }

    #[test]
    fn test_minimal_document_passes() {
        assert!(run(&minimal()).is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        let mut doc = minimal();
        doc.as_object_mut().unwrap().remove("creationDate");
        let failures = run(&doc);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("creationDate"));
    }

    #[test]
    fn test_wrong_types_reported_with_path() {
        let mut doc = minimal();
        doc["expression"]["expressionValue"] = json!(42);
        let failures = run(&doc);
        assert!(failures
            .iter()
            .any(|f| f.message.contains("/expression/expressionValue")));
    }

    #[test]
    fn test_blank_expression_rejected() {
        let mut doc = minimal();
        doc["expression"]["expressionValue"] = json!("   \n ");
        assert!(!run(&doc).is_empty());
    }

    #[test]
    fn test_invalid_lifecycle_status() {
        let mut doc = minimal();
        doc["lifecycleStatus"] = json!("Deleted");
        assert_eq!(run(&doc).len(), 1);
    }

    #[test]
    fn test_non_object_document() {
        assert!(!run(&json!("just a string")).is_empty());
    }
}
