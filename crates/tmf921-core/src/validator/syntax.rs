//! Expression syntax level: the embedded Turtle must parse and be non-empty.

use serde_json::Value as JsonValue;

use super::Findings;
use crate::document::expression_value;
use crate::turtle::{self, Graph};

/// Parse the expression, returning the graph for the semantics level.
pub(crate) fn check(document: &JsonValue, findings: &mut Findings<'_>) -> Option<Graph> {
    let Some(source) = expression_value(document) else {
        findings.fail("expression.expressionValue is missing or not a string; nothing to parse");
        return None;
    };

    if let Some(language) = document
        .pointer("/expression/expressionLanguage")
        .and_then(JsonValue::as_str)
    {
        if !language.eq_ignore_ascii_case("turtle") {
            findings.warn(format!(
                "expressionLanguage is '{}', parsing as Turtle anyway",
                language
            ));
        }
    }

    match turtle::parse(source) {
        Ok(graph) if graph.is_empty() => {
            findings.fail("Turtle expression parsed but contains no triples");
            Some(graph)
        }
        Ok(graph) => Some(graph),
        Err(e) => {
            findings.fail(format!("malformed Turtle at {}", e));
            None
        }
    }
}
