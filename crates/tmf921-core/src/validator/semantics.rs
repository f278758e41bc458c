//! Domain-semantics level: cross-references and cross-field consistency.
//!
//! Vocabulary terms are matched by local name (`target`, `hasExpectation`,
//! `PropertyExpectation`, ...) so documents that bind `icm:` to a slightly
//! different namespace IRI are still understood. Entity references are
//! compared by full IRI.

use chrono::{DateTime, FixedOffset};
use serde_json::Value as JsonValue;

use super::Findings;
use crate::turtle::{Graph, Term};

/// Prefixes a well-formed TMF921 expression is expected to declare.
pub const EXPECTED_NAMESPACES: [&str; 8] =
    ["icm", "imo", "rdf", "rdfs", "xsd", "idan", "logi", "quan"];

/// Layers an intent may be scoped to.
pub const VALID_LAYERS: [&str; 4] = ["resource", "service", "network", "business"];

/// Units accepted on `icm:unit*` properties (compared case-insensitively).
pub const RECOGNIZED_UNITS: &[&str] = &[
    // time
    "ns", "us", "µs", "ms", "s", "sec", "min", "h",
    // throughput
    "bps", "Kbps", "Mbps", "Gbps", "KB/s", "MB/s", "GB/s",
    // ratios
    "%", "percent", "ratio",
    // counts
    "count", "devices", "connections", "users", "sessions", "packets",
];

pub(crate) fn check(document: &JsonValue, graph: Option<&Graph>, findings: &mut Findings<'_>) {
    match graph {
        Some(graph) => check_graph(document, graph, findings),
        None => findings.fail("no expectation declared (expression could not be parsed)"),
    }

    check_time_order(
        document,
        "/validFor/startDateTime",
        "/validFor/endDateTime",
        findings,
    );
    check_time_order(document, "/creationDate", "/lastUpdate", findings);
}

fn check_graph(document: &JsonValue, graph: &Graph, findings: &mut Findings<'_>) {
    for prefix in EXPECTED_NAMESPACES {
        if !graph.prefixes.contains_key(prefix) {
            findings.warn(format!("missing namespace declaration '{}:'", prefix));
        }
    }

    let has_expectation = graph.triples.iter().any(|t| {
        t.predicate.local_name() == "hasExpectation"
            || (t.predicate.value == crate::turtle::RDF_TYPE
                && t.object.local_name().is_some_and(|l| l.ends_with("Expectation")))
    });
    if !has_expectation {
        findings.fail("no expectation declared (expected a PropertyExpectation, DeliveryExpectation or icm:hasExpectation)");
    }

    if graph.subjects_of_type("ReportingExpectation").next().is_none() {
        findings.warn("no ReportingExpectation declared");
    }

    check_references(graph, "target", findings);
    check_references(graph, "hasExpectation", findings);
    if graph.with_predicate("target").next().is_none() {
        findings.warn("no expectation declares an icm:target");
    }

    check_units(graph, findings);
    check_layers(graph, findings);

    if let Some(name) = document.get("name").and_then(JsonValue::as_str) {
        let declared = graph
            .triples
            .iter()
            .any(|t| t.subject.local_name() == Some(name));
        if !declared {
            findings.warn(format!("intent name '{}' is not declared in the expression", name));
        }
    }
}

/// Objects of `predicate` must be entities declared as subjects.
fn check_references(graph: &Graph, predicate: &str, findings: &mut Findings<'_>) {
    for triple in graph.with_predicate(predicate) {
        match &triple.object {
            Term::Iri(iri) if !graph.declares(iri) => findings.fail(format!(
                "{} {} references undeclared entity {}",
                triple.subject, triple.predicate, iri
            )),
            Term::Literal(literal) => findings.fail(format!(
                "{} {} must reference an entity, found literal \"{}\"",
                triple.subject, triple.predicate, literal.lexical
            )),
            _ => {}
        }
    }
}

fn check_units(graph: &Graph, findings: &mut Findings<'_>) {
    for triple in graph
        .triples
        .iter()
        .filter(|t| t.predicate.local_name().starts_with("unit"))
    {
        let raw = match &triple.object {
            Term::Literal(literal) => literal.lexical.as_str(),
            Term::Iri(iri) => iri.local_name(),
            Term::BlankNode(_) => {
                findings.fail(format!("{} must be a unit literal", triple.predicate));
                continue;
            }
        };
        let unit = normalize_unit(raw);
        if !is_recognized_unit(unit) {
            findings.fail(format!(
                "{} uses unrecognized unit '{}' on {}",
                triple.predicate, unit, triple.subject
            ));
        }
    }
}

fn check_layers(graph: &Graph, findings: &mut Findings<'_>) {
    for triple in graph.with_predicate("layer") {
        let value = match &triple.object {
            Term::Literal(literal) => literal.lexical.as_str(),
            Term::Iri(iri) => iri.local_name(),
            Term::BlankNode(_) => continue,
        };
        let value = normalize_unit(value);
        if !VALID_LAYERS.contains(&value) {
            findings.warn(format!("unknown layer '{}' on {}", value, triple.subject));
        }
    }
}

/// Strip the nested quoting TMF921 uses for unit literals (`"'ms'"`).
fn normalize_unit(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '\'' || c == '"').trim()
}

pub fn is_recognized_unit(unit: &str) -> bool {
    RECOGNIZED_UNITS.iter().any(|u| u.eq_ignore_ascii_case(unit))
}

fn check_time_order(document: &JsonValue, earlier: &str, later: &str, findings: &mut Findings<'_>) {
    let (Some(start), Some(end)) = (
        timestamp(document, earlier, findings),
        timestamp(document, later, findings),
    ) else {
        return;
    };
    if start > end {
        findings.fail(format!(
            "{} ({}) is after {} ({})",
            earlier.trim_start_matches('/'),
            start.to_rfc3339(),
            later.trim_start_matches('/'),
            end.to_rfc3339()
        ));
    }
}

fn timestamp(document: &JsonValue, pointer: &str, findings: &mut Findings<'_>) -> Option<DateTime<FixedOffset>> {
    let raw = document.pointer(pointer)?.as_str()?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts),
        Err(e) => {
            findings.warn(format!(
                "{} is not an RFC 3339 timestamp ({}): {}",
                pointer.trim_start_matches('/'),
                raw,
                e
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turtle;
    use crate::validator::{ValidationFailure, ValidationLevel};
    use serde_json::json;

    const HEADER: &str = "@prefix icm: <http://tio.models.tmforum.org/tio/v3.2.0/IntentCommonModel#> .\n\
        @prefix idan: <http://www.example.org/IDAN3#> .\n";

    fn run(document: &JsonValue, source: &str) -> (Vec<ValidationFailure>, Vec<ValidationFailure>) {
        let graph = turtle::parse(source).unwrap();
        let mut failures = Vec::new();
        let mut warnings = Vec::new();
        check(document, Some(&graph), &mut Findings {
            level: ValidationLevel::DomainSemantics,
            failures: &mut failures,
            warnings: &mut warnings,
        });
        (failures, warnings)
    }

    #[test]
    fn test_declared_target_passes() {
        let source = format!(
            "{}idan:E a icm:DeliveryExpectation ; icm:target idan:T .\nidan:T a icm:Target .",
            HEADER
        );
        let (failures, _) = run(&json!({}), &source);
        assert!(failures.is_empty(), "{:?}", failures);
    }

    #[test]
    fn test_undeclared_target_fails() {
        let source = format!(
            "{}idan:E a icm:DeliveryExpectation ; icm:target idan:Missing .",
            HEADER
        );
        let (failures, _) = run(&json!({}), &source);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("undeclared entity idan:Missing"));
    }

    #[test]
    fn test_undeclared_has_expectation_fails() {
        let source = format!(
            "{}idan:I a icm:Intent ; icm:hasExpectation idan:E1 , idan:E2 .\nidan:E1 a icm:PropertyExpectation .",
            HEADER
        );
        let (failures, _) = run(&json!({}), &source);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("idan:E2"));
    }

    #[test]
    fn test_missing_expectation_fails() {
        let source = format!("{}idan:I a icm:Intent .", HEADER);
        let (failures, _) = run(&json!({}), &source);
        assert!(failures[0].message.starts_with("no expectation declared"));
    }

    #[test]
    fn test_unit_recognition() {
        let source = format!(
            "{}idan:E a icm:PropertyExpectation .\n\
             idan:C1 icm:unit80000 \"'ms'\" .\n\
             idan:C2 icm:unit \"furlongs\" .",
            HEADER
        );
        let (failures, _) = run(&json!({}), &source);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("'furlongs'"));
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let source = format!(
            "{}idan:E a icm:DeliveryExpectation ; icm:target idan:E ; <http://x/layer> \"galactic\" .",
            HEADER
        );
        let (failures, warnings) = run(&json!({"name": "Intent_Other"}), &source);
        assert!(failures.is_empty());
        let messages: Vec<_> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("'imo:'")));
        assert!(messages.iter().any(|m| m.contains("ReportingExpectation")));
        assert!(messages.iter().any(|m| m.contains("Intent_Other")));
        assert!(messages.iter().any(|m| m.contains("galactic")));
    }

    #[test]
    fn test_valid_for_order() {
        let source = format!("{}idan:E a icm:PropertyExpectation .", HEADER);
        let doc = json!({
            "validFor": {
                "startDateTime": "2026-01-01T00:00:00Z",
                "endDateTime": "2025-01-01T00:00:00Z"
            }
        });
        let (failures, _) = run(&doc, &source);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("validFor/startDateTime"));
    }

    #[test]
    fn test_creation_after_update_fails() {
        let source = format!("{}idan:E a icm:PropertyExpectation .", HEADER);
        let doc = json!({
            "creationDate": "2025-06-01T00:00:00.00Z",
            "lastUpdate": "2025-05-01T00:00:00.00Z"
        });
        let (failures, _) = run(&doc, &source);
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn test_unparseable_timestamp_is_warning() {
        let source = format!("{}idan:E a icm:PropertyExpectation .", HEADER);
        let doc = json!({"creationDate": "yesterday", "lastUpdate": "2025-05-01T00:00:00Z"});
        let (failures, warnings) = run(&doc, &source);
        assert!(failures.is_empty());
        assert!(warnings.iter().any(|w| w.message.contains("yesterday")));
    }

    #[test]
    fn test_normalize_unit() {
        assert_eq!(normalize_unit("'MB/s'"), "MB/s");
        assert_eq!(normalize_unit(" \"ms\" "), "ms");
        assert!(is_recognized_unit("mbps"));
    }
}
