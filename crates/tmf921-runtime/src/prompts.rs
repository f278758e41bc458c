//! Prompts for intent translation.
//!
//! Two shapes:
//! 1. Baseline: system prompt + intent with categorizer analysis and a
//!    category-matched reference document
//! 2. RAG: retrieved examples as few-shot context, in the order the
//!    retrieval provider returned them

use chrono::{DateTime, Utc};
use std::fmt::Write;

use tmf921_core::{reference_example, IntentAnalysis, InputIntent, RetrievedExample};

/// System prompt for baseline translation.
pub const SYSTEM_PROMPT: &str = r#"You are an expert in the TM Forum TMF921 Intent Management API and telecom network intent modeling.

Translate natural language telecom intents into TMF921 Intent JSON documents whose expression holds a Turtle RDF graph.

## Requirements
1. Output ONLY one JSON object. No markdown, no commentary
2. Required fields: name, description, expression, lifecycleStatus, creationDate, @type, @baseType
3. expression: {"@type": "TurtleExpression", "expressionLanguage": "Turtle", "iri": ..., "expressionValue": ...}
4. expressionValue is valid Turtle with every prefix it uses declared (icm, imo, rdf, rdfs, xsd, idan, logi, quan, set, cem)
5. Declare the intent (idan:<name> a icm:Intent) with icm:hasExpectation links to expectations declared in the same graph
6. Every icm:target must name an entity declared in the same graph
7. Use PropertyExpectation for performance targets and DeliveryExpectation for plain provisioning
8. Units: ms, s, MB/s, Gbps, Mbps, %
9. Always include a ReportingExpectation with an event trigger
10. Escape every quote inside expressionValue"#;

/// System prompt when examples are retrieved.
pub const RAG_SYSTEM_PROMPT: &str = r#"You are an expert TMF921 Intent translator. Convert natural language telecom intents into TMF921 Intent JSON documents with an embedded Turtle RDF expression.

## Requirements
1. Output ONLY valid JSON. No markdown, no code blocks
2. Include every required TMF921 field
3. Use well-formed Turtle in expressionValue and declare every prefix it uses
4. Include the TMF ontology namespaces (icm, imo, rdf, rdfs, xsd, idan, logi, quan)
5. Follow the patterns of the examples you are given"#;

/// A system + user prompt pair for the Model Gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: &'static str,
    pub user: String,
}

fn write_analysis(out: &mut String, intent: &InputIntent, analysis: &IntentAnalysis) {
    let _ = writeln!(out, "- Intent Index: {}", intent.id);
    let _ = writeln!(out, "- Category: {}", analysis.category.as_str());
    let _ = writeln!(out, "- Service Type: {}", analysis.service_type);
    let _ = writeln!(out, "- Layer: {}", analysis.layer.as_str());
    let _ = writeln!(out, "- Target Latency: {} ms", analysis.latency_ms);
    let _ = writeln!(out, "- Target Throughput: {} MB/s", analysis.throughput_mbps);
    let _ = writeln!(out, "- Priority: {}", analysis.priority);
    let _ = writeln!(out, "- Reliability: {}", analysis.reliability);
    let _ = writeln!(
        out,
        "- Suggested Intent Name: {}_{}",
        analysis.intent_name, intent.id
    );
}

/// Baseline prompt with a category-matched reference document.
pub fn baseline_prompt(intent: &InputIntent, analysis: &IntentAnalysis, at: DateTime<Utc>) -> Prompt {
    let reference = reference_example(analysis.category, at);

    let mut user = String::new();
    let _ = writeln!(user, "Translate this telecom intent into TMF921-compliant JSON:\n");
    let _ = writeln!(user, "USER INTENT: \"{}\"\n", intent.text);
    let _ = writeln!(user, "CONTEXT (use these parameters):");
    write_analysis(&mut user, intent, analysis);
    let _ = writeln!(user, "\nREFERENCE EXAMPLE (follow this structure):");
    let _ = writeln!(user, "{:#}", reference);
    let _ = writeln!(user, "\nINSTRUCTIONS:");
    let _ = writeln!(
        user,
        "1. Name the intent idan:{}_{} and use it as the document name",
        analysis.intent_name, intent.id
    );
    let _ = writeln!(user, "2. Use logistic utility functions for latency and throughput");
    let _ = writeln!(user, "3. Use the current time for creationDate and lastUpdate");
    let _ = write!(user, "\nGenerate the complete TMF921 Intent JSON now:");

    Prompt {
        system: SYSTEM_PROMPT,
        user,
    }
}

/// RAG prompt. At most `max_examples` retrieved examples are rendered,
/// in the order given.
pub fn rag_prompt(
    intent: &InputIntent,
    analysis: &IntentAnalysis,
    examples: &[RetrievedExample],
    max_examples: usize,
) -> Prompt {
    let mut user = String::new();
    let _ = writeln!(
        user,
        "Using the examples below as reference, translate this telecom intent to TMF921 format:\n"
    );
    let _ = writeln!(user, "SIMILAR EXAMPLES:");
    for (i, example) in examples.iter().take(max_examples).enumerate() {
        let _ = writeln!(user, "\n--- Example {} ---", i + 1);
        let _ = writeln!(user, "User Intent: {}", example.text);
        let _ = writeln!(user, "\nTMF921 Intent (JSON with Turtle RDF):");
        let _ = writeln!(user, "{:#}", example.reference_document);
    }
    let _ = writeln!(user, "\nINTENT TO TRANSLATE:\n{}\n", intent.text);
    let _ = writeln!(user, "INTENT ANALYSIS:");
    write_analysis(&mut user, intent, analysis);
    let _ = write!(
        user,
        "\nGenerate a complete, valid TMF921 Intent JSON following the pattern above. Output ONLY the JSON."
    );

    Prompt {
        system: RAG_SYSTEM_PROMPT,
        user,
    }
}
