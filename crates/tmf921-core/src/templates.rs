//! Deterministic TMF921 document templates.
//!
//! Used for the fallback document when model output is rejected, and for the
//! reference example embedded in non-RAG prompts. All functions are pure:
//! timestamps are passed in rather than read from the clock.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value as JsonValue};

use crate::category::{IntentAnalysis, IntentCategory, IntentLayer};
use crate::types::InputIntent;

/// Namespace prefixes every template declares.
pub const TURTLE_PREFIXES: &str = "\
@prefix icm:  <http://tio.models.tmforum.org/tio/v3.2.0/IntentCommonModel#> .
@prefix imo:  <http://tio.models.tmforum.org/tio/v3.2.0/IntentManagmentOntology#> .
@prefix rdf:  <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix xsd:  <http://www.w3.org/2001/XMLSchema#> .
@prefix idan: <http://www.example.org/IDAN3#> .
@prefix t:    <http://www.w3.org/2006/time#> .
@prefix logi: <http://tio.models.tmforum.org/tio/v3.2.0/LogicalOperators#> .
@prefix quan: <http://tio.models.tmforum.org/tio/v3.2.0/QuantityOntology#> .
@prefix set:  <http://tio.models.tmforum.org/tio/v3.2.0/SetOperators#> .
@prefix fun:  <http://tio.models.tmforum.org/tio/v3.2.0/FunctionOntology#> .
@prefix ui:   <http://www..example.org/ui#> .
@prefix mf:   <http://www..example.org/mf#> .
@prefix cem:  <http://tio.labs.tmforum.org/tio/v1.0.0/CatalystExtensionModel#> .
@prefix iv:   <http://tio.models.tmforum.org/tio/v3.2.0/IntentValidity#> .";

pub const EXPRESSION_IRI: &str = "http://tio.models.tmforum.org/tio/v3.2.0/IntentCommonModel/";
pub const SCHEMA_LOCATION: &str =
    "https://mycsp.com:8080/tmf-api/schema/Common/TurtleExpression.schema.json";

/// Provider label recorded on template-derived documents.
pub const TEMPLATE_PROVIDER: &str = "template";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Latency/throughput conditions with utility functions
    PropertyExpectation,
    /// Plain service delivery
    DeliveryExpectation,
}

/// Per category: (fallback template, reference example template).
pub const TEMPLATE_TABLE: [(IntentCategory, TemplateKind, TemplateKind); 8] = [
    (IntentCategory::UltraLowLatency, TemplateKind::PropertyExpectation, TemplateKind::PropertyExpectation),
    (IntentCategory::LowLatency, TemplateKind::PropertyExpectation, TemplateKind::PropertyExpectation),
    (IntentCategory::HighThroughput, TemplateKind::PropertyExpectation, TemplateKind::PropertyExpectation),
    (IntentCategory::IotMassive, TemplateKind::PropertyExpectation, TemplateKind::DeliveryExpectation),
    (IntentCategory::IotCritical, TemplateKind::PropertyExpectation, TemplateKind::PropertyExpectation),
    (IntentCategory::MobileBroadband, TemplateKind::PropertyExpectation, TemplateKind::DeliveryExpectation),
    (IntentCategory::EdgeComputing, TemplateKind::PropertyExpectation, TemplateKind::PropertyExpectation),
    (IntentCategory::ServiceDelivery, TemplateKind::DeliveryExpectation, TemplateKind::DeliveryExpectation),
];

fn table_entry(category: IntentCategory) -> (TemplateKind, TemplateKind) {
    TEMPLATE_TABLE
        .iter()
        .find(|(c, _, _)| *c == category)
        .map(|(_, fallback, reference)| (*fallback, *reference))
        .unwrap_or((TemplateKind::PropertyExpectation, TemplateKind::PropertyExpectation))
}

pub fn fallback_kind(category: IntentCategory) -> TemplateKind {
    table_entry(category).0
}

pub fn reference_kind(category: IntentCategory) -> TemplateKind {
    table_entry(category).1
}

/// Parameters of a PropertyExpectation expression.
#[derive(Debug, Clone)]
pub struct PropertyParams<'a> {
    pub intent_id: &'a str,
    pub service_type: &'a str,
    pub latency: u32,
    pub latency_unit: &'a str,
    pub throughput: u32,
    pub throughput_unit: &'a str,
    pub layer: &'a str,
}

pub fn property_expectation_turtle(p: &PropertyParams<'_>) -> String {
    let id = p.intent_id;
    format!(
        r#"{prefixes}

# Intent
idan:{id}
  a icm:Intent ;
  cem:layer idan:{layer} ;
  imo:intentOwner idan:NetworkOperator ;
  icm:hasExpectation idan:{id}_Expectation,
                     idan:{id}_Reporting
.

# Target
idan:{id}_Target
  a icm:Target ;
  icm:chooseFrom [ set:resourcesOfType idan:{service_type} ]
.

# Property Expectation
idan:{id}_Expectation
  a icm:PropertyExpectation ;
  icm:target idan:{id}_Target ;
  logi:allOf [ rdfs:member idan:{id}_Condition ]
.

# Utility function for latency
idan:{id}_Utility_Latency
  a mf:LogisticFunction ;
  a ui:Utility ;
  mf:functionInput idan:Latency ;
  mf:midpoint {latency_mid} ;
  mf:supremum 1.0 ;
  mf:logisticGrowth -0.2 ;
  iv:validIf [ a icm:Condition ;
               quan:atLeast [ idan:Latency [ rdf:value 0 ] ] ;
               quan:atMost [ idan:Latency [ rdf:value {latency_max} ] ]
             ]
.

# Utility function for throughput
idan:{id}_Utility_Throughput
  a mf:LogisticFunction ;
  a ui:Utility ;
  mf:functionInput idan:Throughput ;
  mf:midpoint {throughput} ;
  mf:supremum 1.0 ;
  mf:logisticGrowth 0.05 ;
  iv:validIf [ a icm:Condition ;
               quan:atLeast [ idan:Throughput [ rdf:value {throughput_min} ] ] ;
               quan:atMost [ idan:Throughput [ rdf:value {throughput_max} ] ]
             ]
.

# Conditions
idan:{id}_Condition
  a icm:Condition ;
  rdfs:label "" ;
  quan:smaller [ idan:Latency
                 [ rdf:value "{latency}"^^xsd:decimal ;
                   icm:unit80000 "'{latency_unit}'" ]
               ] ;
  ui:utility idan:{id}_Utility_Latency ;
  quan:greater [ idan:Throughput
                 [ rdf:value "{throughput}"^^xsd:decimal ;
                   icm:unit80000 "'{throughput_unit}'" ]
               ] ;
  ui:utility idan:{id}_Utility_Throughput
.

{reporting}"#,
        prefixes = TURTLE_PREFIXES,
        layer = p.layer,
        service_type = p.service_type,
        latency = p.latency,
        latency_mid = p.latency / 2,
        latency_max = p.latency.saturating_mul(2),
        latency_unit = p.latency_unit,
        throughput = p.throughput,
        throughput_min = p.throughput / 2,
        throughput_max = p.throughput.saturating_mul(2),
        throughput_unit = p.throughput_unit,
        reporting = reporting_block(id, "IntentManager"),
    )
}

pub fn delivery_expectation_turtle(intent_id: &str, service_type: &str, layer: &str) -> String {
    let id = intent_id;
    format!(
        r#"{prefixes}

# Intent
idan:{id}
  a icm:Intent ;
  cem:layer idan:{layer} ;
  imo:intentOwner idan:ServiceOperator ;
  rdfs:comment "Intent for {service_type}" ;
  icm:hasExpectation idan:{id}_Expectation,
                     idan:{id}_Reporting
.

# Delivery Expectation
idan:{id}_Expectation
  a icm:DeliveryExpectation ;
  icm:target idan:{id}_Target ;
.

# Target
idan:{id}_Target
  a icm:Target ;
  icm:allOf [ rdfs:member idan:{service_type} ]
.

{reporting}"#,
        prefixes = TURTLE_PREFIXES,
        reporting = reporting_block(id, "Operations"),
    )
}

/// Five-minute reporting event plus the ReportingExpectation.
fn reporting_block(id: &str, destination: &str) -> String {
    format!(
        r#"# Reporting Event (every 5 minutes)
idan:{id}_Event
  a rdfs:Class ;
  rdfs:subClassOf imo:Event ;
  logi:if [ t:after [ imo:timeOfLastEvent [ rdfs:member idan:{id}_Event ;
                                            rdfs:member idan:{id} ] ] ,
                    [ t:hasDuration "'PT5M'"^^xsd:duration ] ;
            t:before [ t:hasBeginning imo:Now ] ;
          ] ;
  imo:eventFor idan:{id}
.

# Reporting Expectation
idan:{id}_Reporting
  a icm:ReportingExpectation ;
  icm:target idan:{id} ;
  icm:reportDestination [ rdfs:member idan:{destination} ] ;
  icm:reportTriggers [ rdfs:member imo:IntentRejected ;
                       rdfs:member imo:IntentAccepted ;
                       rdfs:member imo:IntentDegrades ;
                       rdfs:member imo:IntentComplies ;
                       rdfs:member imo:IntentRemoval ;
                       rdfs:member idan:{id}_Event ]
."#
    )
}

/// Timestamp in the TMF921 wire format (`2025-01-01T00:00:00.000+00:00`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3f+00:00").to_string()
}

/// The TMF921 Intent JSON envelope around a Turtle expression.
pub fn base_intent_document(
    name: &str,
    description: &str,
    turtle: &str,
    at: DateTime<Utc>,
) -> JsonValue {
    let timestamp = format_timestamp(at);
    json!({
        "statusChangeDate": timestamp,
        "expression": {
            "iri": EXPRESSION_IRI,
            "@baseType": "Expression",
            "@type": "TurtleExpression",
            "expressionLanguage": "Turtle",
            "expressionValue": turtle,
            "@schemaLocation": SCHEMA_LOCATION,
        },
        "lifecycleStatus": "Created",
        "@baseType": "Intent",
        "validFor": {
            "startDateTime": timestamp,
            "endDateTime": format_timestamp(at + Duration::days(365)),
        },
        "@type": "Intent",
        "lastUpdate": timestamp,
        "name": name,
        "description": description,
        "creationDate": timestamp,
        "@schemaLocation": SCHEMA_LOCATION,
        "version": "1",
    })
}

#[allow(clippy::too_many_arguments)]
fn render(
    kind: TemplateKind,
    name: &str,
    description: &str,
    service_type: &str,
    layer: IntentLayer,
    latency: u32,
    throughput: u32,
    at: DateTime<Utc>,
) -> JsonValue {
    let turtle = match kind {
        TemplateKind::PropertyExpectation => property_expectation_turtle(&PropertyParams {
            intent_id: name,
            service_type,
            latency,
            latency_unit: "ms",
            throughput,
            throughput_unit: "MB/s",
            layer: layer.as_str(),
        }),
        TemplateKind::DeliveryExpectation => {
            delivery_expectation_turtle(name, service_type, layer.as_str())
        }
    };
    base_intent_document(name, description, &turtle, at)
}

/// Intent name used for an item: the analysis name suffixed with the id.
pub fn item_intent_name(intent: &InputIntent, analysis: &IntentAnalysis) -> String {
    format!("{}_{}", analysis.intent_name, intent.id)
}

/// Template document substituted for rejected model output.
pub fn fallback_document(
    intent: &InputIntent,
    analysis: &IntentAnalysis,
    at: DateTime<Utc>,
) -> JsonValue {
    render(
        fallback_kind(analysis.category),
        &item_intent_name(intent, analysis),
        &intent.text,
        &analysis.service_type,
        analysis.layer,
        analysis.latency_ms,
        analysis.throughput_mbps,
        at,
    )
}

/// Reference example shown to the model when no retrieved examples exist.
pub fn reference_example(category: IntentCategory, at: DateTime<Utc>) -> JsonValue {
    match reference_kind(category) {
        TemplateKind::PropertyExpectation => render(
            TemplateKind::PropertyExpectation,
            "ExampleIntent",
            "Example intent for reference",
            "ExampleService",
            IntentLayer::Resource,
            20,
            150,
            at,
        ),
        TemplateKind::DeliveryExpectation => render(
            TemplateKind::DeliveryExpectation,
            "ExampleServiceIntent",
            "Example service delivery intent",
            "ExampleService",
            IntentLayer::Service,
            0,
            0,
            at,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::analyze;
    use crate::turtle;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_table_covers_every_category() {
        for category in IntentCategory::ALL {
            assert!(TEMPLATE_TABLE.iter().any(|(c, _, _)| *c == category));
        }
        assert_eq!(fallback_kind(IntentCategory::ServiceDelivery), TemplateKind::DeliveryExpectation);
        assert_eq!(fallback_kind(IntentCategory::IotMassive), TemplateKind::PropertyExpectation);
        assert_eq!(reference_kind(IntentCategory::IotMassive), TemplateKind::DeliveryExpectation);
    }

    #[test]
    fn test_property_template_parses() {
        let source = property_expectation_turtle(&PropertyParams {
            intent_id: "Intent_Test_1",
            service_type: "EmergencyService",
            latency: 10,
            latency_unit: "ms",
            throughput: 200,
            throughput_unit: "MB/s",
            layer: "resource",
        });
        let graph = turtle::parse(&source).unwrap();
        assert_eq!(graph.prefixes.len(), 15);
        assert_eq!(graph.subjects_of_type("PropertyExpectation").count(), 1);
        assert_eq!(graph.subjects_of_type("ReportingExpectation").count(), 1);
        assert!(source.contains("mf:midpoint 5 ;"));
        assert!(source.contains("rdf:value 400 ]"));
    }

    #[test]
    fn test_delivery_template_parses() {
        let source = delivery_expectation_turtle("Intent_Svc_2", "IoTService", "service");
        let graph = turtle::parse(&source).unwrap();
        assert_eq!(graph.subjects_of_type("DeliveryExpectation").count(), 1);
    }

    #[test]
    fn test_fallback_document_envelope() {
        let intent = InputIntent::new(7, "Deploy a new streaming \"premium\" service");
        let analysis = analyze(&intent.text);
        let doc = fallback_document(&intent, &analysis, at());

        assert_eq!(doc["name"], format!("{}_7", analysis.intent_name));
        assert_eq!(doc["description"], intent.text.as_str());
        assert_eq!(doc["lifecycleStatus"], "Created");
        assert_eq!(doc["creationDate"], "2025-01-01T00:00:00.000+00:00");
        assert_eq!(doc["validFor"]["endDateTime"], "2026-01-01T00:00:00.000+00:00");
        assert_eq!(doc["expression"]["@type"], "TurtleExpression");
    }

    #[test]
    fn test_templates_are_deterministic() {
        let intent = InputIntent::new(3, "Create a low latency gaming slice");
        let analysis = analyze(&intent.text);
        assert_eq!(
            fallback_document(&intent, &analysis, at()),
            fallback_document(&intent, &analysis, at())
        );
    }
}
