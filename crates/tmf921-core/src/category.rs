//! Keyword-based intent categorization.
//!
//! Infers a coarse category for an intent, plus the parameters used to
//! prompt the model and to fill the fallback templates. Matching is purely
//! lexical and deterministic.
//!
//! Precedence: the category with the most distinct keyword hits wins; ties go
//! to the entry that appears first in [`CATEGORY_TABLE`]; no hits at all
//! yields [`IntentCategory::MobileBroadband`].

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    UltraLowLatency,
    LowLatency,
    HighThroughput,
    IotMassive,
    IotCritical,
    MobileBroadband,
    EdgeComputing,
    ServiceDelivery,
}

impl IntentCategory {
    /// All categories in table order.
    pub const ALL: [IntentCategory; 8] = [
        IntentCategory::UltraLowLatency,
        IntentCategory::LowLatency,
        IntentCategory::HighThroughput,
        IntentCategory::IotMassive,
        IntentCategory::IotCritical,
        IntentCategory::MobileBroadband,
        IntentCategory::EdgeComputing,
        IntentCategory::ServiceDelivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCategory::UltraLowLatency => "ultra_low_latency",
            IntentCategory::LowLatency => "low_latency",
            IntentCategory::HighThroughput => "high_throughput",
            IntentCategory::IotMassive => "iot_massive",
            IntentCategory::IotCritical => "iot_critical",
            IntentCategory::MobileBroadband => "mobile_broadband",
            IntentCategory::EdgeComputing => "edge_computing",
            IntentCategory::ServiceDelivery => "service_delivery",
        }
    }

    pub fn profile(&self) -> &'static CategoryProfile {
        // ALL and CATEGORY_TABLE share the same order
        &CATEGORY_TABLE[*self as usize]
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentLayer {
    Resource,
    Service,
}

impl IntentLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLayer::Resource => "resource",
            IntentLayer::Service => "service",
        }
    }
}

/// Static description of one category.
#[derive(Debug)]
pub struct CategoryProfile {
    pub category: IntentCategory,
    pub keywords: &'static [&'static str],
    /// Inclusive latency range in milliseconds
    pub latency_range: (u32, u32),
    /// Inclusive throughput range in MB/s
    pub throughput_range: (u32, u32),
    pub layer: IntentLayer,
    /// 1 is highest
    pub priority: u8,
    pub reliability: &'static str,
}

impl CategoryProfile {
    pub fn latency_midpoint(&self) -> u32 {
        (self.latency_range.0 + self.latency_range.1) / 2
    }

    pub fn throughput_midpoint(&self) -> u32 {
        (self.throughput_range.0 + self.throughput_range.1) / 2
    }
}

/// Category table in precedence order.
pub static CATEGORY_TABLE: [CategoryProfile; 8] = [
    CategoryProfile {
        category: IntentCategory::UltraLowLatency,
        keywords: &["surgery", "autonomous", "emergency", "mission-critical", "v2x", "ultra-low"],
        latency_range: (1, 10),
        throughput_range: (50, 200),
        layer: IntentLayer::Resource,
        priority: 1,
        reliability: "99.999%",
    },
    CategoryProfile {
        category: IntentCategory::LowLatency,
        keywords: &["gaming", "ar", "vr", "real-time", "live", "low latency", "ping"],
        latency_range: (10, 30),
        throughput_range: (100, 300),
        layer: IntentLayer::Resource,
        priority: 2,
        reliability: "99.9%",
    },
    CategoryProfile {
        category: IntentCategory::HighThroughput,
        keywords: &["video", "stream", "4k", "hd", "broadcast", "concert", "stadium"],
        latency_range: (30, 100),
        throughput_range: (200, 1000),
        layer: IntentLayer::Resource,
        priority: 3,
        reliability: "99.5%",
    },
    CategoryProfile {
        category: IntentCategory::IotMassive,
        keywords: &["iot", "sensor", "massive", "agricultural", "smart meter", "monitoring"],
        latency_range: (100, 1000),
        throughput_range: (1, 10),
        layer: IntentLayer::Resource,
        priority: 4,
        reliability: "95.0%",
    },
    CategoryProfile {
        category: IntentCategory::IotCritical,
        keywords: &["industrial", "automation", "control", "scada", "manufacturing"],
        latency_range: (10, 50),
        throughput_range: (10, 100),
        layer: IntentLayer::Resource,
        priority: 1,
        reliability: "99.99%",
    },
    CategoryProfile {
        category: IntentCategory::MobileBroadband,
        keywords: &["mobile", "broadband", "download", "upload", "connectivity"],
        latency_range: (20, 100),
        throughput_range: (100, 500),
        layer: IntentLayer::Resource,
        priority: 3,
        reliability: "99.0%",
    },
    CategoryProfile {
        category: IntentCategory::EdgeComputing,
        keywords: &["edge", "mec", "cdn", "compute", "processing"],
        latency_range: (5, 30),
        throughput_range: (100, 500),
        layer: IntentLayer::Resource,
        priority: 2,
        reliability: "99.9%",
    },
    CategoryProfile {
        category: IntentCategory::ServiceDelivery,
        keywords: &["deploy", "provision", "establish", "setup", "create"],
        latency_range: (50, 200),
        throughput_range: (50, 200),
        layer: IntentLayer::Service,
        priority: 3,
        reliability: "99.0%",
    },
];

/// Service types in precedence order; the first with any hit wins.
pub const SERVICE_TYPES: &[(&str, &[&str])] = &[
    ("NetworkSlice", &["slice", "network", "connectivity"]),
    ("IoTService", &["iot", "sensor", "device"]),
    ("EmergencyService", &["emergency", "critical", "rescue"]),
    ("BroadcastService", &["broadcast", "stream", "video"]),
    ("EdgeService", &["edge", "mec"]),
    ("VPNService", &["vpn", "secure", "encrypted"]),
    ("GamingService", &["gaming", "game", "e-sports"]),
    ("V2XService", &["v2x", "vehicle", "autonomous driving"]),
    ("TelehealthService", &["telemedicine", "health", "medical", "hospital"]),
    ("IndustrialService", &["industrial", "manufacturing", "automation"]),
];

pub const DEFAULT_SERVICE_TYPE: &str = "NetworkSlice";

/// Word-boundary matcher tolerating simple inflections (`sensors`, `streaming`).
fn keyword_regex(keyword: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}(?:s|es|ing|ed)?\b", regex::escape(keyword))).unwrap()
}

lazy_static! {
    static ref CATEGORY_MATCHERS: Vec<Vec<Regex>> = CATEGORY_TABLE
        .iter()
        .map(|profile| profile.keywords.iter().map(|k| keyword_regex(k)).collect())
        .collect();

    static ref SERVICE_MATCHERS: Vec<(&'static str, Vec<Regex>)> = SERVICE_TYPES
        .iter()
        .map(|(name, keywords)| (*name, keywords.iter().map(|k| keyword_regex(k)).collect()))
        .collect();

    static ref LATENCY_PATTERNS: Vec<Regex> = [
        r"(?i)below\s+(\d+)\s*ms",
        r"(?i)under\s+(\d+)\s*ms",
        r"(?i)latency\s+(\d+)\s*ms",
        r"(?i)ping\s+below\s+(\d+)",
        r"(?i)<\s*(\d+)\s*ms",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();

    static ref MBYTES_PATTERN: Regex = Regex::new(r"(?i)(\d+)\s*mb/s").unwrap();
    static ref MBITS_PATTERN: Regex = Regex::new(r"(?i)(\d+)\s*mbps").unwrap();
    static ref GBITS_PATTERN: Regex = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*gbps").unwrap();
}

/// Everything the categorizer infers from an intent's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub category: IntentCategory,
    pub layer: IntentLayer,
    pub latency_ms: u32,
    pub throughput_mbps: u32,
    pub service_type: String,
    pub intent_name: String,
    pub priority: u8,
    pub reliability: String,
}

/// Analyze an intent's text.
pub fn analyze(text: &str) -> IntentAnalysis {
    let category = categorize(text);
    let profile = category.profile();

    IntentAnalysis {
        category,
        layer: profile.layer,
        latency_ms: extract_latency(text).unwrap_or_else(|| profile.latency_midpoint()),
        throughput_mbps: extract_throughput(text).unwrap_or_else(|| profile.throughput_midpoint()),
        service_type: service_type(text).to_string(),
        intent_name: intent_name(text),
        priority: profile.priority,
        reliability: profile.reliability.to_string(),
    }
}

/// Pick the category with the most distinct keyword hits.
pub fn categorize(text: &str) -> IntentCategory {
    let mut best = IntentCategory::MobileBroadband;
    let mut best_hits = 0;

    for (profile, matchers) in CATEGORY_TABLE.iter().zip(CATEGORY_MATCHERS.iter()) {
        let hits = matchers.iter().filter(|m| m.is_match(text)).count();
        // Strictly greater keeps the earlier entry on ties
        if hits > best_hits {
            best_hits = hits;
            best = profile.category;
        }
    }

    best
}

/// Explicit latency bound in milliseconds, if the text states one.
pub fn extract_latency(text: &str) -> Option<u32> {
    LATENCY_PATTERNS
        .iter()
        .find_map(|p| p.captures(text))
        .and_then(|c| c[1].parse().ok())
}

/// Explicit throughput in MB/s, if the text states one. Gbps is converted
/// at 125 MB/s per Gbps.
pub fn extract_throughput(text: &str) -> Option<u32> {
    if let Some(c) = MBYTES_PATTERN.captures(text) {
        return c[1].parse().ok();
    }
    if let Some(c) = MBITS_PATTERN.captures(text) {
        return c[1].parse().ok();
    }
    GBITS_PATTERN
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|gbps| (gbps * 125.0) as u32)
}

pub fn service_type(text: &str) -> &'static str {
    SERVICE_MATCHERS
        .iter()
        .find(|(_, matchers)| matchers.iter().any(|m| m.is_match(text)))
        .map(|(name, _)| *name)
        .unwrap_or(DEFAULT_SERVICE_TYPE)
}

/// `Intent_` followed by the capitalised words longer than three characters
/// among the first five. Punctuation is dropped so the name is usable as a
/// Turtle local name.
pub fn intent_name(text: &str) -> String {
    let parts: Vec<String> = text
        .split_whitespace()
        .take(5)
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect::<String>()
        })
        .filter(|word| word.chars().count() > 3)
        .map(|word| capitalize(&word))
        .collect();

    if parts.is_empty() {
        "Intent_Generic".to_string()
    } else {
        format!("Intent_{}", parts.join("_"))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_table_order_matches_enum() {
        for (index, category) in IntentCategory::ALL.iter().enumerate() {
            assert_eq!(CATEGORY_TABLE[index].category, *category);
            assert_eq!(category.profile().category, *category);
        }
    }

    #[test]
    fn test_surgery_is_ultra_low_latency() {
        let analysis = analyze(
            "Create a high-speed network slice for a hospital remote surgery robot requiring ultra-low latency.",
        );
        assert_eq!(analysis.category, IntentCategory::UltraLowLatency);
        assert_eq!(analysis.latency_ms, 5);
        assert_eq!(analysis.service_type, "NetworkSlice");
        assert_eq!(analysis.intent_name, "Intent_Create_High-speed_Network_Slice");
        assert_eq!(analysis.priority, 1);
    }

    #[test]
    fn test_inflected_keywords_match() {
        let analysis =
            analyze("Deploy a massive IoT network for agricultural sensors with low bandwidth requirements.");
        assert_eq!(analysis.category, IntentCategory::IotMassive);
        assert_eq!(analysis.throughput_mbps, 5);
    }

    #[test]
    fn test_explicit_latency() {
        let analysis = analyze("Create a gaming slice with guaranteed ping below 20ms for e-sports tournament.");
        assert_eq!(analysis.category, IntentCategory::LowLatency);
        assert_eq!(analysis.latency_ms, 20);
    }

    #[test]
    fn test_short_keywords_need_word_boundaries() {
        // "ar" must not match inside "for" or "guaranteed"
        assert_eq!(categorize("Guaranteed bandwidth for the park"), IntentCategory::MobileBroadband);
        assert_eq!(categorize("An AR experience"), IntentCategory::LowLatency);
    }

    #[test]
    fn test_tie_goes_to_earlier_entry() {
        // one hit each for ultra_low_latency (emergency) and service_delivery (create)
        assert_eq!(
            categorize("Create a network slice for emergency services"),
            IntentCategory::UltraLowLatency
        );
    }

    #[test]
    fn test_no_hits_defaults_to_mobile_broadband() {
        assert_eq!(categorize("Make things better"), IntentCategory::MobileBroadband);
    }

    #[test]
    fn test_throughput_units() {
        assert_eq!(extract_throughput("needs 100 MB/s"), Some(100));
        assert_eq!(extract_throughput("at least 200 Mbps"), Some(200));
        assert_eq!(extract_throughput("a 2.5 Gbps uplink"), Some(312));
        assert_eq!(extract_throughput("fast"), None);
    }

    #[test]
    fn test_latency_patterns() {
        assert_eq!(extract_latency("under 10 ms please"), Some(10));
        assert_eq!(extract_latency("latency 5ms"), Some(5));
        assert_eq!(extract_latency("< 3ms"), Some(3));
        assert_eq!(extract_latency("quick"), None);
    }

    #[test]
    fn test_service_type_order() {
        assert_eq!(service_type("Setup VPN for remote offices"), "VPNService");
        assert_eq!(service_type("Stream video to fans"), "BroadcastService");
        assert_eq!(service_type("nothing specific"), DEFAULT_SERVICE_TYPE);
    }

    #[test]
    fn test_intent_name_strips_punctuation() {
        assert_eq!(intent_name("Provision edge, compute. now"), "Intent_Provision_Edge_Compute");
        assert_eq!(intent_name("a b c"), "Intent_Generic");
    }

    proptest! {
        #[test]
        fn prop_analysis_is_deterministic(text in ".{0,120}") {
            let first = analyze(&text);
            prop_assert_eq!(&first, &analyze(&text));
            let profile = first.category.profile();
            prop_assert_eq!(first.layer, profile.layer);
            prop_assert!(first.intent_name.starts_with("Intent_"));
        }
    }
}
