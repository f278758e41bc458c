//! Three-level validation of generated TMF921 intent documents.
//!
//! Levels run in a fixed order and never short-circuit, so a single call
//! reports everything that is wrong with a document:
//!
//! 1. **Structural**: the JSON envelope matches the embedded JSON Schema.
//! 2. **Expression syntax**: `expression.expressionValue` parses as Turtle
//!    and yields at least one triple.
//! 3. **Domain semantics**: cross-references inside the expression and
//!    cross-field consistency of the envelope.
//!
//! The validator is pure. It holds no state and performs no I/O, so
//! validating the same document twice yields identical results.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tmf921_core::validator::IntentValidator;
//!
//! let result = IntentValidator::new().validate(&document);
//! if !result.is_valid() {
//!     for failure in &result.failures {
//!         eprintln!("{}", failure);
//!     }
//! }
//! ```

mod semantics;
mod structural;
mod syntax;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub use structural::SchemaError;

/// The validation level a finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Structural,
    ExpressionSyntax,
    DomainSemantics,
}

impl ValidationLevel {
    pub const ALL: [ValidationLevel; 3] = [
        ValidationLevel::Structural,
        ValidationLevel::ExpressionSyntax,
        ValidationLevel::DomainSemantics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Structural => "structural",
            ValidationLevel::ExpressionSyntax => "expression_syntax",
            ValidationLevel::DomainSemantics => "domain_semantics",
        }
    }
}

impl std::fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding at a given level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub level: ValidationLevel,
    pub message: String,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationVerdict {
    Valid,
    Invalid,
}

/// Verdict plus ordered diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationVerdict,

    /// Failures in level order; `status` is valid iff this is empty
    pub failures: Vec<ValidationFailure>,

    /// Observations that never affect `status`
    #[serde(default)]
    pub warnings: Vec<ValidationFailure>,

    /// Number of triples in the expression, when it parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triple_count: Option<usize>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.status == ValidationVerdict::Valid
    }

    pub fn failures_at(&self, level: ValidationLevel) -> impl Iterator<Item = &ValidationFailure> {
        self.failures.iter().filter(move |f| f.level == level)
    }

    pub fn passed_level(&self, level: ValidationLevel) -> bool {
        self.failures_at(level).next().is_none()
    }

    /// Failures rendered as `[level] message` strings.
    pub fn diagnostics(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }
}

/// Collects findings for one level.
pub(crate) struct Findings<'a> {
    level: ValidationLevel,
    failures: &'a mut Vec<ValidationFailure>,
    warnings: &'a mut Vec<ValidationFailure>,
}

impl Findings<'_> {
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.failures.push(ValidationFailure {
            level: self.level,
            message: message.into(),
        });
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(ValidationFailure {
            level: self.level,
            message: message.into(),
        });
    }
}

/// Validator for TMF921 intent documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentValidator;

impl IntentValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run all three levels against a document.
    pub fn validate(&self, document: &JsonValue) -> ValidationResult {
        let mut failures = Vec::new();
        let mut warnings = Vec::new();

        structural::check(document, &mut Findings {
            level: ValidationLevel::Structural,
            failures: &mut failures,
            warnings: &mut warnings,
        });

        let graph = syntax::check(document, &mut Findings {
            level: ValidationLevel::ExpressionSyntax,
            failures: &mut failures,
            warnings: &mut warnings,
        });

        semantics::check(document, graph.as_ref(), &mut Findings {
            level: ValidationLevel::DomainSemantics,
            failures: &mut failures,
            warnings: &mut warnings,
        });

        let status = if failures.is_empty() {
            ValidationVerdict::Valid
        } else {
            ValidationVerdict::Invalid
        };

        ValidationResult {
            status,
            failures,
            warnings,
            triple_count: graph.map(|g| g.len()),
        }
    }
}

/// Validate a document with the default validator.
pub fn validate(document: &JsonValue) -> ValidationResult {
    IntentValidator::new().validate(document)
}
