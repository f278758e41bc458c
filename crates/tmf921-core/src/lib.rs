//! # tmf921-core
//!
//! Deterministic building blocks for translating natural-language telecom
//! intents into TMF921 Intent documents.
//!
//! This crate never performs network I/O. It provides:
//! - The data model shared by the pipeline ([`InputIntent`], [`GeneratedIntent`])
//! - Extraction of JSON documents from raw model output
//! - A Turtle parser for the embedded intent expression
//! - The three-level [`IntentValidator`]
//! - Keyword categorization and deterministic fallback templates
//! - The retrieval boundary, ranking strategies and an in-memory example index
//!
//! ## Key Guarantees
//!
//! 1. **Pure validation**: same document, same [`ValidationResult`]
//! 2. **Complete diagnostics**: every validation level always runs
//! 3. **Deterministic fallback**: templates depend only on the intent text,
//!    its id and the supplied timestamp
//!
//! ## Example
//!
//! ```rust,ignore
//! use tmf921_core::{analyze, fallback_document, validate, InputIntent};
//!
//! let intent = InputIntent::new(1, "Create a network slice for emergency services");
//! let document = fallback_document(&intent, &analyze(&intent.text), chrono::Utc::now());
//! assert!(validate(&document).is_valid());
//! ```

pub mod category;
pub mod document;
pub mod retrieval;
pub mod templates;
pub mod turtle;
pub mod types;
pub mod validator;

pub use category::{analyze, IntentAnalysis, IntentCategory, IntentLayer};
pub use document::{parse_document, ParseError};
pub use retrieval::{
    ExampleIndex, RetrievalError, RetrievalProvider, RetrievalStrategy, RetrievedExample,
};
pub use templates::{fallback_document, reference_example, TEMPLATE_PROVIDER};
pub use turtle::TurtleError;
pub use types::{
    load_intents, parse_intents, GeneratedIntent, InputError, InputIntent, ValidationStatus,
};
pub use validator::{
    validate, IntentValidator, ValidationFailure, ValidationLevel, ValidationResult,
    ValidationVerdict,
};
