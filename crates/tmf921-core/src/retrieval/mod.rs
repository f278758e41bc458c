//! Retrieval of reference examples for few-shot prompting.
//!
//! The [`RetrievalProvider`] trait is the boundary the orchestrator consumes.
//! Ranking strategies live in [`rank`] as pure functions over scored
//! candidates; [`ExampleIndex`] is an in-memory, read-only provider.
//!
//! An empty result (`k == 0` or an empty index) is valid and means the
//! caller should prompt without examples.

pub mod index;
pub mod rank;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub use index::{Embedder, ExampleIndex, HashingEmbedder};

/// Errors when building or querying a retrieval index.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Failed to read examples: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse examples: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unknown retrieval strategy: {0}")]
    UnknownStrategy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Highest similarity first, ties in insertion order
    #[default]
    TopK,
    /// Relevance balanced against diversity among selected examples
    MaxMarginalRelevance,
    /// Semantic similarity blended with keyword overlap
    Hybrid,
}

impl RetrievalStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalStrategy::TopK => "top_k",
            RetrievalStrategy::MaxMarginalRelevance => "max_marginal_relevance",
            RetrievalStrategy::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalStrategy {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "top_k" | "topk" | "similarity" => Ok(RetrievalStrategy::TopK),
            "mmr" | "max_marginal_relevance" => Ok(RetrievalStrategy::MaxMarginalRelevance),
            "hybrid" => Ok(RetrievalStrategy::Hybrid),
            _ => Err(RetrievalError::UnknownStrategy(s.to_string())),
        }
    }
}

/// A reference example returned for one query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedExample {
    pub text: String,
    pub reference_document: JsonValue,
    /// Similarity to the query, in [0, 1]
    pub similarity_score: f64,
}

/// Source of reference examples.
///
/// Implementations are read-only during a run, so concurrent queries are safe.
pub trait RetrievalProvider: Send + Sync {
    /// Return at most `k` examples ordered by the strategy's ranking.
    fn retrieve(
        &self,
        query: &str,
        k: usize,
        strategy: RetrievalStrategy,
    ) -> Result<Vec<RetrievedExample>, RetrievalError>;

    /// Number of indexed examples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
