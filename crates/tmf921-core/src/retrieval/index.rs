//! In-memory example index.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::rank::{self, DEFAULT_KEYWORD_WEIGHT, DEFAULT_MMR_LAMBDA, NEAR_DUPLICATE_THRESHOLD};
use super::{RetrievalError, RetrievalProvider, RetrievalStrategy, RetrievedExample};

/// Minimum candidate pool for MMR.
const MMR_MIN_FETCH: usize = 20;

/// Turns text into a fixed-size vector.
pub trait Embedder: Send + Sync {
    /// Returns an L2-normalised vector (or all zeros for empty text).
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Hashed bag-of-words embedding.
///
/// Lowercased alphanumeric tokens are hashed (FNV-1a) into `dims` buckets and
/// the counts L2-normalised. All components are non-negative, so cosine
/// similarity between two embeddings lies in [0, 1].
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMS: usize = 512;

    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMS)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(token.to_lowercase().as_bytes()) % self.dims as u64) as usize;
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two normalised vectors, clamped to [0, 1].
pub fn cosine_sim(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    f64::from(dot).clamp(0.0, 1.0)
}

#[derive(Debug, Deserialize)]
struct ExampleRecord {
    #[serde(alias = "text")]
    user_intent: String,
    #[serde(alias = "reference_document")]
    tmf921_intent: JsonValue,
}

#[derive(Debug, Clone)]
struct IndexedExample {
    text: String,
    document: JsonValue,
    embedding: Vec<f32>,
}

/// Read-only example index. Queries never mutate it.
pub struct ExampleIndex {
    entries: Vec<IndexedExample>,
    embedder: Box<dyn Embedder>,
}

impl std::fmt::Debug for ExampleIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExampleIndex")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ExampleIndex {
    /// Build from `(text, reference document)` pairs using the given embedder.
    pub fn with_embedder(
        examples: impl IntoIterator<Item = (String, JsonValue)>,
        embedder: Box<dyn Embedder>,
    ) -> Self {
        let entries = examples
            .into_iter()
            .map(|(text, document)| IndexedExample {
                embedding: embedder.embed(&text),
                text,
                document,
            })
            .collect();
        Self { entries, embedder }
    }

    /// Build with the default hashing embedder.
    pub fn from_examples(examples: impl IntoIterator<Item = (String, JsonValue)>) -> Self {
        Self::with_embedder(examples, Box::new(HashingEmbedder::default()))
    }

    /// Parse a JSON array of `{user_intent, tmf921_intent}` records.
    pub fn from_json(json: &str) -> Result<Self, RetrievalError> {
        let records: Vec<ExampleRecord> = serde_json::from_str(json)?;
        Ok(Self::from_examples(
            records.into_iter().map(|r| (r.user_intent, r.tmf921_intent)),
        ))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn scored(&self, query: &[f32], indices: &[usize]) -> Vec<RetrievedExample> {
        indices
            .iter()
            .map(|&i| {
                let entry = &self.entries[i];
                RetrievedExample {
                    text: entry.text.clone(),
                    reference_document: entry.document.clone(),
                    similarity_score: cosine_sim(query, &entry.embedding),
                }
            })
            .collect()
    }
}

impl RetrievalProvider for ExampleIndex {
    fn retrieve(
        &self,
        query: &str,
        k: usize,
        strategy: RetrievalStrategy,
    ) -> Result<Vec<RetrievedExample>, RetrievalError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed(query);
        let scores: Vec<f64> = self
            .entries
            .iter()
            .map(|e| cosine_sim(&query_vec, &e.embedding))
            .collect();

        let result = match strategy {
            RetrievalStrategy::TopK => self.scored(&query_vec, &rank::top_k_indices(&scores, k)),
            RetrievalStrategy::MaxMarginalRelevance => {
                let pool = rank::top_k_indices(&scores, (4 * k).max(MMR_MIN_FETCH));
                let relevance: Vec<f64> = pool.iter().map(|&i| scores[i]).collect();
                let picked = rank::mmr_indices(
                    &relevance,
                    |a, b| cosine_sim(&self.entries[pool[a]].embedding, &self.entries[pool[b]].embedding),
                    k,
                    DEFAULT_MMR_LAMBDA,
                    NEAR_DUPLICATE_THRESHOLD,
                );
                let chosen: Vec<usize> = picked.into_iter().map(|p| pool[p]).collect();
                self.scored(&query_vec, &chosen)
            }
            RetrievalStrategy::Hybrid => {
                let pool = rank::top_k_indices(&scores, 2 * k);
                rank::hybrid(self.scored(&query_vec, &pool), query, k, DEFAULT_KEYWORD_WEIGHT)
            }
        };

        tracing::debug!(
            strategy = %strategy,
            k,
            returned = result.len(),
            "retrieved reference examples"
        );
        Ok(result)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index() -> ExampleIndex {
        ExampleIndex::from_examples(vec![
            ("Create a gaming slice with low latency".to_string(), json!({"n": 1})),
            ("Create a gaming slice with low latency".to_string(), json!({"n": 2})),
            ("Deploy IoT sensors for agriculture".to_string(), json!({"n": 3})),
            ("Stream 4K video for a stadium concert".to_string(), json!({"n": 4})),
        ])
    }

    #[test]
    fn test_zero_k_returns_empty() {
        for strategy in [
            RetrievalStrategy::TopK,
            RetrievalStrategy::MaxMarginalRelevance,
            RetrievalStrategy::Hybrid,
        ] {
            assert!(index().retrieve("gaming", 0, strategy).unwrap().is_empty());
        }
    }

    #[test]
    fn test_empty_index_returns_empty() {
        let empty = ExampleIndex::from_examples(Vec::new());
        assert!(empty.is_empty());
        assert!(empty.retrieve("gaming", 3, RetrievalStrategy::TopK).unwrap().is_empty());
    }

    #[test]
    fn test_top_k_orders_by_similarity() {
        let result = index().retrieve("gaming slice", 2, RetrievalStrategy::TopK).unwrap();
        assert_eq!(result.len(), 2);
        // Identical texts tie; insertion order decides
        assert_eq!(result[0].reference_document["n"], 1);
        assert_eq!(result[1].reference_document["n"], 2);
        assert!(result.iter().all(|r| (0.0..=1.0).contains(&r.similarity_score)));
    }

    #[test]
    fn test_mmr_avoids_duplicate() {
        let result = index()
            .retrieve("gaming slice", 2, RetrievalStrategy::MaxMarginalRelevance)
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].reference_document["n"], 1);
        assert_ne!(result[1].reference_document["n"], 2);
    }

    #[test]
    fn test_hybrid_respects_k() {
        let result = index().retrieve("stadium video", 1, RetrievalStrategy::Hybrid).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].reference_document["n"], 4);
    }

    #[test]
    fn test_from_json_records() {
        let index = ExampleIndex::from_json(
            r#"[{"user_intent": "a slice", "tmf921_intent": {"name": "X"}}]"#,
        )
        .unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_embedding_is_normalized() {
        let v = HashingEmbedder::default().embed("one two three two");
        let norm: f32 = v.iter().map(|x| x * x).sum();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(HashingEmbedder::default().embed("").iter().all(|x| *x == 0.0));
    }
}
