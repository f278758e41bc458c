//! Ranking strategies as pure functions over scored candidates.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::RetrievedExample;

/// Default trade-off between relevance and diversity for MMR.
pub const DEFAULT_MMR_LAMBDA: f64 = 0.5;

/// Pairwise similarity at or above which two examples count as duplicates.
pub const NEAR_DUPLICATE_THRESHOLD: f64 = 0.95;

/// Weight of keyword overlap in hybrid scoring.
pub const DEFAULT_KEYWORD_WEIGHT: f64 = 0.3;

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Indices of the `k` highest scores. Equal scores keep insertion order.
pub fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // sort_by is stable
    order.sort_by(|&a, &b| descending(scores[a], scores[b]));
    order.truncate(k);
    order
}

/// Highest-scoring `k` examples, ties in insertion order.
pub fn top_k(candidates: Vec<RetrievedExample>, k: usize) -> Vec<RetrievedExample> {
    let scores: Vec<f64> = candidates.iter().map(|c| c.similarity_score).collect();
    select(candidates, &top_k_indices(&scores, k))
}

/// Maximal marginal relevance selection.
///
/// Greedily picks the candidate maximising
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`.
/// Candidates whose similarity to an already selected one reaches
/// `duplicate_threshold` are only considered once nothing else remains.
/// Returns indices into `relevance` in selection order.
pub fn mmr_indices(
    relevance: &[f64],
    similarity: impl Fn(usize, usize) -> f64,
    k: usize,
    lambda: f64,
    duplicate_threshold: f64,
) -> Vec<usize> {
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(relevance.len()));
    let mut remaining: Vec<usize> = (0..relevance.len()).collect();

    while selected.len() < k && !remaining.is_empty() {
        let mut best: Option<(usize, f64, bool)> = None;

        for (slot, &candidate) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| similarity(candidate, s))
                .fold(0.0_f64, f64::max);
            let duplicate = redundancy >= duplicate_threshold;
            let score = lambda * relevance[candidate] - (1.0 - lambda) * redundancy;

            let better = match best {
                None => true,
                // Non-duplicates always beat duplicates; strict > keeps the earlier on ties
                Some((_, best_score, best_duplicate)) => {
                    (best_duplicate && !duplicate) || (best_duplicate == duplicate && score > best_score)
                }
            };
            if better {
                best = Some((slot, score, duplicate));
            }
        }

        match best {
            Some((slot, _, _)) => selected.push(remaining.remove(slot)),
            None => break,
        }
    }

    selected
}

/// Fraction of distinct query terms present in the document text.
pub fn keyword_overlap(query: &str, text: &str) -> f64 {
    let query_terms = terms(query);
    if query_terms.is_empty() {
        return 0.0;
    }
    let text_terms = terms(text);
    let hits = query_terms.intersection(&text_terms).count();
    hits as f64 / query_terms.len() as f64
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Re-rank by `(1 - w) * semantic + w * keyword_overlap` and keep `k`.
///
/// The returned `similarity_score` is the blended score. Ties keep the
/// incoming order.
pub fn hybrid(
    candidates: Vec<RetrievedExample>,
    query: &str,
    k: usize,
    keyword_weight: f64,
) -> Vec<RetrievedExample> {
    let rescored: Vec<RetrievedExample> = candidates
        .into_iter()
        .map(|mut c| {
            let keyword = keyword_overlap(query, &c.text);
            c.similarity_score =
                ((1.0 - keyword_weight) * c.similarity_score + keyword_weight * keyword).clamp(0.0, 1.0);
            c
        })
        .collect();
    top_k(rescored, k)
}

/// Take the items at `indices`, in that order.
fn select(candidates: Vec<RetrievedExample>, indices: &[usize]) -> Vec<RetrievedExample> {
    let mut slots: Vec<Option<RetrievedExample>> = candidates.into_iter().map(Some).collect();
    indices
        .iter()
        .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn example(text: &str, score: f64) -> RetrievedExample {
        RetrievedExample {
            text: text.to_string(),
            reference_document: json!({}),
            similarity_score: score,
        }
    }

    #[test]
    fn test_top_k_is_stable_on_ties() {
        let candidates = vec![
            example("first", 0.9),
            example("second", 0.5),
            example("third", 0.9),
            example("fourth", 0.1),
        ];
        let result = top_k(candidates, 2);
        let texts: Vec<_> = result.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "third"]);
    }

    #[test]
    fn test_top_k_zero() {
        assert!(top_k(vec![example("a", 1.0)], 0).is_empty());
    }

    #[test]
    fn test_top_k_larger_than_input() {
        assert_eq!(top_k(vec![example("a", 0.2), example("b", 0.4)], 10).len(), 2);
    }

    #[test]
    fn test_mmr_skips_near_duplicates() {
        // 0 and 1 are near-identical; 2 is less relevant but different
        let relevance = [0.9, 0.89, 0.6];
        let sim = |a: usize, b: usize| {
            if a == b {
                1.0
            } else if (a, b) == (0, 1) || (a, b) == (1, 0) {
                0.99
            } else {
                0.1
            }
        };
        let picked = mmr_indices(&relevance, sim, 2, DEFAULT_MMR_LAMBDA, NEAR_DUPLICATE_THRESHOLD);
        assert_eq!(picked, vec![0, 2]);
    }

    #[test]
    fn test_mmr_falls_back_to_duplicates_when_nothing_else() {
        let relevance = [0.9, 0.8];
        let picked = mmr_indices(&relevance, |_, _| 0.99, 2, 0.5, 0.95);
        assert_eq!(picked, vec![0, 1]);
    }

    #[test]
    fn test_mmr_lambda_one_is_relevance_order() {
        let relevance = [0.2, 0.7, 0.5];
        let picked = mmr_indices(&relevance, |_, _| 0.5, 3, 1.0, 0.95);
        assert_eq!(picked, vec![1, 2, 0]);
    }

    #[test]
    fn test_keyword_overlap() {
        assert_eq!(keyword_overlap("gaming slice", "A slice for Gaming."), 1.0);
        assert_eq!(keyword_overlap("gaming slice", "IoT sensors"), 0.0);
        assert_eq!(keyword_overlap("", "anything"), 0.0);
    }

    #[test]
    fn test_hybrid_promotes_keyword_match() {
        let candidates = vec![example("video streaming", 0.80), example("gaming slice", 0.75)];
        let result = hybrid(candidates, "gaming slice", 2, DEFAULT_KEYWORD_WEIGHT);
        assert_eq!(result[0].text, "gaming slice");
        assert!(result[0].similarity_score <= 1.0);
    }

    proptest! {
        #[test]
        fn prop_length_bounded_by_k(scores in prop::collection::vec(0.0f64..=1.0, 0..30), k in 0usize..40) {
            let candidates: Vec<_> = scores.iter().map(|s| example("x", *s)).collect();
            let n = candidates.len();
            prop_assert_eq!(top_k(candidates.clone(), k).len(), k.min(n));
            prop_assert!(hybrid(candidates, "x", k, 0.3).len() <= k);
            let picked = mmr_indices(&scores, |_, _| 0.0, k, 0.5, 0.95);
            prop_assert_eq!(picked.len(), k.min(n));
        }
    }
}
