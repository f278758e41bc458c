//! Per-provider token and call accounting.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::providers::TokenUsage;

/// Accumulated LLM usage for one provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Prompt/input tokens
    pub prompt_tokens: u64,

    /// Completion/output tokens
    pub completion_tokens: u64,

    /// Successful completions
    pub calls: u32,

    /// Requests sent, including retried ones
    pub attempts: u32,
}

impl LlmUsage {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Add token usage from a successful response.
    pub fn add(&mut self, usage: &TokenUsage) {
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.calls += 1;
    }
}

/// Usage tracker shared by the gateway for the lifetime of a run.
#[derive(Debug, Default)]
pub struct UsageTracker {
    by_provider: RwLock<BTreeMap<String, LlmUsage>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request attempt, successful or not.
    pub fn record_attempt(&self, provider: &str) {
        self.by_provider
            .write()
            .entry(provider.to_string())
            .or_default()
            .attempts += 1;
    }

    /// Record the token usage of a successful completion.
    pub fn record_usage(&self, provider: &str, usage: &TokenUsage) {
        self.by_provider
            .write()
            .entry(provider.to_string())
            .or_default()
            .add(usage);
    }

    pub fn get(&self, provider: &str) -> LlmUsage {
        self.by_provider
            .read()
            .get(provider)
            .copied()
            .unwrap_or_default()
    }

    /// Snapshot of all providers, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, LlmUsage> {
        self.by_provider.read().clone()
    }

    pub fn reset(&self) {
        self.by_provider.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulates_per_provider() {
        let tracker = UsageTracker::new();
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 40,
        };

        tracker.record_attempt("groq");
        tracker.record_attempt("groq");
        tracker.record_usage("groq", &usage);
        tracker.record_attempt("gemini");

        let groq = tracker.get("groq");
        assert_eq!(groq.attempts, 2);
        assert_eq!(groq.calls, 1);
        assert_eq!(groq.total_tokens(), 140);

        let gemini = tracker.get("gemini");
        assert_eq!(gemini.attempts, 1);
        assert_eq!(gemini.calls, 0);

        assert_eq!(
            tracker.snapshot().keys().collect::<Vec<_>>(),
            vec!["gemini", "groq"]
        );
    }

    #[test]
    fn test_reset() {
        let tracker = UsageTracker::new();
        tracker.record_attempt("groq");
        tracker.reset();
        assert_eq!(tracker.get("groq"), LlmUsage::default());
    }
}
