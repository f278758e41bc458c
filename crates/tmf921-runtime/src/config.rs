//! Run configuration.
//!
//! Loaded from YAML, then overridden by CLI flags. Durations are written in
//! humantime form (`4s`, `1m 30s`).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use tmf921_core::RetrievalStrategy;

/// Providers known to [`crate::providers::ProviderRegistry::with_defaults`].
pub const KNOWN_PROVIDERS: [&str; 4] = ["gemini", "groq", "huggingface", "together"];

/// Startup configuration errors. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde adapter for humantime durations.
pub(crate) mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// Backoff policy for transient provider failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per backend, including the first
    pub max_attempts: u32,

    #[serde(with = "humantime_duration")]
    pub min_delay: Duration,

    #[serde(with = "humantime_duration")]
    pub max_delay: Duration,

    /// Backoff multiplier
    pub factor: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(60),
            factor: 2.0,
        }
    }
}

/// Options for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Primary backend name
    pub provider: String,

    /// Backend tried once the primary exhausts its retries
    pub secondary_provider: Option<String>,

    /// Per-backend JSON configuration (`api_key`, `model`, `base_url`)
    pub providers: BTreeMap<String, JsonValue>,

    /// Position of the first intent to process
    pub start_index: usize,

    /// Upper bound on intents processed in this run; unbounded if absent
    pub max_items: Option<usize>,

    pub checkpoint_interval: usize,

    pub use_rag: bool,

    pub retrieval_strategy: RetrievalStrategy,

    /// Examples requested from the retrieval provider
    pub k: usize,

    /// Retrieved examples rendered into the prompt
    pub prompt_examples: usize,

    /// Sampling temperature; defaults to 0.3, or 0.2 with RAG
    pub temperature: Option<f32>,

    pub max_tokens: u32,

    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    pub retry: RetryConfig,

    pub output_dir: PathBuf,

    /// Checkpoint file; defaults to `<output_dir>/checkpoint.json`
    pub checkpoint_path: Option<PathBuf>,

    /// Reference examples for the retrieval index
    pub examples_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            secondary_provider: None,
            providers: BTreeMap::new(),
            start_index: 0,
            max_items: None,
            checkpoint_interval: 50,
            use_rag: false,
            retrieval_strategy: RetrievalStrategy::default(),
            k: 5,
            prompt_examples: 3,
            temperature: None,
            max_tokens: 3000,
            request_timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
            output_dir: PathBuf::from("results"),
            checkpoint_path: None,
            examples_path: None,
        }
    }
}

impl RunConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn effective_temperature(&self) -> f32 {
        self.temperature
            .unwrap_or(if self.use_rag { 0.2 } else { 0.3 })
    }

    pub fn effective_checkpoint_path(&self) -> PathBuf {
        self.checkpoint_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join("checkpoint.json"))
    }

    /// JSON configuration handed to the provider factory.
    pub fn provider_config(&self, provider: &str) -> JsonValue {
        self.providers
            .get(provider)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}))
    }

    /// Reject invalid option combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        for name in std::iter::once(&self.provider).chain(self.secondary_provider.as_ref()) {
            if !KNOWN_PROVIDERS.contains(&name.as_str()) {
                return invalid(format!(
                    "unknown provider '{}', expected one of {:?}",
                    name, KNOWN_PROVIDERS
                ));
            }
        }
        if self.secondary_provider.as_deref() == Some(self.provider.as_str()) {
            return invalid("secondary_provider must differ from provider".to_string());
        }
        if self.checkpoint_interval == 0 {
            return invalid("checkpoint_interval must be greater than 0".to_string());
        }
        if self.use_rag && self.examples_path.is_none() {
            return invalid("use_rag requires examples_path".to_string());
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".to_string());
        }
        if self.retry.min_delay > self.retry.max_delay {
            return invalid(format!(
                "retry.min_delay ({}) exceeds retry.max_delay ({})",
                humantime::format_duration(self.retry.min_delay),
                humantime::format_duration(self.retry.max_delay)
            ));
        }
        if self.retry.factor < 1.0 {
            return invalid("retry.factor must be at least 1.0".to_string());
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return invalid(format!("temperature {} outside [0, 2]", t));
            }
        }
        if self.max_tokens == 0 {
            return invalid("max_tokens must be greater than 0".to_string());
        }
        Ok(())
    }
}
