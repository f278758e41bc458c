//! LLM provider abstractions for tmf921-runtime.
//!
//! This module defines the trait every backend implements and the error
//! taxonomy the Model Gateway uses to decide whether to retry.
//!
//! Backends:
//! - [`OpenAiCompatProvider`]: chat-completions APIs (Groq, Together,
//!   HuggingFace router), behind the `openai-compat` feature
//! - [`GeminiProvider`]: Google `generateContent`, behind the `gemini` feature
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
mod gemini;
mod openai_compat;
pub mod secrets;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use gemini::{GeminiProvider, GeminiProviderFactory};
pub use openai_compat::{OpenAiCompatFactory, OpenAiCompatProvider, OpenAiFlavor};
pub use secrets::{ApiCredential, CredentialSource};

/// Errors from LLM providers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Service unavailable: {status} - {message}")]
    Unavailable { status: u16, message: String },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Coarse classification of a [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    RateLimited,
    Timeout,
    Unavailable,
    Auth,
    InvalidRequest,
    Unknown,
}

impl ProviderErrorKind {
    /// Whether the gateway should retry this kind of failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::RateLimited | ProviderErrorKind::Timeout | ProviderErrorKind::Unavailable
        )
    }
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::RateLimited { .. } => ProviderErrorKind::RateLimited,
            ProviderError::Timeout(_) => ProviderErrorKind::Timeout,
            ProviderError::HttpError(_) | ProviderError::Unavailable { .. } => {
                ProviderErrorKind::Unavailable
            }
            ProviderError::AuthError(_) => ProviderErrorKind::Auth,
            ProviderError::ApiError { .. } | ProviderError::NotConfigured(_) => {
                ProviderErrorKind::InvalidRequest
            }
            ProviderError::ParseError(_) => ProviderErrorKind::Unknown,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }

    /// Map a non-success HTTP status to an error.
    ///
    /// `request_timeout` is the per-attempt limit the request was sent with;
    /// a 408 reports it.
    pub fn from_status(
        status: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
        request_timeout: Duration,
    ) -> Self {
        let message = message.into();
        match status {
            429 => ProviderError::RateLimited { retry_after },
            408 => ProviderError::Timeout(request_timeout),
            401 | 403 => ProviderError::AuthError(message),
            500..=599 => ProviderError::Unavailable { status, message },
            _ => ProviderError::ApiError { status, message },
        }
    }
}

/// Parse a `retry-after` header value given in seconds.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// A client that cannot be built will not build on retry either.
#[cfg_attr(not(any(feature = "openai-compat", feature = "gemini")), allow(dead_code))]
pub(crate) fn client_error(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::NotConfigured(format!("HTTP client unavailable: {}", e))
}

/// Shared HTTP client for every backend.
#[cfg(any(feature = "openai-compat", feature = "gemini"))]
pub(crate) fn http_client() -> Result<&'static reqwest::Client, ProviderError> {
    static CLIENT: std::sync::OnceLock<reqwest::Client> = std::sync::OnceLock::new();
    if let Some(client) = CLIENT.get() {
        return Ok(client);
    }
    let client = reqwest::Client::builder().build().map_err(client_error)?;
    Ok(CLIENT.get_or_init(|| client))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Pull a human-readable message out of an error body.
///
/// Both backend families wrap errors as `{"error": {"message": ..}}`.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(300).collect())
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model override; providers fall back to their configured model
    pub model: Option<String>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,

    /// Ask for a JSON object response where the backend supports it
    pub json_mode: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 3000,
            temperature: 0.3,
            timeout: Duration::from_secs(60),
            json_mode: true,
        }
    }
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Response from an LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model used
    pub model: String,

    /// Stop reason
    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping LLM backends.
///
/// The Model Gateway is the only caller. Orchestration code never sees a
/// concrete backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if provider is usable.
    async fn health_check(&self) -> bool;

    /// Provider name for logs and usage accounting.
    fn name(&self) -> &str;

    /// Estimate tokens for a prompt.
    fn estimate_tokens(&self, text: &str) -> u32 {
        // ~4 chars per token
        (text.len() / 4) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_creation() {
        assert_eq!(ChatMessage::system("s").role, "system");
        assert_eq!(ChatMessage::user("u").role, "user");
        assert_eq!(ChatMessage::assistant("a").role, "assistant");
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_status_mapping() {
        let retry = Some(Duration::from_secs(7));
        let timeout = Duration::from_secs(60);
        assert_eq!(
            ProviderError::from_status(429, "slow down", retry, timeout),
            ProviderError::RateLimited { retry_after: retry }
        );
        assert_eq!(
            ProviderError::from_status(503, "down", None, timeout).kind(),
            ProviderErrorKind::Unavailable
        );
        assert_eq!(
            ProviderError::from_status(401, "bad key", None, timeout).kind(),
            ProviderErrorKind::Auth
        );
        assert_eq!(
            ProviderError::from_status(400, "bad request", None, timeout).kind(),
            ProviderErrorKind::InvalidRequest
        );
    }

    #[test]
    fn test_request_timeout_status_reports_limit() {
        let error = ProviderError::from_status(408, "", None, Duration::from_secs(60));
        assert_eq!(error, ProviderError::Timeout(Duration::from_secs(60)));
        assert!(error.is_transient());
        assert_eq!(error.to_string(), "Timeout after 60s");
    }

    #[test]
    fn test_client_build_failure_not_retried() {
        let error = client_error("no TLS backend");
        assert!(matches!(error, ProviderError::NotConfigured(_)));
        assert!(!error.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::RateLimited { retry_after: None }.is_transient());
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(ProviderError::HttpError("connection reset".into()).is_transient());
        assert!(!ProviderError::AuthError("nope".into()).is_transient());
        assert!(!ProviderError::ApiError { status: 422, message: "x".into() }.is_transient());
        assert!(!ProviderError::ParseError("garbled".into()).is_transient());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(Some("12")), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")), None);
        assert_eq!(parse_retry_after(None), None);
    }
}
