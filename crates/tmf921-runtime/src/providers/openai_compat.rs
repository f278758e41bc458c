//! OpenAI-compatible chat completions provider.
//!
//! Groq, Together and the HuggingFace router all speak the
//! `/chat/completions` dialect, so one implementation covers them. An
//! [`OpenAiFlavor`] supplies the per-service defaults.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    error_message, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// A service exposing the OpenAI chat completions API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenAiFlavor {
    Groq,
    Together,
    HuggingFace,
}

impl OpenAiFlavor {
    pub const ALL: [OpenAiFlavor; 3] = [
        OpenAiFlavor::Groq,
        OpenAiFlavor::Together,
        OpenAiFlavor::HuggingFace,
    ];

    /// Registry key.
    pub fn provider_type(&self) -> &'static str {
        match self {
            OpenAiFlavor::Groq => "groq",
            OpenAiFlavor::Together => "together",
            OpenAiFlavor::HuggingFace => "huggingface",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            OpenAiFlavor::Groq => "https://api.groq.com/openai/v1",
            OpenAiFlavor::Together => "https://api.together.xyz/v1",
            OpenAiFlavor::HuggingFace => "https://router.huggingface.co/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            OpenAiFlavor::Groq => "llama-3.3-70b-versatile",
            OpenAiFlavor::Together => "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo",
            OpenAiFlavor::HuggingFace => "Qwen/Qwen2.5-72B-Instruct:fastest",
        }
    }

    /// Environment variables checked for the API key, in order.
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            OpenAiFlavor::Groq => &["GROQ_API_KEY"],
            OpenAiFlavor::Together => &["TOGETHER_API_KEY"],
            OpenAiFlavor::HuggingFace => &["HUGGINGFACE_API_KEY", "HF_TOKEN"],
        }
    }

    /// Whether the service accepts `response_format: json_object`.
    pub fn supports_json_mode(&self) -> bool {
        matches!(self, OpenAiFlavor::Groq | OpenAiFlavor::Together)
    }

    fn credential_name(&self) -> &'static str {
        match self {
            OpenAiFlavor::Groq => "Groq API key",
            OpenAiFlavor::Together => "Together API key",
            OpenAiFlavor::HuggingFace => "HuggingFace API key",
        }
    }
}

/// Provider for one [`OpenAiFlavor`].
pub struct OpenAiCompatProvider {
    flavor: OpenAiFlavor,
    credential: ApiCredential,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("flavor", &self.flavor)
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiCompatProvider {
    pub fn new(flavor: OpenAiFlavor, api_key: impl Into<String>) -> Self {
        Self {
            flavor,
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                flavor.credential_name(),
            ),
            base_url: flavor.base_url().to_string(),
            model: flavor.default_model().to_string(),
        }
    }

    pub fn from_env(flavor: OpenAiFlavor) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(flavor.env_vars(), flavor.credential_name())?;
        Ok(Self {
            flavor,
            credential,
            base_url: flavor.base_url().to_string(),
            model: flavor.default_model().to_string(),
        })
    }

    /// Create from JSON configuration (`api_key`, `base_url`, `model`),
    /// falling back to the flavor's environment variables for the key.
    pub fn from_config(flavor: OpenAiFlavor, config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            flavor.env_vars(),
            flavor.credential_name(),
        )?;

        Ok(Self {
            flavor,
            credential,
            base_url: config["base_url"]
                .as_str()
                .unwrap_or(flavor.base_url())
                .trim_end_matches('/')
                .to_string(),
            model: config["model"]
                .as_str()
                .unwrap_or(flavor.default_model())
                .to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn flavor(&self) -> OpenAiFlavor {
        self.flavor
    }

    fn request_body(&self, messages: Vec<ChatMessage>, config: &CompletionConfig) -> ChatRequest {
        ChatRequest {
            model: config.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            response_format: (config.json_mode && self.flavor.supports_json_mode()).then(|| {
                ResponseFormat {
                    type_: "json_object".to_string(),
                }
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    type_: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

fn into_completion(body: ChatResponse, fallback_model: &str) -> Result<CompletionResponse, ProviderError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ParseError("response contained no choices".to_string()))?;
    let usage = body.usage.map_or_else(Default::default, |u| super::TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
    });

    Ok(CompletionResponse {
        content: choice.message.content.unwrap_or_default(),
        usage,
        model: body.model.unwrap_or_else(|| fallback_model.to_string()),
        stop_reason: choice.finish_reason,
    })
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    #[cfg(feature = "openai-compat")]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = self.request_body(messages, config);

        // Only expose the credential here, at the point of use
        let response = super::http_client()?
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = super::parse_retry_after(
                response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok()),
            );
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                status.as_u16(),
                error_message(&body),
                retry_after,
                config.timeout,
            ));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        into_completion(body, &request.model)
    }

    #[cfg(not(feature = "openai-compat"))]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let _ = self.request_body(messages, config);
        Err(ProviderError::NotConfigured(format!(
            "{} provider requires 'openai-compat' feature",
            self.flavor.provider_type()
        )))
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        self.flavor.provider_type()
    }
}

/// Factory for one OpenAI-compatible flavor.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "gsk_...",               // Optional, falls back to the flavor's env vars
///   "base_url": "https://...",          // Optional, custom endpoint
///   "model": "llama-3.3-70b-versatile"  // Optional
/// }
/// ```
pub struct OpenAiCompatFactory {
    flavor: OpenAiFlavor,
}

impl OpenAiCompatFactory {
    pub fn new(flavor: OpenAiFlavor) -> Self {
        Self { flavor }
    }
}

impl ProviderFactory for OpenAiCompatFactory {
    fn provider_type(&self) -> &'static str {
        self.flavor.provider_type()
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(OpenAiCompatProvider::from_config(self.flavor, config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", self.flavor.env_vars()) {
            return Err(ProviderError::NotConfigured(format!(
                "{} required: set 'api_key' in config or {} env",
                self.flavor.credential_name(),
                self.flavor.env_vars().join(" or ")
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "base_url": self.flavor.base_url(),
            "model": self.flavor.default_model(),
        })
    }

    fn description(&self) -> &'static str {
        match self.flavor {
            OpenAiFlavor::Groq => "Groq chat completions (OpenAI-compatible)",
            OpenAiFlavor::Together => "Together AI chat completions (OpenAI-compatible)",
            OpenAiFlavor::HuggingFace => "HuggingFace router chat completions (OpenAI-compatible)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flavor_names() {
        assert_eq!(OpenAiCompatProvider::new(OpenAiFlavor::Groq, "k").name(), "groq");
        assert_eq!(
            OpenAiCompatProvider::new(OpenAiFlavor::HuggingFace, "k").name(),
            "huggingface"
        );
    }

    #[test]
    fn test_from_config_overrides() {
        let config = serde_json::json!({
            "api_key": "config-key",
            "base_url": "https://proxy.example.com/v1/",
            "model": "custom-model"
        });
        let provider = OpenAiCompatProvider::from_config(OpenAiFlavor::Together, &config).unwrap();
        assert_eq!(provider.base_url, "https://proxy.example.com/v1");
        assert_eq!(provider.model, "custom-model");
        assert_eq!(provider.credential.source(), CredentialSource::Config);
    }

    #[test]
    fn test_json_mode_only_where_supported() {
        let config = CompletionConfig::default();
        let groq = OpenAiCompatProvider::new(OpenAiFlavor::Groq, "k");
        assert!(groq
            .request_body(vec![ChatMessage::user("hi")], &config)
            .response_format
            .is_some());

        let hf = OpenAiCompatProvider::new(OpenAiFlavor::HuggingFace, "k");
        assert!(hf
            .request_body(vec![ChatMessage::user("hi")], &config)
            .response_format
            .is_none());
    }

    #[test]
    fn test_request_serialization() {
        let provider = OpenAiCompatProvider::new(OpenAiFlavor::Groq, "k");
        let config = CompletionConfig {
            temperature: 0.2,
            max_tokens: 100,
            ..Default::default()
        };
        let body = serde_json::to_value(
            provider.request_body(vec![ChatMessage::system("s"), ChatMessage::user("u")], &config),
        )
        .unwrap();
        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_response_decoding() {
        let body: ChatResponse = serde_json::from_str(
            r#"{
                "model": "llama-3.3-70b-versatile",
                "choices": [{"message": {"role": "assistant", "content": "{}"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            }"#,
        )
        .unwrap();
        let completion = into_completion(body, "unused").unwrap();
        assert_eq!(completion.content, "{}");
        assert_eq!(completion.usage.total(), 15);
        assert_eq!(completion.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_empty_choices_is_parse_error() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            into_completion(body, "m"),
            Err(ProviderError::ParseError(_))
        ));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error": {"message": "Invalid API Key", "type": "invalid_request_error"}}"#),
            "Invalid API Key"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_factory_validate_invalid_base_url() {
        let factory = OpenAiCompatFactory::new(OpenAiFlavor::Groq);
        let config = serde_json::json!({"api_key": "k", "base_url": "ftp://nope"});
        assert!(factory.validate_config(&config).is_err());
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "gsk_super_secret_key_12345";
        let provider = OpenAiCompatProvider::new(OpenAiFlavor::Groq, secret_key);
        let debug_output = format!("{:?}", provider);
        assert!(!debug_output.contains(secret_key));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_health_check_requires_key() {
        assert!(OpenAiCompatProvider::new(OpenAiFlavor::Groq, "k").health_check().await);
        assert!(!OpenAiCompatProvider::new(OpenAiFlavor::Groq, "").health_check().await);
    }
}
