//! Model Gateway: one `generate` call over interchangeable LLM backends.
//!
//! The gateway owns request construction, the per-attempt timeout and the
//! retry policy. Transient failures (rate limits, timeouts, unavailability)
//! are retried with exponential backoff up to `retry.max_attempts`; anything
//! else fails on the first attempt.
//!
//! Backends are bound at construction. Callers pick a [`ProviderSlot`],
//! never a concrete backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::{RetryConfig, RunConfig};
use crate::providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderRegistry, TokenUsage,
};
use crate::usage::UsageTracker;

/// Which configured backend a call goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderSlot {
    #[default]
    Primary,
    Secondary,
}

/// Per-call overrides. Unset fields use the gateway defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub provider: ProviderSlot,
}

/// A successful generation.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    /// Requests sent, including the successful one
    pub attempts: u32,
    pub latency: Duration,
    pub provider: String,
    pub usage: TokenUsage,
}

pub struct ModelGateway {
    primary: Arc<dyn LlmProvider>,
    secondary: Option<Arc<dyn LlmProvider>>,
    retry: RetryConfig,
    defaults: CompletionConfig,
    usage: Arc<UsageTracker>,
}

impl std::fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGateway")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.as_ref().map(|p| p.name().to_string()))
            .field("retry", &self.retry)
            .finish()
    }
}

impl ModelGateway {
    pub fn new(primary: Arc<dyn LlmProvider>, retry: RetryConfig) -> Self {
        Self {
            primary,
            secondary: None,
            retry,
            defaults: CompletionConfig::default(),
            usage: Arc::new(UsageTracker::new()),
        }
    }

    /// Build the primary (and optional secondary) backend from run config.
    pub fn from_config(config: &RunConfig, registry: &ProviderRegistry) -> Result<Self, ProviderError> {
        let primary = registry.create(&config.provider, &config.provider_config(&config.provider))?;
        let secondary = config
            .secondary_provider
            .as_deref()
            .map(|name| registry.create(name, &config.provider_config(name)))
            .transpose()?;

        let mut gateway = Self::new(primary, config.retry.clone()).with_defaults(CompletionConfig {
            max_tokens: config.max_tokens,
            temperature: config.effective_temperature(),
            timeout: config.request_timeout,
            ..CompletionConfig::default()
        });
        gateway.secondary = secondary;
        Ok(gateway)
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn LlmProvider>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn with_defaults(mut self, defaults: CompletionConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_usage(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    pub fn provider_name(&self, slot: ProviderSlot) -> Option<&str> {
        self.slot(slot).map(|p| p.name())
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    fn slot(&self, slot: ProviderSlot) -> Option<&Arc<dyn LlmProvider>> {
        match slot {
            ProviderSlot::Primary => Some(&self.primary),
            ProviderSlot::Secondary => self.secondary.as_ref(),
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.retry.min_delay)
            .with_max_delay(self.retry.max_delay)
            .with_factor(self.retry.factor)
            .with_max_times(self.retry.max_attempts.saturating_sub(1) as usize)
    }

    /// Send one system + user prompt pair and return the model text.
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, ProviderError> {
        let provider = self.slot(options.provider).ok_or_else(|| {
            ProviderError::NotConfigured(format!("no backend bound to {:?} slot", options.provider))
        })?;
        let name = provider.name().to_string();

        let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)];
        let config = CompletionConfig {
            temperature: options.temperature.unwrap_or(self.defaults.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.defaults.max_tokens),
            ..self.defaults.clone()
        };

        let attempt_count = AtomicU32::new(0);
        // Extra wait requested by a retry-after header beyond the backoff delay
        let pending_wait: Mutex<Option<Duration>> = Mutex::new(None);
        let started = Instant::now();

        let (attempts, pending, name_ref) = (&attempt_count, &pending_wait, &name);
        let (messages, config, usage) = (&messages, &config, &self.usage);
        let attempt = move || async move {
            // Release the lock before sleeping
            let wait = pending.lock().take();
            if let Some(wait) = wait {
                tokio::time::sleep(wait).await;
            }
            attempts.fetch_add(1, Ordering::SeqCst);
            usage.record_attempt(name_ref);
            call_once(provider.as_ref(), messages.clone(), config).await
        };

        let result = attempt
            .retry(self.backoff())
            .sleep(tokio::time::sleep)
            .when(|e: &ProviderError| e.is_transient())
            .notify(|e: &ProviderError, delay: Duration| {
                if let ProviderError::RateLimited {
                    retry_after: Some(retry_after),
                } = e
                {
                    let wanted = (*retry_after).min(self.retry.max_delay);
                    *pending.lock() = wanted.checked_sub(delay).filter(|d| !d.is_zero());
                }
                tracing::warn!(
                    provider = %name,
                    attempt = attempts.load(Ordering::SeqCst),
                    error = %e,
                    backoff_ms = delay.as_millis() as u64,
                    "transient provider failure, retrying"
                );
            })
            .await;

        let attempts = attempt_count.load(Ordering::SeqCst);
        let latency = started.elapsed();

        match result {
            Ok(response) => {
                self.usage.record_usage(&name, &response.usage);
                tracing::info!(
                    provider = %name,
                    attempts,
                    latency_ms = latency.as_millis() as u64,
                    tokens = response.usage.total(),
                    "completion succeeded"
                );
                Ok(Generation {
                    text: response.content,
                    attempts,
                    latency,
                    provider: name,
                    usage: response.usage,
                })
            }
            Err(e) => {
                tracing::warn!(
                    provider = %name,
                    attempts,
                    latency_ms = latency.as_millis() as u64,
                    kind = ?e.kind(),
                    error = %e,
                    "completion failed"
                );
                Err(e)
            }
        }
    }
}

async fn call_once(
    provider: &dyn LlmProvider,
    messages: Vec<ChatMessage>,
    config: &CompletionConfig,
) -> Result<CompletionResponse, ProviderError> {
    match tokio::time::timeout(config.timeout, provider.complete(messages, config)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(config.timeout)),
    }
}
