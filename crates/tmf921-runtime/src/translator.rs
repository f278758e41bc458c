//! Translation orchestrator.
//!
//! One intent in, one [`GeneratedIntent`] out. The per-item pipeline is
//!
//! ```text
//! Pending -> Generating -> Validating -> {Valid, Fallback}
//! ```
//!
//! Provider errors, unparseable output and validation failures are all
//! absorbed here: the item resolves to a template-derived document marked
//! `fallback`, carrying the diagnostics that caused it. Nothing propagates
//! past this layer, so a batch never stops because of one item.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use tmf921_core::{
    analyze, fallback_document, parse_document, GeneratedIntent, IntentAnalysis, IntentValidator,
    InputIntent, RetrievalProvider, RetrievalStrategy, ValidationStatus, TEMPLATE_PROVIDER,
};

use crate::config::RunConfig;
use crate::gateway::{GenerateOptions, ModelGateway, ProviderSlot};
use crate::prompts::{baseline_prompt, rag_prompt, Prompt};

/// Errors when assembling a [`Translator`].
#[derive(Error, Debug)]
pub enum TranslatorError {
    #[error("Model gateway not configured")]
    NoGateway,

    #[error("RAG enabled but no retrieval provider set")]
    NoRetrieval,
}

/// Anything that turns an intent into a generated artifact.
///
/// The batch runner depends only on this trait.
#[async_trait]
pub trait TranslateIntent: Send + Sync {
    /// Never fails: every failure path resolves to a `fallback` artifact.
    async fn translate(&self, intent: &InputIntent) -> GeneratedIntent;
}

/// Phase of one item in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPhase {
    Pending,
    Generating,
    Validating,
    Valid,
    Fallback,
}

impl fmt::Display for ItemPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemPhase::Pending => "pending",
            ItemPhase::Generating => "generating",
            ItemPhase::Validating => "validating",
            ItemPhase::Valid => "valid",
            ItemPhase::Fallback => "fallback",
        })
    }
}

/// Per-run translation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOptions {
    pub use_rag: bool,
    pub retrieval_strategy: RetrievalStrategy,
    pub k: usize,
    pub prompt_examples: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            use_rag: false,
            retrieval_strategy: RetrievalStrategy::TopK,
            k: 5,
            prompt_examples: 3,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl TranslationOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            use_rag: config.use_rag,
            retrieval_strategy: config.retrieval_strategy,
            k: config.k,
            prompt_examples: config.prompt_examples,
            temperature: Some(config.effective_temperature()),
            max_tokens: Some(config.max_tokens),
        }
    }
}

pub struct Translator {
    gateway: Arc<ModelGateway>,
    retrieval: Option<Arc<dyn RetrievalProvider>>,
    validator: IntentValidator,
    options: TranslationOptions,
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("gateway", &self.gateway)
            .field("retrieval", &self.retrieval.as_ref().map(|r| r.len()))
            .field("options", &self.options)
            .finish()
    }
}

impl Translator {
    pub fn builder() -> TranslatorBuilder {
        TranslatorBuilder::new()
    }

    pub fn gateway(&self) -> &Arc<ModelGateway> {
        &self.gateway
    }

    pub fn options(&self) -> &TranslationOptions {
        &self.options
    }

    fn build_prompt(&self, intent: &InputIntent, analysis: &IntentAnalysis) -> Prompt {
        let retrieval = match (&self.retrieval, self.options.use_rag) {
            (Some(retrieval), true) => retrieval,
            _ => return baseline_prompt(intent, analysis, Utc::now()),
        };

        match retrieval.retrieve(&intent.text, self.options.k, self.options.retrieval_strategy) {
            Ok(examples) if !examples.is_empty() => {
                tracing::debug!(
                    intent_id = intent.id,
                    strategy = %self.options.retrieval_strategy,
                    scores = ?examples.iter().map(|e| e.similarity_score).collect::<Vec<_>>(),
                    "building RAG prompt"
                );
                rag_prompt(intent, analysis, &examples, self.options.prompt_examples)
            }
            Ok(_) => {
                tracing::debug!(intent_id = intent.id, "no examples retrieved, using baseline prompt");
                baseline_prompt(intent, analysis, Utc::now())
            }
            Err(e) => {
                tracing::warn!(intent_id = intent.id, error = %e, "retrieval failed, using baseline prompt");
                baseline_prompt(intent, analysis, Utc::now())
            }
        }
    }

    /// Primary backend, then the secondary once the primary gives up.
    async fn generate(&self, intent: &InputIntent, prompt: &Prompt) -> Result<(String, String), String> {
        let mut options = GenerateOptions {
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            provider: ProviderSlot::Primary,
        };

        let primary_error = match self.gateway.generate(prompt.system, &prompt.user, &options).await {
            Ok(generation) => return Ok((generation.text, generation.provider)),
            Err(e) => e,
        };

        if !self.gateway.has_secondary() {
            return Err(format!("generation failed: {}", primary_error));
        }

        tracing::warn!(
            intent_id = intent.id,
            error = %primary_error,
            "primary provider failed, trying secondary"
        );
        options.provider = ProviderSlot::Secondary;
        self.gateway
            .generate(prompt.system, &prompt.user, &options)
            .await
            .map(|generation| (generation.text, generation.provider))
            .map_err(|secondary_error| {
                format!(
                    "generation failed: primary: {}; secondary: {}",
                    primary_error, secondary_error
                )
            })
    }

    fn fallback(
        &self,
        intent: &InputIntent,
        analysis: &IntentAnalysis,
        mut diagnostics: Vec<String>,
    ) -> GeneratedIntent {
        let generated_at = Utc::now();
        let document = fallback_document(intent, analysis, generated_at);

        // Template output is expected to validate; report it if it does not
        let check = self.validator.validate(&document);
        let validation_status = if check.is_valid() {
            ValidationStatus::Fallback
        } else {
            diagnostics.extend(check.diagnostics().into_iter().map(|d| format!("template: {}", d)));
            ValidationStatus::Invalid
        };

        log_phase(intent, ItemPhase::Fallback);
        GeneratedIntent {
            source_id: intent.id,
            structured_document: document,
            validation_status,
            diagnostics,
            provider_used: TEMPLATE_PROVIDER.to_string(),
            generated_at,
        }
    }
}

fn log_phase(intent: &InputIntent, phase: ItemPhase) {
    tracing::debug!(intent_id = intent.id, phase = %phase, "item phase");
}

#[async_trait]
impl TranslateIntent for Translator {
    async fn translate(&self, intent: &InputIntent) -> GeneratedIntent {
        log_phase(intent, ItemPhase::Pending);
        let analysis = analyze(&intent.text);
        let prompt = self.build_prompt(intent, &analysis);

        log_phase(intent, ItemPhase::Generating);
        let (raw, provider) = match self.generate(intent, &prompt).await {
            Ok(generated) => generated,
            Err(diagnostic) => return self.fallback(intent, &analysis, vec![diagnostic]),
        };

        log_phase(intent, ItemPhase::Validating);
        let document = match parse_document(&raw) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(intent_id = intent.id, provider = %provider, error = %e, "unparseable model output");
                return self.fallback(intent, &analysis, vec![format!("unparseable model output: {}", e)]);
            }
        };

        let result = self.validator.validate(&document);
        if !result.is_valid() {
            tracing::info!(
                intent_id = intent.id,
                provider = %provider,
                failures = result.failures.len(),
                "model output failed validation"
            );
            return self.fallback(intent, &analysis, result.diagnostics());
        }

        log_phase(intent, ItemPhase::Valid);
        GeneratedIntent {
            source_id: intent.id,
            structured_document: document,
            validation_status: ValidationStatus::Valid,
            diagnostics: Vec::new(),
            provider_used: provider,
            generated_at: Utc::now(),
        }
    }
}

/// Builder for [`Translator`].
pub struct TranslatorBuilder {
    gateway: Option<Arc<ModelGateway>>,
    retrieval: Option<Arc<dyn RetrievalProvider>>,
    options: TranslationOptions,
}

impl TranslatorBuilder {
    pub fn new() -> Self {
        Self {
            gateway: None,
            retrieval: None,
            options: TranslationOptions::default(),
        }
    }

    pub fn gateway(mut self, gateway: Arc<ModelGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn retrieval(mut self, retrieval: Arc<dyn RetrievalProvider>) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    pub fn options(mut self, options: TranslationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<Translator, TranslatorError> {
        let gateway = self.gateway.ok_or(TranslatorError::NoGateway)?;
        if self.options.use_rag && self.retrieval.is_none() {
            return Err(TranslatorError::NoRetrieval);
        }

        Ok(Translator {
            gateway,
            retrieval: self.retrieval,
            validator: IntentValidator::new(),
            options: self.options,
        })
    }
}

impl Default for TranslatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::gateway::tests::ScriptedProvider;
    use crate::providers::{
        ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
    };
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use std::time::Duration;
    use tmf921_core::ExampleIndex;

    fn no_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 1,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            factor: 2.0,
        }
    }

    fn translator_with(provider: Arc<dyn LlmProvider>) -> Translator {
        Translator::builder()
            .gateway(Arc::new(ModelGateway::new(provider, no_retry())))
            .build()
            .unwrap()
    }

    fn valid_document_for(intent: &InputIntent) -> String {
        fallback_document(intent, &analyze(&intent.text), Utc::now()).to_string()
    }

    /// Records the user prompt of every call and answers with a fixed body.
    struct CapturingProvider {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for CapturingProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            if let Some(user) = messages.iter().find(|m| m.role == "user") {
                self.prompts.lock().push(user.content.clone());
            }
            Ok(CompletionResponse {
                content: self.reply.clone(),
                usage: TokenUsage::default(),
                model: "capture".to_string(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "capture"
        }
    }

    #[tokio::test]
    async fn test_emergency_intent_valid_output() {
        let intent = InputIntent::new(1, "Create a network slice for emergency services");
        let provider = Arc::new(ScriptedProvider::always(
            "mock",
            Ok(format!("```json\n{}\n```", valid_document_for(&intent))),
        ));

        let result = translator_with(provider).translate(&intent).await;

        assert_eq!(result.validation_status, ValidationStatus::Valid);
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.provider_used, "mock");
        assert_eq!(result.source_id, 1);
    }

    #[tokio::test]
    async fn test_provider_failure_resolves_to_fallback() {
        let intent = InputIntent::new(3, "Deploy IoT sensors for smart agriculture");
        let provider = Arc::new(ScriptedProvider::always(
            "mock",
            Err(ProviderError::AuthError("invalid key".into())),
        ));

        let result = translator_with(provider).translate(&intent).await;

        assert_eq!(result.validation_status, ValidationStatus::Fallback);
        assert_eq!(result.provider_used, TEMPLATE_PROVIDER);
        assert!(result.diagnostics[0].starts_with("generation failed"));
        assert!(tmf921_core::validate(&result.structured_document).is_valid());
    }

    #[tokio::test]
    async fn test_unparseable_output_resolves_to_fallback() {
        let intent = InputIntent::new(4, "Low latency gaming slice");
        let provider = Arc::new(ScriptedProvider::always(
            "mock",
            Ok("Sorry, I cannot help with that.".to_string()),
        ));

        let result = translator_with(provider).translate(&intent).await;

        assert_eq!(result.validation_status, ValidationStatus::Fallback);
        assert!(result.diagnostics[0].starts_with("unparseable model output"));
    }

    #[tokio::test]
    async fn test_invalid_document_keeps_validator_diagnostics() {
        let intent = InputIntent::new(5, "Stream 4K video");
        let provider = Arc::new(ScriptedProvider::always(
            "mock",
            Ok(r#"{"name": "Broken", "expression": {"expressionValue": "not turtle ::"}}"#.to_string()),
        ));

        let result = translator_with(provider).translate(&intent).await;

        assert_eq!(result.validation_status, ValidationStatus::Fallback);
        assert!(result.diagnostics.iter().any(|d| d.starts_with("[structural]")));
        assert!(result.diagnostics.iter().any(|d| d.starts_with("[expression_syntax]")));
        assert!(tmf921_core::validate(&result.structured_document).is_valid());
    }

    #[tokio::test]
    async fn test_secondary_takes_over_after_primary_failure() {
        let intent = InputIntent::new(6, "Create a network slice for emergency services");
        let primary = Arc::new(ScriptedProvider::always(
            "primary",
            Err(ProviderError::Unavailable {
                status: 503,
                message: "down".into(),
            }),
        ));
        let secondary = Arc::new(ScriptedProvider::always("secondary", Ok(valid_document_for(&intent))));
        let gateway = ModelGateway::new(primary, no_retry()).with_secondary(secondary);
        let translator = Translator::builder().gateway(Arc::new(gateway)).build().unwrap();

        let result = translator.translate(&intent).await;

        assert_eq!(result.validation_status, ValidationStatus::Valid);
        assert_eq!(result.provider_used, "secondary");
    }

    #[tokio::test]
    async fn test_rag_prompt_uses_retrieved_examples() {
        let provider = Arc::new(CapturingProvider {
            reply: "{}".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let index = ExampleIndex::from_examples(vec![(
            "Provision a gaming slice with ultra low latency".to_string(),
            serde_json::json!({"name": "RetrievedGamingIntent"}),
        )]);
        let translator = Translator::builder()
            .gateway(Arc::new(ModelGateway::new(provider.clone(), no_retry())))
            .retrieval(Arc::new(index))
            .options(TranslationOptions {
                use_rag: true,
                k: 3,
                ..Default::default()
            })
            .build()
            .unwrap();

        translator
            .translate(&InputIntent::new(1, "gaming slice with low latency"))
            .await;

        let prompts = provider.prompts.lock();
        assert!(prompts[0].contains("RetrievedGamingIntent"));
        assert!(prompts[0].contains("SIMILAR EXAMPLES"));
    }

    #[tokio::test]
    async fn test_empty_retrieval_degrades_to_baseline() {
        let provider = Arc::new(CapturingProvider {
            reply: "{}".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let translator = Translator::builder()
            .gateway(Arc::new(ModelGateway::new(provider.clone(), no_retry())))
            .retrieval(Arc::new(ExampleIndex::from_examples(Vec::new())))
            .options(TranslationOptions {
                use_rag: true,
                ..Default::default()
            })
            .build()
            .unwrap();

        translator.translate(&InputIntent::new(1, "anything")).await;

        assert!(provider.prompts.lock()[0].contains("REFERENCE EXAMPLE"));
    }

    #[test]
    fn test_builder_requires_gateway_and_retrieval() {
        assert!(matches!(
            Translator::builder().build(),
            Err(TranslatorError::NoGateway)
        ));

        let provider = Arc::new(ScriptedProvider::always("mock", Ok("{}".to_string())));
        let result = Translator::builder()
            .gateway(Arc::new(ModelGateway::new(provider, no_retry())))
            .options(TranslationOptions {
                use_rag: true,
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(TranslatorError::NoRetrieval)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_translate_always_yields_artifact(text in "[a-zA-Z0-9 .,]{1,80}", id in 1u64..10_000) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let provider = Arc::new(ScriptedProvider::always("mock", Ok("not json".to_string())));
            let intent = InputIntent::new(id, text);

            let result = runtime.block_on(translator_with(provider).translate(&intent));

            prop_assert_eq!(result.source_id, id);
            prop_assert_eq!(result.validation_status, ValidationStatus::Fallback);
        }
    }
}
