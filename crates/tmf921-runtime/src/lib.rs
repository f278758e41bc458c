//! # tmf921-runtime
//!
//! The I/O half of the TMF921 intent pipeline.
//!
//! `tmf921-core` decides what a valid document is. This crate talks to
//! LLM backends and drives long runs:
//! - [`ModelGateway`]: one `generate` call with per-attempt timeout,
//!   exponential backoff on transient errors and optional secondary backend
//! - [`Translator`]: prompt building, retrieval, validation and template
//!   fallback for a single intent
//! - [`BatchRunner`]: sequential processing with periodic, atomic
//!   checkpoints and resume-from-offset
//!
//! ## Failure policy
//!
//! Per-item failures (provider, parse, validation) end in a `fallback`
//! artifact and never stop a batch. Only [`ConfigError`] at startup and
//! checkpoint or output I/O errors ([`BatchError`]) are fatal.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tmf921_runtime::{
//!     BatchRunner, CheckpointStore, ModelGateway, ProviderRegistry, RunConfig,
//!     TranslationOptions, Translator,
//! };
//!
//! let config = RunConfig::from_file("run.yaml")?;
//! let gateway = ModelGateway::from_config(&config, &ProviderRegistry::with_defaults())?;
//! let translator = Translator::builder()
//!     .gateway(Arc::new(gateway))
//!     .options(TranslationOptions::from_config(&config))
//!     .build()?;
//!
//! let runner = BatchRunner::new(
//!     Arc::new(translator),
//!     CheckpointStore::new(config.effective_checkpoint_path()),
//!     &config.output_dir,
//! );
//! let summary = runner.run(&intents, config.start_index, config.checkpoint_interval).await?;
//! ```

pub mod batch;
pub mod config;
pub mod gateway;
pub mod prompts;
pub mod providers;
pub mod translator;
pub mod usage;

pub use batch::{
    BatchError, BatchRunner, CheckpointError, CheckpointRecord, CheckpointStore, Dataset,
    RunSummary,
};
pub use config::{ConfigError, RetryConfig, RunConfig};
pub use gateway::{GenerateOptions, Generation, ModelGateway, ProviderSlot};
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};
pub use translator::{TranslateIntent, TranslationOptions, Translator, TranslatorError};
pub use usage::{LlmUsage, UsageTracker};
