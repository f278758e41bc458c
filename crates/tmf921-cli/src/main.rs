use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tmf921_core::{
    analyze, load_intents, ExampleIndex, InputIntent, IntentValidator, RetrievalProvider,
    RetrievalStrategy, ValidationLevel,
};
use tmf921_runtime::{
    BatchRunner, CheckpointStore, ModelGateway, ProviderRegistry, RunConfig, TranslateIntent,
    TranslationOptions, Translator,
};

#[derive(Parser, Debug)]
#[command(
    name = "tmf921",
    version,
    about = "Translate natural-language telecom intents into validated TMF921 Intent documents"
)]
struct Cli {
    /// Log filter (overrides RUST_LOG), e.g. `debug` or `tmf921_runtime=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate an intents file with periodic checkpoints
    Generate(GenerateArgs),

    /// Translate one intent and print the generated artifact
    Translate {
        /// Intent text
        text: String,

        /// Identifier recorded in the artifact
        #[arg(long, default_value_t = 1)]
        id: u64,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Re-run the validator over a written dataset
    Validate {
        /// Dataset file (results artifact or plain array of documents)
        dataset: PathBuf,

        /// Failures printed per level
        #[arg(long, default_value_t = 5)]
        show: usize,
    },

    /// Print the categorizer analysis of an intent
    Categorize {
        /// Intent text
        text: String,
    },
}

/// Options shared by every command that calls a model.
#[derive(Args, Debug)]
struct RunArgs {
    /// YAML run configuration; flags below override it
    #[arg(long, env = "TMF921_CONFIG")]
    config: Option<PathBuf>,

    /// Primary backend (groq, together, huggingface, gemini)
    #[arg(long, env = "TMF921_PROVIDER")]
    provider: Option<String>,

    /// Backend tried once the primary gives up
    #[arg(long)]
    secondary_provider: Option<String>,

    /// Model override for the primary backend
    #[arg(long)]
    model: Option<String>,

    /// Enable retrieval-augmented prompts
    #[arg(long)]
    use_rag: bool,

    /// Reference examples for retrieval (`[{user_intent, tmf921_intent}]`)
    #[arg(long)]
    examples_path: Option<PathBuf>,

    /// top_k, mmr or hybrid
    #[arg(long)]
    retrieval_strategy: Option<RetrievalStrategy>,

    /// Examples requested from the retrieval provider
    #[arg(short, long)]
    k: Option<usize>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    max_tokens: Option<u32>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Intents file: array of strings or `{id, text}` records
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    start_index: Option<usize>,

    #[arg(long)]
    max_items: Option<usize>,

    #[arg(long)]
    checkpoint_interval: Option<usize>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    checkpoint_path: Option<PathBuf>,

    #[command(flatten)]
    run: RunArgs,
}

impl RunArgs {
    fn load_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(provider) = &self.provider {
            config.provider = provider.to_lowercase();
        }
        if let Some(secondary) = &self.secondary_provider {
            config.secondary_provider = Some(secondary.to_lowercase());
        }
        if let Some(model) = &self.model {
            let entry = config
                .providers
                .entry(config.provider.clone())
                .or_insert_with(|| JsonValue::Object(Default::default()));
            if let JsonValue::Object(map) = entry {
                map.insert("model".to_string(), JsonValue::String(model.clone()));
            }
        }
        if self.use_rag {
            config.use_rag = true;
        }
        if let Some(path) = &self.examples_path {
            config.examples_path = Some(path.clone());
        }
        if let Some(strategy) = self.retrieval_strategy {
            config.retrieval_strategy = strategy;
        }
        if let Some(k) = self.k {
            config.k = k;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = Some(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        Ok(config)
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Gateway plus translator for a validated config.
fn build_translator(config: &RunConfig) -> Result<Translator> {
    let registry = ProviderRegistry::with_defaults();
    let gateway = ModelGateway::from_config(config, &registry)
        .with_context(|| format!("failed to create provider '{}'", config.provider))?;

    let mut builder = Translator::builder()
        .gateway(Arc::new(gateway))
        .options(TranslationOptions::from_config(config));

    if config.use_rag {
        if let Some(path) = &config.examples_path {
            let index = ExampleIndex::from_file(path)
                .with_context(|| format!("failed to load examples {}", path.display()))?;
            info!(examples = index.len(), path = %path.display(), "Retrieval index loaded");
            builder = builder.retrieval(Arc::new(index));
        }
    }

    Ok(builder.build()?)
}

/// Set `cancel` on the first interrupt. Returns `true` on a second one,
/// when the caller should exit without waiting for the in-flight item.
async fn watch_interrupts<F, Fut>(mut next_signal: F, cancel: &AtomicBool) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    warn!("Interrupt received, stopping after the current item (Ctrl-C again to abort now)");
    cancel.store(true, Ordering::Release);

    if next_signal().await.is_err() {
        return false;
    }
    warn!("Second interrupt, abandoning the in-flight item; resume from the last checkpoint");
    true
}

async fn generate(args: GenerateArgs) -> Result<()> {
    let mut config = args.run.load_config()?;
    if let Some(start) = args.start_index {
        config.start_index = start;
    }
    if args.max_items.is_some() {
        config.max_items = args.max_items;
    }
    if let Some(interval) = args.checkpoint_interval {
        config.checkpoint_interval = interval;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(path) = args.checkpoint_path {
        config.checkpoint_path = Some(path);
    }
    config.validate().context("invalid run configuration")?;

    let intents = load_intents(&args.input)
        .with_context(|| format!("failed to load intents {}", args.input.display()))?;
    info!(count = intents.len(), path = %args.input.display(), "Intents loaded");

    let translator = build_translator(&config)?;
    let usage = Arc::clone(translator.gateway().usage());

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if watch_interrupts(tokio::signal::ctrl_c, &cancel).await {
                std::process::exit(130);
            }
        });
    }

    let runner = BatchRunner::new(
        Arc::new(translator),
        CheckpointStore::new(config.effective_checkpoint_path()),
        &config.output_dir,
    )
    .with_provider(config.provider.clone())
    .with_max_items(config.max_items)
    .with_usage(usage)
    .with_cancel_flag(cancel);

    let summary = runner
        .run(&intents, config.start_index, config.checkpoint_interval)
        .await
        .context("batch run aborted")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn translate(text: String, id: u64, run: RunArgs) -> Result<()> {
    let config = run.load_config()?;
    config.validate().context("invalid run configuration")?;

    let translator = build_translator(&config)?;
    let result = translator.translate(&InputIntent::new(id, text)).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn validate_dataset(path: PathBuf, show: usize) -> Result<()> {
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read dataset {}", path.display()))?;
    let json: JsonValue = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let entries = match &json {
        JsonValue::Object(map) => match map.get("results") {
            Some(JsonValue::Array(items)) => items.as_slice(),
            _ => bail!("{} has no \"results\" array", path.display()),
        },
        JsonValue::Array(items) => items.as_slice(),
        _ => bail!("{} is neither a results artifact nor an array", path.display()),
    };

    let validator = IntentValidator::new();
    let results: Vec<_> = entries
        .iter()
        .map(|entry| {
            let id = entry.get("source_id").and_then(JsonValue::as_u64);
            let document = entry.get("structured_document").unwrap_or(entry);
            (id, validator.validate(document))
        })
        .collect();

    let total = results.len();
    let valid = results.iter().filter(|(_, r)| r.is_valid()).count();
    println!("Documents: {}", total);

    for level in ValidationLevel::ALL {
        let passed = results.iter().filter(|(_, r)| r.passed_level(level)).count();
        println!("\n{}: {}/{} passed", level.as_str(), passed, total);
        for (position, (id, result)) in results
            .iter()
            .enumerate()
            .filter(|(_, (_, r))| !r.passed_level(level))
            .take(show)
        {
            let label = id.map_or_else(|| format!("#{}", position), |id| format!("id {}", id));
            for failure in result.failures_at(level) {
                println!("  {}: {}", label, failure.message);
            }
        }
    }

    let warnings: usize = results.iter().map(|(_, r)| r.warnings.len()).sum();
    println!("\nValid: {}/{} ({} warnings)", valid, total, warnings);

    if valid < total {
        bail!("{} of {} documents failed validation", total - valid, total);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Command::Generate(args) => generate(args).await,
        Command::Translate { text, id, run } => translate(text, id, run).await,
        Command::Validate { dataset, show } => validate_dataset(dataset, show),
        Command::Categorize { text } => {
            println!("{}", serde_json::to_string_pretty(&analyze(&text))?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        let cancel = AtomicBool::new(false);
        let signals = AtomicUsize::new(0);

        let forced = watch_interrupts(
            || {
                signals.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
            &cancel,
        )
        .await;

        assert!(forced);
        assert!(cancel.load(Ordering::Acquire));
        assert_eq!(signals.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unavailable_signal_handler_leaves_run_alone() {
        let cancel = AtomicBool::new(false);
        let forced = watch_interrupts(
            || async { Err(io::Error::new(io::ErrorKind::Other, "no signal handler")) },
            &cancel,
        )
        .await;

        assert!(!forced);
        assert!(!cancel.load(Ordering::Acquire));
    }

    #[test]
    fn test_cli_parses_generate_overrides() {
        let cli = Cli::try_parse_from([
            "tmf921",
            "generate",
            "--input",
            "intents.json",
            "--start-index",
            "13",
            "--provider",
            "Gemini",
        ])
        .unwrap();

        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.start_index, Some(13));
                let config = args.run.load_config().unwrap();
                assert_eq!(config.provider, "gemini");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
