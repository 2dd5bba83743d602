// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gpt_batch::app_config::{Backend, Config, LogLevel};
use gpt_batch::{BatchReport, Batcher};

/// CLI Wrapper for Backend to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliBackend {
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
}

impl From<CliBackend> for Backend {
    fn from(cli_backend: CliBackend) -> Self {
        match cli_backend {
            CliBackend::OpenAI => Backend::OpenAI,
            CliBackend::Anthropic => Backend::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a chat completion for every input
    Generate(BatchArgs),

    /// Compute an embedding for every input
    Embed(BatchArgs),

    /// Generate shell completions for gpt-batch
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Input file: one item per line, or a JSON array of strings for .json files
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: PathBuf,

    /// Backend to use (inferred from the model name when omitted)
    #[arg(short, long, value_enum)]
    provider: Option<CliBackend>,

    /// Model name
    #[arg(short, long)]
    model: Option<String>,

    /// API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Alternate API base URL (OpenAI-compatible servers)
    #[arg(long)]
    api_base_url: Option<String>,

    /// System prompt sent with every item
    #[arg(short, long)]
    system_prompt: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Number of concurrent workers
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Seconds to wait for each wave
    #[arg(long)]
    timeout: Option<f64>,

    /// Waves per chunk, the first one included
    #[arg(short, long)]
    retries: Option<usize>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

/// gpt-batch - Concurrent batch inference for LLM APIs
///
/// Sends every input to the configured model with bounded concurrency and
/// writes one result per input, in input order, plus the positions that failed.
#[derive(Parser, Debug)]
#[command(name = "gpt-batch")]
#[command(version)]
#[command(about = "Concurrent batch inference for LLM APIs")]
#[command(long_about = "gpt-batch sends many prompts to an LLM API in parallel and keeps the results in input order.

EXAMPLES:
    gpt-batch generate prompts.txt                         # One completion per line
    gpt-batch generate -m gpt-4o -w 16 prompts.json        # Model and worker overrides
    gpt-batch generate -m claude-3-haiku-20240307 in.txt   # Anthropic backend
    gpt-batch embed -m text-embedding-3-small docs.txt     # Embeddings
    gpt-batch completions bash > gpt-batch.bash            # Generate bash completions

CONFIGURATION:
    Configuration is read from conf.json by default. You can specify a different
    config file with --config-path. If the file does not exist, defaults are used.
    Command line flags override the file.

OUTPUT:
    A JSON object { \"results\": [...], \"missed\": [...] } where failed items are null.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color code and marker for level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "❌"),
            Level::Warn => ("1;33", "🚧"),
            Level::Info => ("1;32", " "),
            Level::Debug => ("1;36", "🔍"),
            Level::Trace => ("1;35", "📋"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, marker) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                color,
                now,
                marker,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// JSON document written for every run
#[derive(Debug, Serialize)]
struct RunOutput<V> {
    results: Vec<Option<V>>,
    missed: Vec<usize>,
}

impl<V> From<BatchReport<V>> for RunOutput<V> {
    fn from(report: BatchReport<V>) -> Self {
        Self {
            results: report.values,
            missed: report.missed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Generate,
    Embed,
}

#[tokio::main]
async fn main() -> Result<()> {
    // The level is raised or lowered once the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "gpt-batch", &mut std::io::stdout());
            Ok(())
        }
        Commands::Generate(args) => run_batch(args, Mode::Generate).await,
        Commands::Embed(args) => run_batch(args, Mode::Embed).await,
    }
}

async fn run_batch(args: BatchArgs, mode: Mode) -> Result<()> {
    if let Some(level) = &args.log_level {
        log::set_max_level(LogLevel::from(level.clone()).to_level_filter());
    }

    let config = load_config(&args)?;
    log::set_max_level(config.log_level.to_level_filter());

    let inputs = read_inputs(&args.input_path)?;
    info!("Loaded {} inputs from {}", inputs.len(), args.input_path.display());

    let progress_bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {eta}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style);

    let bar = progress_bar.clone();
    let batcher = Batcher::new(&config)
        .context("Failed to set up the batcher")?
        .with_progress(Arc::new(move |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        }));

    let json = match mode {
        Mode::Generate => {
            let report = batcher.run_text_batch(inputs).await?;
            log_summary(&report);
            serde_json::to_string_pretty(&RunOutput::from(report))?
        }
        Mode::Embed => {
            let report = batcher.run_embedding_batch(inputs).await?;
            log_summary(&report);
            serde_json::to_string_pretty(&RunOutput::from(report))?
        }
    };
    progress_bar.finish_and_clear();

    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?,
        None => println!("{}", json),
    }

    Ok(())
}

fn log_summary<V>(report: &BatchReport<V>) {
    if report.missed.is_empty() {
        info!("Success: {} of {} items", report.succeeded(), report.len());
    } else {
        warn!(
            "{} of {} items failed: {:?}",
            report.missed.len(),
            report.len(),
            report.missed
        );
    }
}

/// Load the config file (or defaults) and apply command line overrides
fn load_config(args: &BatchArgs) -> Result<Config> {
    let mut config = if args.config_path.exists() {
        Config::from_file(&args.config_path)?
    } else {
        warn!(
            "Config file not found at '{}', using defaults.",
            args.config_path.display()
        );
        Config::default()
    };

    if let Some(provider) = &args.provider {
        config.provider = Some(provider.clone().into());
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(api_key) = &args.api_key {
        config.api_key = api_key.clone();
    }
    if let Some(url) = &args.api_base_url {
        config.api_base_url = Some(url.clone());
    }
    if let Some(system_prompt) = &args.system_prompt {
        config.system_prompt = system_prompt.clone();
    }
    if let Some(temperature) = args.temperature {
        config.temperature = temperature;
    }
    if let Some(workers) = args.workers {
        config.num_workers = workers;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(retries) = args.retries {
        config.retry_attempts = retries;
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone().into();
    }

    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

/// Read inputs: a JSON array of strings for `.json` files, otherwise one per non-blank line
fn read_inputs(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Expected a JSON array of strings in {}", path.display()))
    } else {
        let inputs: Vec<String> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        if inputs.is_empty() {
            return Err(anyhow!("No inputs found in {}", path.display()));
        }
        Ok(inputs)
    }
}
