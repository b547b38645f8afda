mod logging;
mod sinks;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use studybuddy_ai::{DocumentPreparer, PipelineEvent, StudyPipeline};
use studybuddy_core::{ConfigManager, OutputFormat, QuestionStrategy, RunOutput, StudyBuddyConfig};
use tracing::info;

#[derive(Parser)]
#[command(name = "studybuddy")]
#[command(about = "Study Buddy - exam questions and answers from your study material", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ./.studybuddy.toml, then ~/.studybuddy/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate questions for a document and answer them from its own text
    Run(RunArgs),

    /// Split a document and report chunk counts without calling any model
    Split {
        /// Document to split (falls back to FILE_PATH)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Write a default configuration file
    Init {
        #[arg(short, long, default_value = ".studybuddy.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration with API keys redacted
    Config,
}

#[derive(Args, Default)]
struct RunArgs {
    /// PDF or text document (falls back to FILE_PATH)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// LLM backend
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// Embedding backend
    #[arg(long, value_enum)]
    embedding_provider: Option<ProviderArg>,

    /// Generation model name
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature for both questions and answers
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Chunks retrieved per question
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Answer only the first N questions
    #[arg(short = 'n', long)]
    question_limit: Option<usize>,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output file format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// How coarse chunks are turned into questions
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Openai,
    Gemini,
}

impl ProviderArg {
    fn as_str(&self) -> &'static str {
        match self {
            ProviderArg::Openai => "openai",
            ProviderArg::Gemini => "gemini",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    PerChunk,
    Refine,
}

impl From<StrategyArg> for QuestionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::PerChunk => QuestionStrategy::PerChunk,
            StrategyArg::Refine => QuestionStrategy::Refine,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match execute_command(&cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => execute_run(load_config(cli)?, args).await,
        Commands::Split { file } => {
            let mut config = load_config(cli)?.into_config();
            if let Some(file) = file {
                config.pipeline.file_path = Some(file.clone());
            }
            execute_split(&config).await
        }
        Commands::Init { path, force } => execute_init(path, *force),
        Commands::Config => execute_config(&load_config(cli)?),
    }
}

/// Resolve the configuration, then install logging as it specifies.
fn load_config(cli: &Cli) -> Result<ConfigManager> {
    let manager = {
        let _bootstrap = logging::bootstrap(cli.verbose);
        match cli.config.as_deref() {
            Some(path) => ConfigManager::from_path(path),
            None => ConfigManager::load(),
        }
        .context("Failed to load configuration")?
    };
    logging::init_tracing(&manager.config().logging, cli.verbose)?;
    Ok(manager)
}

/// Command-line flags win over everything `ConfigManager` resolved.
fn apply_run_args(config: &mut StudyBuddyConfig, args: &RunArgs) {
    if let Some(file) = &args.file {
        config.pipeline.file_path = Some(file.clone());
    }
    if let Some(provider) = args.provider {
        config.llm.provider = provider.as_str().to_string();
    }
    if let Some(provider) = args.embedding_provider {
        config.embedding.provider = provider.as_str().to_string();
    }
    if let Some(model) = &args.model {
        config.llm.model = Some(model.clone());
    }
    if let Some(temperature) = args.temperature {
        config.llm.temperature = Some(temperature);
    }
    if let Some(top_k) = args.top_k {
        config.retrieval.top_k = top_k;
    }
    if let Some(limit) = args.question_limit {
        config.retrieval.question_limit = Some(limit);
    }
    if let Some(output) = &args.output {
        config.output.path = output.clone();
    }
    if let Some(format) = args.format {
        config.output.format = format.into();
    }
    if let Some(strategy) = args.strategy {
        config.pipeline.question_strategy = strategy.into();
    }
}

fn document_path(config: &StudyBuddyConfig) -> Result<PathBuf> {
    config
        .pipeline
        .file_path
        .clone()
        .ok_or_else(|| anyhow!("No document given. Pass --file or set FILE_PATH"))
}

async fn execute_run(manager: ConfigManager, args: &RunArgs) -> Result<()> {
    let mut config = manager.into_config();
    apply_run_args(&mut config, args);
    let manager = ConfigManager::from_config(config).context("Invalid configuration")?;
    let config = manager.config();

    let path = document_path(config)?;
    info!(
        "Run: llm={} embedding={} strategy={:?} limit={:?}",
        config.llm.provider,
        config.embedding.provider,
        config.pipeline.question_strategy,
        config.retrieval.question_limit
    );

    println!(
        "{} {}",
        "Study Buddy:".bold(),
        path.display().to_string().cyan()
    );

    let pipeline = StudyPipeline::from_config(config)
        .context("Failed to initialise providers")?
        .with_progress(Arc::new(print_event));
    for name in pipeline.unavailable_providers().await {
        println!("{} {} did not answer a reachability check", "!".yellow(), name);
    }
    let sink = sinks::sink_for(config.output.format, &config.output.path);

    let (output, written) = pipeline
        .run_to_sink(&path, sink.as_ref())
        .await
        .with_context(|| format!("Run failed for {}", path.display()))?;

    print_summary(&output, &written);
    Ok(())
}

async fn execute_split(config: &StudyBuddyConfig) -> Result<()> {
    let path = document_path(config)?;
    let preparer = DocumentPreparer::from_config(config)?;
    let document = preparer.load(&path).await?;
    let split = preparer.split(&document)?;
    let splitter = preparer.splitter();

    println!("{} {}", "Document:".bold(), document.display_name().cyan());
    println!("  {:<16} {}", "characters", document.text.chars().count());
    println!("  {:<16} {}", "tokens", splitter.count_tokens(&document.text)?);
    println!(
        "  {:<16} {} (max {} / overlap {})",
        "coarse chunks",
        split.coarse.len().to_string().green(),
        splitter.coarse_config().max_tokens,
        splitter.coarse_config().overlap_tokens
    );
    println!(
        "  {:<16} {} (max {} / overlap {})",
        "fine chunks",
        split.fine.len().to_string().green(),
        splitter.fine_config().max_tokens,
        splitter.fine_config().overlap_tokens
    );
    Ok(())
}

fn execute_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    ConfigManager::create_default_config(path).context("Failed to write configuration")?;
    println!(
        "{} Wrote default configuration to {}",
        "✓".green(),
        path.display()
    );
    Ok(())
}

fn execute_config(manager: &ConfigManager) -> Result<()> {
    match manager.config_path() {
        Some(path) => println!("# loaded from {}", path.display()),
        None => println!("# no config file found; defaults and environment only"),
    }
    println!("{}", manager.redacted_toml()?);
    Ok(())
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::DocumentLoaded { source, bytes } => println!(
            "{} Loaded {} ({} bytes)",
            "✓".green(),
            source.display(),
            bytes
        ),
        PipelineEvent::DocumentSplit { coarse, fine } => println!(
            "{} Split into {} question chunk(s) and {} answer chunk(s)",
            "✓".green(),
            coarse,
            fine
        ),
        PipelineEvent::QuestionsGenerated {
            count,
            skipped_chunks,
        } => {
            println!("{} Generated {} question(s)", "✓".green(), count);
            if *skipped_chunks > 0 {
                println!(
                    "  {} {} chunk(s) skipped after retries",
                    "!".yellow(),
                    skipped_chunks
                );
            }
        }
        PipelineEvent::QuestionLimitApplied { limit, total } => println!(
            "  {} Limited to the first {} of {} questions",
            "•".cyan(),
            limit,
            total
        ),
        PipelineEvent::IndexBuilt { chunks } => {
            println!("{} Indexed {} answer chunk(s)", "✓".green(), chunks)
        }
        PipelineEvent::Answering { count } => {
            println!("{} Answering {} question(s)...", "→".cyan(), count)
        }
        PipelineEvent::Finished {
            answered,
            unanswered,
        } => {
            let line = format!("{} answered, {} unanswered", answered, unanswered);
            if *unanswered == 0 {
                println!("{} {}", "✓".green(), line);
            } else {
                println!("{} {}", "!".yellow(), line.yellow());
            }
        }
    }
}

fn print_summary(output: &RunOutput, written: &Path) {
    let report = &output.report;

    println!();
    println!("{}", "Summary".bold().underline());
    println!("  {:<22} {}", "run", report.run_id);
    println!(
        "  {:<22} {}",
        "questions answered",
        format!("{}/{}", report.questions_answered, output.questions.len()).green()
    );
    if let Some(ms) = report.elapsed_ms() {
        println!("  {:<22} {:.1}s", "elapsed", ms as f64 / 1000.0);
    }

    for skipped in &report.skipped_chunks {
        println!(
            "  {} chunk {} skipped after {} attempt(s) [{}]: {}",
            "!".yellow(),
            skipped.chunk_index,
            skipped.attempts,
            skipped.kind,
            skipped.error
        );
    }
    for unanswered in &report.unanswered {
        println!(
            "  {} question {} unanswered [{}]: {}",
            "!".yellow(),
            unanswered.number,
            unanswered.kind,
            unanswered.reason
        );
    }
    if !report.unprocessed_questions.is_empty() {
        println!(
            "  {} {} question(s) beyond the limit were not answered",
            "•".cyan(),
            report.unprocessed_questions.len()
        );
    }

    println!(
        "{} Answers written to {}",
        "✓".green(),
        written.display().to_string().cyan()
    );
}
