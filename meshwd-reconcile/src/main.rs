//! meshwd-reconcile - MeSH → Wikidata reconciliation
//!
//! `run`: reconcile a keyword list into matched / unmatched CSV files.
//! `prepare`: build a keyword list from a saved MeSH HTML listing.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use meshwd_common::config::{load_toml_config, resolve_config_path, ConfigSource, TomlConfig};
use meshwd_reconcile::config::{ConfigOverrides, ReconcileConfig};
use meshwd_reconcile::keywords::{load_keywords, prepare_keyword_list};
use meshwd_reconcile::output::{read_processed_keywords, ResultSink};
use meshwd_reconcile::pipeline::{filter_processed, BatchRunner};
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments for meshwd-reconcile
#[derive(Parser, Debug)]
#[command(name = "meshwd-reconcile")]
#[command(about = "Find MeSH keywords without a Wikidata item or Wikipedia article")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "MESHWD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, env = "MESHWD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true, env = "MESHWD_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile a keyword list against Wikidata
    Run(RunArgs),
    /// Extract a keyword list from a MeSH HTML page
    Prepare(PrepareArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Keyword list (one per line, first CSV column)
    #[arg(short, long, default_value = "list_wiki.csv", env = "MESHWD_INPUT")]
    input: PathBuf,

    /// Output for matched keywords
    #[arg(long, default_value = "matched_output.csv", env = "MESHWD_MATCHED")]
    matched: PathBuf,

    /// Output for unmatched keywords
    #[arg(long, default_value = "unmatched_output.csv", env = "MESHWD_UNMATCHED")]
    unmatched: PathBuf,

    /// Minimum similarity (0-100) for a match
    #[arg(short, long, env = "MESHWD_THRESHOLD")]
    threshold: Option<f64>,

    /// Candidates requested per keyword
    #[arg(short, long, env = "MESHWD_SEARCH_LIMIT")]
    limit: Option<u32>,

    /// Label and Wikipedia language
    #[arg(long, env = "MESHWD_LANGUAGE")]
    language: Option<String>,

    /// Keywords processed concurrently
    #[arg(long, env = "MESHWD_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Skip keywords already present in the output files and append
    #[arg(long, env = "MESHWD_RESUME")]
    resume: bool,

    /// Reorder inverted headings ("Anemia, Hemolytic" → "Hemolytic Anemia")
    #[arg(long)]
    swap_commas: bool,
}

#[derive(Args, Debug)]
struct PrepareArgs {
    /// Saved MeSH HTML listing
    #[arg(long, default_value = "data.html")]
    html: PathBuf,

    /// Keyword list to write
    #[arg(short, long, default_value = "list_wiki.csv")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let toml_config = load_toml_config(config_path.as_deref())
        .context("Failed to load configuration")?;

    init_logging(&cli, &toml_config)?;

    info!(
        "Starting meshwd-reconcile {} ({} {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );
    ConfigSource::detect(config_path.as_deref()).log();

    match cli.command {
        Command::Run(args) => run(args, &toml_config).await,
        Command::Prepare(args) => prepare(&args),
    }
}

fn init_logging(cli: &Cli, toml_config: &TomlConfig) -> Result<()> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| toml_config.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let log_file = cli.log_file.as_deref().or(toml_config.logging.file.as_deref());

    meshwd_common::logging::init_tracing(&level, log_file)
        .context("Failed to initialize logging")
}

async fn run(args: RunArgs, toml_config: &TomlConfig) -> Result<()> {
    let config = ReconcileConfig::from_toml(toml_config).with_overrides(ConfigOverrides {
        threshold: args.threshold,
        search_limit: args.limit,
        language: args.language,
        concurrency: args.concurrency,
    });
    config.validate().context("Invalid configuration")?;

    info!(
        threshold = config.threshold,
        search_limit = config.search_limit,
        language = %config.language,
        concurrency = config.concurrency,
        "Configuration resolved"
    );

    let keywords = load_keywords(&args.input, args.swap_commas)
        .with_context(|| format!("Failed to read keywords from {}", args.input.display()))?;

    let (keywords, skipped) = if args.resume {
        let processed = read_processed_keywords(&[args.matched.as_path(), args.unmatched.as_path()]);
        info!("Found {} already processed keywords", processed.len());
        filter_processed(keywords, &processed)
    } else {
        (keywords, 0)
    };

    let reconciler = meshwd_reconcile::build_reconciler(&config)
        .context("Failed to set up Wikidata clients")?;
    let runner = BatchRunner::new(reconciler, config.concurrency, config.max_consecutive_failures);

    let mut sink = ResultSink::open(&args.matched, &args.unmatched, args.resume)
        .context("Failed to open output files")?;

    let summary = runner
        .run(keywords, skipped, &mut sink)
        .await
        .context("Reconciliation run failed")?;

    info!(
        matched = %args.matched.display(),
        unmatched = %args.unmatched.display(),
        "Run finished: {}",
        summary.stats.display_string()
    );
    Ok(())
}

fn prepare(args: &PrepareArgs) -> Result<()> {
    let count = prepare_keyword_list(&args.html, &args.output).with_context(|| {
        format!("Failed to prepare keywords from {}", args.html.display())
    })?;
    info!("Wrote {} keywords to {}", count, args.output.display());
    Ok(())
}
