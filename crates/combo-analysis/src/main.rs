//! CLI entry point for the combinations analysis engine.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use combo_analysis::{AnalysisConfig, CombinationsEngine, ReportGenerator};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Pairwise column relationship discovery",
    long_about = "Finds and ranks statistically meaningful relationships between pairs of \
                  columns in a CSV file.\n\n\
                  EXAMPLES:\n  \
                  # Analyse every column pair\n  \
                  combo-analysis -i data.csv\n\n  \
                  # Only columns whose name contains 'price' or 'region', top 5\n  \
                  combo-analysis -i data.csv --focus price,region --top-k 5\n\n  \
                  # Machine-readable output\n  \
                  combo-analysis -i data.csv --json | jq '.results[0]'"
)]
struct Args {
    /// Path to the CSV file to analyse
    #[arg(short, long)]
    input: PathBuf,

    /// Write the full JSON report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file; command-line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated name tokens; only matching columns are analysed
    #[arg(long, value_delimiter = ',')]
    focus: Vec<String>,

    /// Categorical columns with more distinct values are skipped
    #[arg(long)]
    max_cardinality: Option<usize>,

    /// Number of ranked relationships to keep
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Minimum absolute correlation for numeric pairs (0.0 - 1.0)
    #[arg(long)]
    correlation_threshold: Option<f64>,

    /// Disable the report cache
    #[arg(long)]
    no_cache: bool,

    /// Run pair analyses sequentially
    #[arg(long)]
    no_parallel: bool,

    /// Worker threads for parallel analysis
    #[arg(short, long)]
    workers: Option<usize>,

    /// Directory for the on-disk report cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the JSON report to stdout instead of the summary
    ///
    /// Disables all logging so stdout stays machine-readable.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json);

    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    let config = build_config(&args)?;
    debug!(?config, "Resolved configuration");

    info!("Loading dataset from: {}", args.input.display());
    let data = load_csv(&args.input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let engine = CombinationsEngine::builder().config(config).build()?;
    let report = engine.analyze(&data)?;

    if let Some(path) = &args.output {
        let json = ReportGenerator::to_json(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Writing report to {}", path.display()))?;
        info!("Report saved: {}", path.display());
    }

    if args.json {
        println!("{}", ReportGenerator::to_json(&report)?);
    } else {
        print!("{}", ReportGenerator::summary_text(&report));
    }

    Ok(())
}

/// Merge the optional config file with command-line overrides.
fn build_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Reading config file {}", path.display()))?;
            serde_json::from_str::<AnalysisConfig>(&text)
                .with_context(|| format!("Parsing config file {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };

    if !args.focus.is_empty() {
        config.focus_columns = args
            .focus
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }
    if let Some(max) = args.max_cardinality {
        config.max_cardinality = max;
    }
    if let Some(k) = args.top_k {
        config.top_k = k;
    }
    if let Some(threshold) = args.correlation_threshold {
        config.correlation_threshold = threshold;
    }
    if let Some(workers) = args.workers {
        config.max_workers = workers;
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if args.no_cache {
        config.enable_caching = false;
    }
    if args.no_parallel {
        config.parallel_processing = false;
    }

    config.validate()?;
    Ok(config)
}

fn load_csv(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_try_parse_dates(true),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("Reading CSV {}", path.display()))
}
