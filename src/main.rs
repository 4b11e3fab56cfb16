use anyhow::Context;
use clap::{Parser, Subcommand};
use concord::config::{load_schema, ConcordConfig};
use concord::pipeline::BatchAggregator;
use concord::{EvaluationMetric, Record};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Best-of-N consensus for structured language-model outputs
#[derive(Parser, Debug)]
#[command(name = "concord")]
#[command(about = "Reconcile N sampled structured outputs into one record", long_about = None)]
struct Args {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate candidate sets into consensus records
    Aggregate {
        /// Path to the JSON schema definition
        #[arg(long)]
        schema: PathBuf,

        /// Candidate-set file (.json / .jsonl) or a directory of them
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for consensus records
        #[arg(short, long)]
        output: PathBuf,

        /// Distinct candidates a list element needs to be kept
        #[arg(long, default_value_t = 2)]
        threshold: usize,

        /// Fields copied from the first candidate and never scored
        #[arg(long, num_args = 1..)]
        skip: Vec<String>,

        /// Path to a JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write a confidence report next to each record
        #[arg(long)]
        report: bool,
    },

    /// Score a prediction against a reference record
    Score {
        /// Path to the JSON schema definition
        #[arg(long)]
        schema: PathBuf,

        /// Predicted record (JSON object)
        #[arg(long)]
        prediction: PathBuf,

        /// Reference record (JSON object)
        #[arg(long)]
        reference: PathBuf,

        /// Fields excluded from scoring
        #[arg(long, num_args = 1..)]
        skip: Vec<String>,

        /// Path to a JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Aggregate {
            schema,
            input,
            output,
            threshold,
            skip,
            config,
            report,
        } => {
            info!("Starting Concord v{}", env!("CARGO_PKG_VERSION"));
            let config = ConcordConfig::load_or_default(config.as_deref())?;
            let schema = Arc::new(load_schema(&schema, &skip)?);
            info!("Schema loaded: {} fields, {} skipped", schema.len(), skip.len());

            let batch = BatchAggregator::new(config.aggregator(), schema, threshold).with_reports(report);
            let summary = batch.run(&input, &output)?;

            println!(
                "{} written, {} failed, {} low-confidence",
                summary.written.len(),
                summary.failures.len(),
                summary.low_confidence_count()
            );
            for failure in &summary.failures {
                eprintln!("{}: {}", failure.source, failure.error);
            }
        }
        Command::Score {
            schema,
            prediction,
            reference,
            skip,
            config,
        } => {
            let config = ConcordConfig::load_or_default(config.as_deref())?;
            let schema = Arc::new(load_schema(&schema, &skip)?);
            let metric = EvaluationMetric::new(schema, config.scorer());

            let prediction = read_record(&prediction)?;
            let reference = read_record(&reference)?;
            let score = metric
                .score(&prediction, &reference)
                .context("Failed to score prediction")?;

            for field in metric.score_fields(&prediction, &reference)? {
                info!("{}: {:.4}", field.name, field.score);
            }
            println!("{:.6}", score);
        }
    }

    Ok(())
}

fn read_record(path: &Path) -> anyhow::Result<Record> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("{:?} is not a JSON object", path))
}
