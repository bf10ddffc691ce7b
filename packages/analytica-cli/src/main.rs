/*
 * Analytica CLI - Batch JSONL Front-End
 *
 * Reads a JSONL batch of questions, runs each through the workflow with
 * a bounded worker pool, and writes one JSON report per line.
 *
 * Usage:
 *   analytica --batch questions.jsonl --out answers.jsonl \
 *       --db northwind.sqlite --docs ./docs
 */

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use analytica_providers::{
    DocRetriever, HeuristicPlanner, KeywordRouteClassifier, RuleBasedGenerator, SqliteExecutor,
    TemplateSynthesizer,
};
use analytica_workflow::{
    read_batch, write_reports, BatchDriver, Orchestrator, ProviderBundle, WorkflowConfig,
};

#[derive(Debug, Parser)]
#[command(name = "analytica", about = "Hybrid question-answering over SQLite and markdown docs", version)]
struct Cli {
    /// JSONL batch file, one {"id", "question", "format_hint"?} per line
    #[arg(long, value_name = "FILE")]
    batch: PathBuf,

    /// Output JSONL path; stdout when omitted
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// SQLite database, opened read-only
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Directory of markdown documents to index
    #[arg(long, value_name = "DIR", default_value = "docs")]
    docs: PathBuf,

    /// Bound on the structured-query repair loop
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,

    /// Per-stage deadline in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Batch worker pool size
    #[arg(long, value_name = "N")]
    workers: Option<usize>,
}

impl Cli {
    fn config(&self) -> WorkflowConfig {
        let mut config = WorkflowConfig::default();
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }
        if let Some(workers) = self.workers {
            config.worker_concurrency = workers;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    let executor = match &cli.db {
        Some(db) => SqliteExecutor::open_read_only(db)?,
        None => SqliteExecutor::in_memory()?,
    };
    let retriever = DocRetriever::from_dir(&cli.docs)?;

    let providers = ProviderBundle {
        classifier: Arc::new(KeywordRouteClassifier::new()),
        retriever: Arc::new(retriever),
        planner: Arc::new(HeuristicPlanner::new()),
        generator: Arc::new(RuleBasedGenerator::new()),
        executor: Arc::new(executor),
        synthesizer: Arc::new(TemplateSynthesizer::new()),
    };

    let orchestrator = Arc::new(Orchestrator::new(providers, config));
    let driver = BatchDriver::new(orchestrator);

    let batch_file = File::open(&cli.batch)
        .with_context(|| format!("opening batch file {}", cli.batch.display()))?;
    let records = read_batch(BufReader::new(batch_file))?;
    info!(records = records.len(), "batch loaded");

    let reports = driver.run(records).await;

    match &cli.out {
        Some(path) => {
            let out_file = File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?;
            let mut writer = BufWriter::new(out_file);
            write_reports(&mut writer, &reports)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            write_reports(stdout.lock(), &reports)?;
        }
    }

    Ok(())
}
