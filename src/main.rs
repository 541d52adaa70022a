//! Smelter CLI: bronze-layer ingestion for paginated raw sources.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use smelter::config::Config;
use smelter::error::{ConfigError, PipelineError};
use smelter::monitor::{AlertManager, MetricsCollector};
use smelter::pipeline::{IngestionPipeline, RunState, RunSummary};
use smelter::record::DateRange;
use smelter::sink::{LocalDestination, PartitionedLoader};
use smelter::source::{NdjsonSource, RateLimitedExtractor, SourceRegistry};
use smelter::validate::Validator;
use smelter::{init_tracing, metrics, shutdown_signal};

#[derive(Debug, Parser)]
#[command(name = "smelter", about = "Bronze-layer ingestion pipeline")]
struct CliArgs {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "smelter.yaml")]
    config: String,

    /// Run only the named source; defaults to all configured sources.
    #[arg(long)]
    source: Option<String>,

    /// Range start date (inclusive, YYYY-MM-DD). Defaults to yesterday.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Range end date (exclusive, YYYY-MM-DD). Defaults to today; given
    /// without --start, covers the single preceding day.
    #[arg(long)]
    end: Option<NaiveDate>,
}

impl CliArgs {
    fn range(&self) -> Option<DateRange> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            (Some(start), None) => Some(DateRange::new(start, chrono::Utc::now().date_naive())),
            (None, Some(end)) => {
                let start = end.pred_opt().unwrap_or(NaiveDate::MIN);
                Some(DateRange::new(start, end))
            }
            (None, None) => None,
        }
    }
}

/// Build the registry of concrete sources named by the configuration.
fn build_registry(config: &Config) -> Result<SourceRegistry, ConfigError> {
    let mut registry = SourceRegistry::new();
    for (name, source_config) in &config.sources {
        match source_config.kind.as_str() {
            "ndjson" => {
                registry.register(
                    name.clone(),
                    Arc::new(NdjsonSource::new(source_config.path.clone())),
                );
            }
            other => {
                return Err(ConfigError::UnknownSourceKind {
                    name: name.clone(),
                    kind: other.to_string(),
                });
            }
        }
    }
    Ok(registry)
}

async fn run(args: CliArgs) -> Result<Vec<RunSummary>, PipelineError> {
    let config = Config::from_file(&args.config).await?;

    metrics::init_global(config.metrics.socket_addr()?)?;

    let registry = build_registry(&config)?;
    let collector = Arc::new(MetricsCollector::new(AlertManager::new(
        config.alerts.clone(),
    )));

    let selected: Vec<String> = match &args.source {
        Some(name) => {
            config.source(name)?;
            vec![name.clone()]
        }
        None => config.sources.keys().cloned().collect(),
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    info!(sources = selected.len(), "Starting ingestion");

    let mut handles = Vec::new();
    for name in selected {
        let source_config = config.source(&name)?.clone();
        let source = registry.get(&name)?;
        let destination = Arc::new(LocalDestination::new(
            config.destination.path.clone(),
            &name,
        ));

        let extractor = RateLimitedExtractor::new(source, &name, &source_config);
        let validator = Validator::new(source_config.schema.clone());
        let loader = PartitionedLoader::new(destination, &name, source_config.batch_size);
        let pipeline =
            IngestionPipeline::new(&name, extractor, validator, loader, collector.clone());

        let range = args.range();
        let token = shutdown.clone();
        handles.push(tokio::spawn(
            async move { pipeline.run(range, &token).await },
        ));
    }

    let mut summaries = Vec::new();
    for handle in handles {
        let summary = handle
            .await
            .map_err(|source| PipelineError::TaskJoin { source })?;
        summaries.push(summary);
    }

    Ok(summaries)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    match run(args).await {
        Ok(summaries) => {
            let mut failed = false;
            for summary in &summaries {
                if summary.state == RunState::Failed {
                    failed = true;
                    error!(
                        source = %summary.source,
                        error = summary.error.as_deref().unwrap_or("unknown"),
                        "Run failed"
                    );
                } else {
                    info!(
                        source = %summary.source,
                        extracted = summary.records_extracted,
                        loaded = summary.load.successful_records,
                        failed = summary.load.failed_records,
                        alerts = summary.alerts.len(),
                        "Run succeeded"
                    );
                }
            }
            if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Pipeline failed: {e}");
            ExitCode::FAILURE
        }
    }
}
