// Run coordinator: parse rounds, assemble, generate plots, render them, write the report.
// Only the failures listed in PipelineError end a run; anything below that tier is logged and
// skipped.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::instrument;

use crate::config::AppConfig;
use crate::graphs::{self, Generator, GeneratorFailure, RenderContext};
use crate::masterdb::{AssembleError, MasterDb, RebootAdvisory};
use crate::models::{IntervalStats, PlotSpec, Round};
use crate::report::{self, PlotEntry, ReportError};
use crate::round_parser::RoundParser;
use crate::snapshot_reader::SnapshotReader;
use crate::worker::{RenderPool, WorkerConfig};

/// Plots buffered between the generator stage and job submission.
const PLOT_QUEUE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("at least {} valid rounds are needed, found {found}", crate::masterdb::MIN_ROUNDS)]
    TooFewRounds { found: usize },
    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Internal(String),
}

impl From<AssembleError> for PipelineError {
    fn from(e: AssembleError) -> Self {
        match e {
            AssembleError::TooFewRounds { found } => PipelineError::TooFewRounds { found },
        }
    }
}

impl From<ReportError> for PipelineError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::Write { path, source } => PipelineError::WriteOutput { path, source },
            e @ ReportError::Serialize(_) => PipelineError::Internal(e.to_string()),
        }
    }
}

/// What the run did, printed by the binary at exit.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output: PathBuf,
    pub rounds_processed: usize,
    /// Directory names of rounds that failed to parse.
    pub rounds_skipped: Vec<String>,
    /// Last minus first uptime; negative after a reboot.
    pub duration: f64,
    pub interval: IntervalStats,
    pub plots_rendered: usize,
    pub jobs_failed: Vec<String>,
    pub generators_failed: Vec<GeneratorFailure>,
    pub reboots: Vec<RebootAdvisory>,
}

/// Parse every directory in order. Rounds that fail are logged and left out.
pub fn parse_rounds(
    dirs: &[PathBuf],
    config: &AppConfig,
) -> Result<(Vec<Round>, Vec<String>), PipelineError> {
    let parser = RoundParser::new(&config.syslog)
        .map_err(|e| PipelineError::Internal(format!("syslog patterns: {e}")))?;
    let mut rounds = Vec::with_capacity(dirs.len());
    let mut skipped = Vec::new();
    for dir in dirs {
        let reader = SnapshotReader::new(dir, &config.parsing);
        match parser.parse(&reader) {
            Ok(round) => {
                if !round.skipped.is_empty() {
                    tracing::debug!(
                        round = %round.dirname,
                        lines = round.skipped.len(),
                        "skipped unrecognized lines"
                    );
                }
                rounds.push(round);
            }
            Err(e) => {
                tracing::warn!(round = %reader.dirname(), error = %e, "round excluded");
                skipped.push(reader.dirname().to_string());
            }
        }
    }
    tracing::info!(parsed = rounds.len(), skipped = skipped.len(), "rounds parsed");
    Ok((rounds, skipped))
}

pub async fn run(dirs: &[PathBuf], config: &AppConfig) -> Result<RunSummary, PipelineError> {
    run_with_generators(dirs, config, graphs::REGISTRY).await
}

/// [`run`] with an explicit generator list.
#[instrument(
    skip_all,
    fields(operation = "pipeline", rounds = dirs.len(), generators = generators.len())
)]
pub async fn run_with_generators(
    dirs: &[PathBuf],
    config: &AppConfig,
    generators: &[Generator],
) -> Result<RunSummary, PipelineError> {
    let (rounds, rounds_skipped) = {
        let dirs = dirs.to_vec();
        let config = config.clone();
        tokio::task::spawn_blocking(move || parse_rounds(&dirs, &config))
            .await
            .map_err(|e| PipelineError::Internal(format!("parser task: {e}")))??
    };

    // nothing is written before this point
    let db = Arc::new(MasterDb::assemble(rounds)?);

    let out_dir = config.output.directory.clone();
    create_output_dir(&out_dir).await?;

    let ctx = RenderContext::new(&db, config);
    let (plot_tx, mut plot_rx) = mpsc::channel::<PlotSpec>(PLOT_QUEUE);
    let producer = {
        let db = db.clone();
        let generators = generators.to_vec();
        tokio::task::spawn_blocking(move || {
            graphs::run_generators(&generators, &db, &ctx, |plot| {
                if plot_tx.blocking_send(plot).is_err() {
                    tracing::warn!("plot consumer gone, dropping plot");
                }
            })
        })
    };

    let mut pool = RenderPool::start(&out_dir, WorkerConfig::from(&config.render));
    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    while let Some(plot) = plot_rx.recv().await {
        pool.submit(&plot).await;
        if seen.insert(plot.key.clone()) {
            entries.push(PlotEntry::from(&plot));
        }
    }
    let generators_failed = producer
        .await
        .map_err(|e| PipelineError::Internal(format!("generator task: {e}")))?;
    let outcome = pool.finish().await;

    let rendered: Vec<PlotEntry> = entries
        .into_iter()
        .filter(|e| outcome.rendered.contains(&e.key))
        .collect();
    report::write_report(&out_dir, &db, &config.output.title, &rendered)?;

    let summary = RunSummary {
        output: out_dir,
        rounds_processed: db.len(),
        rounds_skipped,
        duration: db.duration(),
        interval: db.interval_stats(),
        plots_rendered: rendered.len(),
        jobs_failed: outcome.failed.into_keys().collect(),
        generators_failed,
        reboots: db.reboots().to_vec(),
    };
    tracing::info!(
        rounds = summary.rounds_processed,
        plots = summary.plots_rendered,
        jobs_failed = summary.jobs_failed.len(),
        generators_failed = summary.generators_failed.len(),
        "run complete"
    );
    Ok(summary)
}

async fn create_output_dir(path: &Path) -> Result<(), PipelineError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| PipelineError::OutputDir {
            path: path.to_path_buf(),
            source,
        })
}
