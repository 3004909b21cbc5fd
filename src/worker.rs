// Rendering worker pool: fixed set of workers draining a shared job queue.
// Each worker runs the external renderer and thumbnailer as child processes and reports
// per-job outcomes over a channel.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::config::{Backend, RenderConfig};
use crate::models::PlotSpec;
use crate::render;

/// Queue depth per worker before `submit` waits.
const QUEUE_PER_WORKER: usize = 4;

/// Renderer and thumbnailer settings shared by every worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub workers: usize,
    pub backend: Backend,
    pub renderer: String,
    pub renderer_args: Vec<String>,
    pub thumbnailer: String,
    pub thumbnailer_args: Vec<String>,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub job_timeout: Duration,
    pub keep_command_files: bool,
}

impl From<&RenderConfig> for WorkerConfig {
    fn from(c: &RenderConfig) -> Self {
        Self {
            workers: c.workers.max(1),
            backend: c.backend,
            renderer: c.renderer.clone(),
            renderer_args: c.renderer_args.clone(),
            thumbnailer: c.thumbnailer.clone(),
            thumbnailer_args: c.thumbnailer_args.clone(),
            thumbnail_width: c.thumbnail_width,
            thumbnail_height: c.thumbnail_height,
            job_timeout: Duration::from_secs(c.job_timeout_secs),
            keep_command_files: c.keep_command_files,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Dispatched,
    Rendered,
    Failed(String),
}

impl JobState {
    fn is_final(&self) -> bool {
        matches!(self, JobState::Rendered | JobState::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct JobEvent {
    pub key: String,
    pub worker: usize,
    pub state: JobState,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("'{program}' did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },
    #[error("expected artifact {} was not produced", path.display())]
    MissingArtifact { path: PathBuf },
    #[error("writing command file {}: {source}", path.display())]
    CommandFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Final outcome of every submitted key.
#[derive(Debug, Default, Clone)]
pub struct PoolReport {
    pub rendered: BTreeSet<String>,
    pub failed: BTreeMap<String, String>,
}

/// Coordinator side of the pool. Jobs are keyed by plot key; a key is never dispatched twice.
pub struct RenderPool {
    out_dir: PathBuf,
    config: Arc<WorkerConfig>,
    job_tx: mpsc::Sender<String>,
    event_rx: mpsc::UnboundedReceiver<JobEvent>,
    workers: Vec<JoinHandle<()>>,
    ledger: BTreeMap<String, JobState>,
}

impl RenderPool {
    /// Starts `config.workers` workers. Must be called inside a tokio runtime.
    pub fn start(out_dir: impl Into<PathBuf>, config: WorkerConfig) -> Self {
        // children run with cwd = out_dir, so paths handed to them must be absolute
        let out_dir = out_dir.into();
        let out_dir = std::path::absolute(&out_dir).unwrap_or(out_dir);
        let config = Arc::new(config);
        let (job_tx, job_rx) = mpsc::channel::<String>(config.workers * QUEUE_PER_WORKER);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let workers = (0..config.workers)
            .map(|id| {
                spawn(
                    id,
                    job_rx.clone(),
                    event_tx.clone(),
                    out_dir.clone(),
                    config.clone(),
                )
            })
            .collect();
        tracing::info!(workers = config.workers, backend = ?config.backend, "render pool started");

        Self {
            out_dir,
            config,
            job_tx,
            event_rx,
            workers,
            ledger: BTreeMap::new(),
        }
    }

    /// Write the plot's command file and queue its key.
    /// Duplicate keys are ignored; a command file that cannot be written fails the job right away.
    pub async fn submit(&mut self, spec: &PlotSpec) {
        self.drain_events();
        if self.ledger.contains_key(&spec.key) {
            tracing::warn!(key = %spec.key, "duplicate plot key, job not submitted again");
            return;
        }

        let image = self.out_dir.join(render::image_name(&spec.key));
        let path = self.out_dir.join(render::command_file_name(&spec.key));
        let text = render::script(&spec.command, self.config.backend, &image);
        if let Err(source) = tokio::fs::write(&path, text).await {
            let e = JobError::CommandFile { path, source };
            tracing::warn!(key = %spec.key, error = %e, "render job failed");
            self.ledger
                .insert(spec.key.clone(), JobState::Failed(e.to_string()));
            return;
        }

        self.ledger.insert(spec.key.clone(), JobState::Queued);
        if self.job_tx.send(spec.key.clone()).await.is_err() {
            tracing::warn!(key = %spec.key, "no render workers left");
            self.ledger.insert(
                spec.key.clone(),
                JobState::Failed("no render workers left".into()),
            );
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            apply_event(&mut self.ledger, event);
        }
    }

    /// Close the queue, wait for every worker to exit, then settle the ledger.
    /// Keys without a final state (worker died mid-job) are reported failed.
    pub async fn finish(self) -> PoolReport {
        let RenderPool {
            job_tx,
            mut event_rx,
            workers,
            mut ledger,
            ..
        } = self;
        drop(job_tx);

        for result in futures_util::future::join_all(workers).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "render worker terminated abnormally");
            }
        }

        while let Some(event) = event_rx.recv().await {
            apply_event(&mut ledger, event);
        }

        let mut report = PoolReport::default();
        for (key, state) in ledger {
            match state {
                JobState::Rendered => {
                    report.rendered.insert(key);
                }
                JobState::Failed(detail) => {
                    report.failed.insert(key, detail);
                }
                JobState::Queued | JobState::Dispatched => {
                    tracing::warn!(key = %key, "render job never completed");
                    report.failed.insert(key, "job never completed".into());
                }
            }
        }
        tracing::info!(
            rendered = report.rendered.len(),
            failed = report.failed.len(),
            "render pool finished"
        );
        report
    }
}

/// Final states are never overwritten; events for unknown keys are ignored.
fn apply_event(ledger: &mut BTreeMap<String, JobState>, event: JobEvent) {
    tracing::trace!(key = %event.key, worker = event.worker, state = ?event.state, "job event");
    if let Some(state) = ledger.get_mut(&event.key)
        && !state.is_final()
    {
        *state = event.state;
    }
}

fn spawn(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<String>>>,
    events: mpsc::UnboundedSender<JobEvent>,
    out_dir: PathBuf,
    config: Arc<WorkerConfig>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let next = { jobs.lock().await.recv().await };
            let Some(key) = next else { break };
            let _ = events.send(JobEvent {
                key: key.clone(),
                worker: id,
                state: JobState::Dispatched,
            });

            let state = match render_job(&out_dir, &config, &key).await {
                Ok(()) => {
                    tracing::debug!(key = %key, worker = id, "rendered");
                    JobState::Rendered
                }
                Err(e) => {
                    tracing::warn!(key = %key, worker = id, error = %e, "render job failed");
                    remove_quietly(&out_dir.join(render::image_name(&key))).await;
                    remove_quietly(&out_dir.join(render::thumbnail_name(&key))).await;
                    JobState::Failed(e.to_string())
                }
            };
            if !config.keep_command_files {
                remove_quietly(&out_dir.join(render::command_file_name(&key))).await;
            }
            let _ = events.send(JobEvent {
                key,
                worker: id,
                state,
            });
        }
        tracing::debug!(worker = id, "render worker exiting");
    })
}

async fn render_job(out_dir: &Path, config: &WorkerConfig, key: &str) -> Result<(), JobError> {
    let command_file = out_dir.join(render::command_file_name(key));
    let image = out_dir.join(render::image_name(key));
    let thumbnail = out_dir.join(render::thumbnail_name(key));
    // artifacts left by an earlier run must not pass the existence checks below
    remove_quietly(&image).await;
    remove_quietly(&thumbnail).await;

    let mut args: Vec<String> = config.renderer_args.clone();
    args.push(command_file.to_string_lossy().into_owned());
    run(&config.renderer, &args, out_dir, config.job_timeout).await?;
    if !tokio::fs::try_exists(&image).await.unwrap_or(false) {
        return Err(JobError::MissingArtifact { path: image });
    }

    let mut args: Vec<String> = config.thumbnailer_args.clone();
    args.extend([
        image.to_string_lossy().into_owned(),
        "-resize".into(),
        format!("{}x{}", config.thumbnail_width, config.thumbnail_height),
        thumbnail.to_string_lossy().into_owned(),
    ]);
    run(&config.thumbnailer, &args, out_dir, config.job_timeout).await?;
    if !tokio::fs::try_exists(&thumbnail).await.unwrap_or(false) {
        return Err(JobError::MissingArtifact { path: thumbnail });
    }
    Ok(())
}

/// Run a child process to completion; it is killed when the timeout fires.
async fn run(
    program: &str,
    args: &[String],
    cwd: &Path,
    timeout: Duration,
) -> Result<(), JobError> {
    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| JobError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| JobError::Spawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(JobError::Timeout {
                program: program.to_string(),
                secs: timeout.as_secs(),
            });
        }
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(JobError::Exit {
            program: program.to_string(),
            status: output.status,
            stderr: stderr.trim().chars().take(500).collect(),
        });
    }
    Ok(())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::debug!(path = %path.display(), error = %e, "could not remove file");
    }
}
