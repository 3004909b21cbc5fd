#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Result;
use clap::Parser;
use endurance_report::config::{AppConfig, Backend};
use endurance_report::masterdb::readable_duration;
use endurance_report::{pipeline, version};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[derive(Parser)]
#[command(name = "endurance-report")]
#[command(about = "Render graphs and an index from endurance run snapshot rounds")]
#[command(version = version::VERSION)]
struct Cli {
    /// Round directories, in chronological order
    #[arg(required = true)]
    rounds: Vec<PathBuf>,

    /// TOML configuration file (defaults to $CONFIG_FILE, then built-in defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for images and indexes
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of render workers
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Renderer backend; gd is the fallback when cairo is unstable
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Plot every process, not only the ones that changed
    #[arg(long)]
    show_all: bool,

    /// Keep the generated render command files
    #[arg(long)]
    debug: bool,

    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(dir) = &self.output {
            config.output.directory = dir.clone();
        }
        if let Some(jobs) = self.jobs {
            config.render.workers = jobs;
        }
        if let Some(backend) = self.backend {
            config.render.backend = backend;
        }
        config.parsing.show_all_processes |= self.show_all;
        config.render.keep_command_files |= self.debug;
        config.validate()
    }

    fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(match self.verbose {
                0 => "warn,endurance_report=info",
                1 => "info",
                2 => "debug",
                _ => "trace",
            })
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(cli.log_filter())
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config)?;

    let summary = pipeline::run(&cli.rounds, &config).await?;

    println!("Rounds processed: {}", summary.rounds_processed);
    if !summary.rounds_skipped.is_empty() {
        println!("Rounds skipped: {}", summary.rounds_skipped.join(", "));
    }
    if summary.duration >= 0.0 {
        println!("Duration: {}", readable_duration(summary.duration));
    } else {
        println!("Duration: unknown, the device rebooted during the run");
    }
    println!(
        "Round interval: avg {:.0}s, min {:.0}s, max {:.0}s",
        summary.interval.avg, summary.interval.min, summary.interval.max
    );
    for reboot in &summary.reboots {
        println!("Reboot before round {}", reboot.dirname);
    }
    println!(
        "Plots rendered: {} ({} failed jobs, {} failed generators)",
        summary.plots_rendered,
        summary.jobs_failed.len(),
        summary.generators_failed.len()
    );
    let index = summary.output.join(endurance_report::report::HTML_INDEX);
    println!("Report: {}", index.display());
    Ok(())
}
