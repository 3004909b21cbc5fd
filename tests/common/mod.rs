// Shared test helpers: round directory fixtures and stand-in renderer tools
#![allow(dead_code)]

use endurance_report::config::{AppConfig, RenderConfig};
use endurance_report::models::{PlotSpec, PlotStyle, RenderCommand, Series};
use endurance_report::worker::WorkerConfig;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Text in a render script that makes the fake renderer fail.
pub const FAIL_MARKER: &str = "FORCE_RENDER_FAILURE";
/// Text in a render script that makes the fake renderer hang.
pub const SLOW_MARKER: &str = "FORCE_RENDER_HANG";

/// Minimal usage.csv the parser accepts: uptime, memory, one app process.
pub fn usage_csv(uptime: f64, date: &str, app_rss_kb: u64) -> String {
    format!(
        "\
generator = syte-endurance-stats v2.2.0
date = {date}

Uptime,Idletime (secs)
{uptime:.2},100.00

MemTotal,MemFree,Buffers,Cached,SReclaimable,SwapTotal,SwapFree:
100000 kB,40000 kB,1000 kB,9000 kB,1000 kB,0 kB,0 kB

Allocated FDs,Freed FDs,Max FDs
500,20,10000

PID,FD count,Command
1,12,/sbin/init
42,30,/usr/bin/app --serve

Name,State,Tgid,Pid,PPid,Threads,VmSize,VmRSS:
init,S,1,1,0,1,2000 kB,800 kB
app,S,42,42,1,4,9000 kB,{app_rss_kb} kB

Process status:
1,(init),S,0,1,1,0,-1,0,0,0,0,0,5,6
42,(app),S,1,42,42,0,-1,0,0,0,0,0,100,50
"
    )
}

pub fn write_file(dir: &Path, name: &str, contents: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), contents).unwrap();
}

/// Write `<name>.gz` holding `contents`.
pub fn write_gz(dir: &Path, name: &str, contents: &str) {
    std::fs::create_dir_all(dir).unwrap();
    let file = std::fs::File::create(dir.join(format!("{name}.gz"))).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(contents.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

/// Round directory `<root>/<name>` with a usage.csv for `uptime`.
pub fn write_round(root: &Path, name: &str, uptime: f64, app_rss_kb: u64) -> PathBuf {
    let dir = root.join(name);
    let minute = (uptime as u64 / 60) % 60;
    write_file(
        &dir,
        "usage.csv",
        &usage_csv(uptime, &format!("2024-03-01 12:{minute:02}:00"), app_rss_kb),
    );
    dir
}

/// Shell scripts standing in for gnuplot and convert.
pub struct FakeTools {
    _dir: TempDir,
    pub renderer: PathBuf,
    pub thumbnailer: PathBuf,
}

pub fn fake_tools() -> FakeTools {
    let dir = TempDir::new().unwrap();
    let renderer = dir.path().join("render.sh");
    std::fs::write(
        &renderer,
        format!(
            "\
script=\"$1\"
if grep -q {FAIL_MARKER} \"$script\"; then echo 'forced failure' >&2; exit 3; fi
if grep -q {SLOW_MARKER} \"$script\"; then sleep 10; fi
out=$(sed -n 's/^set output \"\\(.*\\)\"$/\\1/p' \"$script\")
printf 'PNG' > \"$out\"
"
        ),
    )
    .unwrap();
    let thumbnailer = dir.path().join("thumb.sh");
    std::fs::write(&thumbnailer, "cp \"$1\" \"$4\"\n").unwrap();
    FakeTools {
        _dir: dir,
        renderer,
        thumbnailer,
    }
}

pub fn render_config(tools: &FakeTools) -> RenderConfig {
    RenderConfig {
        renderer: "sh".into(),
        renderer_args: vec![tools.renderer.to_string_lossy().into_owned()],
        thumbnailer: "sh".into(),
        thumbnailer_args: vec![tools.thumbnailer.to_string_lossy().into_owned()],
        job_timeout_secs: 10,
        ..RenderConfig::default()
    }
}

pub fn worker_config(tools: &FakeTools, workers: usize) -> WorkerConfig {
    let mut config = WorkerConfig::from(&render_config(tools));
    config.workers = workers;
    config
}

pub fn worker_config_with_timeout(tools: &FakeTools, timeout: Duration) -> WorkerConfig {
    let mut config = worker_config(tools, 1);
    config.job_timeout = timeout;
    config
}

/// Config writing into `out` with the fake tools as renderer and thumbnailer.
pub fn app_config(tools: &FakeTools, out: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.output.directory = out.to_path_buf();
    config.render = render_config(tools);
    config
}

/// A one-series line plot titled `title`.
pub fn plot_spec(key: &str, title: &str) -> PlotSpec {
    PlotSpec {
        key: key.into(),
        legend: format!("{title} legend"),
        command: RenderCommand {
            title: title.into(),
            subtitle: String::new(),
            ylabel: "kB".into(),
            style: PlotStyle::Lines,
            y_min: Some(0.0),
            y_max: None,
            width: 1000,
            height: 600,
            points: 2,
            xtics: vec![(0, "000".into()), (1, "001".into())],
            series: vec![Series::new("value", vec![Some(1.0), Some(2.0)])],
        },
        summary: None,
    }
}

pub fn exists(dir: &Path, name: &str) -> bool {
    dir.join(name).exists()
}
