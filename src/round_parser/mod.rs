// Turns the raw files of one round directory into a typed Round

pub mod cgroups;
pub mod crashes;
pub mod df;
pub mod ifconfig;
pub mod proc_stat;
pub mod slabinfo;
pub mod smaps;
pub mod syslog;
pub mod usage_csv;
pub mod xres;

use tracing::instrument;

use crate::config::SyslogConfig;
use crate::models::{Parsed, Round, SkippedLine};
use crate::snapshot_reader::{ReadError, SnapshotReader};

pub use syslog::SyslogClassifier;

pub const USAGE_FILE: &str = "usage.csv";
pub const STEP_FILE: &str = "step.txt";
pub const SMAPS_FILE: &str = "smaps.cap";
pub const STAT_FILE: &str = "stat";
pub const SLABINFO_FILE: &str = "slabinfo";
pub const IFCONFIG_FILE: &str = "ifconfig";
pub const CGROUPS_FILE: &str = "cgroups";
pub const DF_FILE: &str = "df";
pub const XMEMINFO_FILE: &str = "xmeminfo";
pub const SYSLOG_FILE: &str = "syslog";
pub const RESPAWNED_FILE: &str = "upstart_jobs_respawned";
/// One file per crashed process, holding its core count.
pub const RICH_CORES_DIR: &str = "dsme/rich-cores";

/// Identity files. Copied verbatim (trimmed) into `Round::identity`.
pub const IDENTITY_FILES: [&str; 4] = ["sw_version", "component_version", "hostname", "os-release"];

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("round {dir}: required file {USAGE_FILE} is missing")]
    MissingUsage { dir: String },
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("{file}: {reason}")]
    Malformed { file: String, reason: String },
}

/// Stateless apart from the compiled syslog categories; one instance parses every round of a run.
#[derive(Debug, Clone)]
pub struct RoundParser {
    syslog: SyslogClassifier,
}

impl RoundParser {
    pub fn new(syslog: &SyslogConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            syslog: SyslogClassifier::new(syslog)?,
        })
    }

    #[instrument(skip(self, reader), fields(round = %reader.dirname(), operation = "parse_round"))]
    pub fn parse(&self, reader: &SnapshotReader) -> Result<Round, ParseError> {
        let usage = reader
            .open_text(USAGE_FILE)?
            .ok_or_else(|| ParseError::MissingUsage {
                dir: reader.dirname().to_string(),
            })?;
        let usage = usage_csv::parse(&usage).map_err(|reason| ParseError::Malformed {
            file: format!("{}/{}", reader.dirname(), USAGE_FILE),
            reason,
        })?;
        let mut skipped = usage.skipped;
        let data = usage.value;

        let mut round = Round {
            dirname: reader.dirname().to_string(),
            timestamp: chrono::NaiveDateTime::parse_from_str(&data.date, "%Y-%m-%d %H:%M:%S").ok(),
            date: data.date,
            uptime: data.uptime,
            release: data.release,
            memory: data.memory,
            vmstat: data.vmstat,
            shm: data.shm,
            fd_free: data.fd_free,
            commands: data.commands,
            processes: data.processes,
            kthreads: data.kthreads,
            cpu_ticks: data.cpu_ticks,
            x_clients: data.x_clients,
            mounts: data.mounts,
            ..Round::default()
        };

        if let Some(text) = reader.open_text(STEP_FILE)? {
            let steps: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            round.step = Some(steps);
        }

        if let Some(text) = reader.open_text(SMAPS_FILE)? {
            round.smaps = Some(collect(smaps::parse(&text), &mut skipped));
        }
        if let Some(text) = reader.open_text(STAT_FILE)? {
            round.kernel = Some(collect(proc_stat::parse(&text), &mut skipped));
        }
        if let Some(text) = reader.open_text(SLABINFO_FILE)? {
            round.slabs = collect(slabinfo::parse(&text), &mut skipped);
        }
        if let Some(text) = reader.open_text(IFCONFIG_FILE)? {
            round.transfers = collect(ifconfig::parse(&text), &mut skipped);
        }
        if let Some(text) = reader.open_text(CGROUPS_FILE)? {
            round.cgroups = collect(cgroups::parse(&text), &mut skipped);
        }
        if let Some(text) = reader.open_text(DF_FILE)? {
            round.mounts = collect(df::parse(&text), &mut skipped);
        }
        if let Some(text) = reader.open_text(XMEMINFO_FILE)? {
            round.x_clients = collect(xres::parse(&text), &mut skipped);
        }
        if let Some(text) = reader.open_text(SYSLOG_FILE)? {
            round.syslog_errors = Some(self.syslog.classify(&text));
        }
        if let Some(text) = reader.open_text(RESPAWNED_FILE)? {
            round.respawned_jobs = collect(crashes::parse_respawned(&text), &mut skipped);
        }
        for process in reader.list(RICH_CORES_DIR)? {
            let path = format!("{RICH_CORES_DIR}/{process}");
            if let Some(count) = reader.open_text(&path)?.as_deref().and_then(crashes::core_count) {
                round.crash_counts.insert(process, count);
            }
        }

        for name in IDENTITY_FILES {
            if let Some(text) = reader.open_text(name)? {
                let text = text.trim();
                if !text.is_empty() {
                    round.identity.insert(name.to_string(), text.to_string());
                }
            }
        }

        if !skipped.is_empty() {
            tracing::debug!(skipped = skipped.len(), "lines skipped while parsing");
        }
        round.skipped = skipped;
        Ok(round)
    }
}

fn collect<T>(parsed: Parsed<T>, skipped: &mut Vec<SkippedLine>) -> T {
    skipped.extend(parsed.skipped);
    parsed.value
}

/// Non-empty lines with 1-based line numbers, trailing whitespace removed.
pub(crate) fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end()))
        .filter(|(_, l)| !l.trim().is_empty())
}

/// `"1234 kB"` or `"1234"` as a number.
pub(crate) fn kb_value(s: &str) -> Option<u64> {
    s.trim().trim_end_matches("kB").trim().parse().ok()
}
