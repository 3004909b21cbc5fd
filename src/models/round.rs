// One parsed snapshot directory

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::tables::{
    CgroupMemory, CpuTicks, KernelCounters, MemInfo, ProcessCommand, ProcessStatus, ShmCounts,
    SlabCache, SmapsCapture, XClient,
};

/// A line a file grammar could not use. Recorded instead of failing the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub file: String,
    /// 1-based line number within the decompressed file.
    pub line: usize,
    pub reason: String,
}

impl SkippedLine {
    pub fn new(file: &str, line: usize, reason: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            line,
            reason: reason.into(),
        }
    }
}

/// Output of a single file grammar: the record plus whatever it had to skip.
#[derive(Debug, Clone, Default)]
pub struct Parsed<T> {
    pub value: T,
    pub skipped: Vec<SkippedLine>,
}

impl<T> Parsed<T> {
    pub fn new(value: T, skipped: Vec<SkippedLine>) -> Self {
        Self { value, skipped }
    }
}

/// One round of an endurance run. Built once by the round parser, never mutated afterwards.
///
/// Tables are keyed by their natural key (pid, slab name, mount point, ...).
/// Numeric values are kB unless the field name says otherwise.
#[derive(Debug, Clone, Default)]
pub struct Round {
    /// Trailing path segment of the snapshot directory.
    pub dirname: String,
    /// Capture date as written by the collector.
    pub date: String,
    pub timestamp: Option<NaiveDateTime>,
    /// Use-case step description, one entry per line of `step.txt`.
    pub step: Option<Vec<String>>,
    /// Seconds since boot.
    pub uptime: f64,
    /// Software release line from the usage data preamble.
    pub release: String,
    /// Raw content of identity files (`sw_version`, `component_version`, ...).
    pub identity: BTreeMap<String, String>,
    pub memory: MemInfo,
    pub vmstat: BTreeMap<String, u64>,
    pub shm: ShmCounts,
    pub fd_free: u64,
    pub commands: BTreeMap<u32, ProcessCommand>,
    pub processes: BTreeMap<u32, ProcessStatus>,
    pub kthreads: BTreeMap<u32, String>,
    pub cpu_ticks: BTreeMap<u32, CpuTicks>,
    pub x_clients: BTreeMap<String, XClient>,
    pub mounts: BTreeMap<String, u64>,
    pub smaps: Option<SmapsCapture>,
    pub kernel: Option<KernelCounters>,
    pub slabs: BTreeMap<String, SlabCache>,
    /// Bytes received + transmitted per network interface.
    pub transfers: BTreeMap<String, u64>,
    pub cgroups: BTreeMap<String, CgroupMemory>,
    /// Syslog line counts per configured category; `None` when no syslog was captured.
    pub syslog_errors: Option<BTreeMap<String, u64>>,
    /// Cumulative core dump count per crashed process.
    pub crash_counts: BTreeMap<String, u64>,
    /// Cumulative respawn count per upstart job.
    pub respawned_jobs: BTreeMap<String, u64>,
    pub skipped: Vec<SkippedLine>,
}

impl Round {
    /// Display name for a pid: command name from the FD table, else the status name.
    pub fn process_name(&self, pid: u32) -> Option<&str> {
        self.commands
            .get(&pid)
            .map(|c| c.name.as_str())
            .filter(|n| !n.is_empty())
            .or_else(|| self.processes.get(&pid).map(|p| p.name.as_str()))
    }
}
