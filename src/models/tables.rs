// Per-file metric records

use std::collections::BTreeMap;

/// System memory from /proc/meminfo, in kB.
/// `ram_free` counts buffers, page cache and reclaimable slab as free.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub ram_total: u64,
    pub ram_free: u64,
    pub ram_used: u64,
    pub swap_total: u64,
    pub swap_free: u64,
    pub swap_used: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShmCounts {
    /// Segments attached to more than one process.
    pub normal: u64,
    /// Segments with at most one attached process.
    pub orphan: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessCommand {
    /// Basename of the first command line token.
    pub name: String,
    pub fd_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStatus {
    pub pid: u32,
    pub name: String,
    pub ppid: u32,
    pub threads: u64,
    pub vm_size: u64,
    pub vm_rss: u64,
}

/// User and system CPU ticks of one process (/proc/PID/stat fields 14 and 15).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub utime: u64,
    pub stime: u64,
}

impl CpuTicks {
    pub fn total(&self) -> u64 {
        self.utime + self.stime
    }
}

/// SMAPS sums for one process, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmapsTotals {
    pub size: u64,
    pub rss: u64,
    pub pss: u64,
    pub swap: u64,
    pub private_dirty: u64,
}

impl SmapsTotals {
    /// Memory only this process can free: private dirty plus swapped out pages.
    pub fn dirty(&self) -> u64 {
        self.private_dirty + self.swap
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmapsCapture {
    pub processes: BTreeMap<u32, SmapsTotals>,
    /// Private dirty kB in executable file mappings, system wide.
    pub private_code: u64,
}

/// Aggregate CPU time from the `cpu` line of /proc/stat, in clock ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle + self.iowait + self.irq + self.softirq
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelCounters {
    pub cpu: Option<CpuTimes>,
    pub interrupts: u64,
    pub context_switches: u64,
    pub forks: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlabCache {
    /// Memory held by the cache's slabs.
    pub size_kb: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CgroupMemory {
    pub usage_bytes: u64,
    pub memsw_usage_bytes: u64,
    pub limit_bytes: u64,
}

/// X server resource usage of one client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XClient {
    /// -1 when the X server could not map the client to a process.
    pub pid: i64,
    /// Pixmap plus misc memory.
    pub total_kb: u64,
    pub resource_count: u64,
}
