// System-wide plots (keys 2xxx)

use std::collections::{BTreeMap, BTreeSet};

use super::{RenderContext, per_interval, per_round};
use crate::masterdb::MasterDb;
use crate::models::{CpuTimes, KernelCounters, PlotSpec, PlotStyle, Round, Series};

const MAX_SLABS: usize = 10;

type Plots = anyhow::Result<Vec<PlotSpec>>;

/// Limits at or above this are the kernel's "unlimited" value rounded down to a page.
const UNLIMITED_BYTES: u64 = 1 << 62;

fn mb(kb: u64) -> f64 {
    kb as f64 / 1024.0
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn limited(limit: u64) -> Option<u64> {
    (limit > 0 && limit < UNLIMITED_BYTES).then_some(limit)
}

/// New occurrences per round of a cumulative per-name counter. A name absent from the previous
/// round starts from zero; a counter that went backwards adds nothing.
fn growth(
    db: &MasterDb,
    table: fn(&Round) -> &BTreeMap<String, u64>,
    name: &str,
) -> Vec<Option<f64>> {
    let rounds = db.rounds();
    let mut out = vec![None; rounds.len()];
    for i in 1..rounds.len() {
        let prev = table(&rounds[i - 1]).get(name).copied().unwrap_or(0);
        let cur = table(&rounds[i]).get(name).copied().unwrap_or(0);
        out[i] = Some(cur.saturating_sub(prev) as f64);
    }
    out
}

/// Union of table keys over all rounds, sorted.
fn keys_of<'a, I>(db: &'a MasterDb, keys: impl Fn(&'a Round) -> I) -> BTreeSet<String>
where
    I: Iterator<Item = &'a String>,
{
    db.rounds().iter().flat_map(keys).cloned().collect()
}

pub fn system_memory(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let series = vec![
        Series::new("RAM used", per_round(db, |r| Some(mb(r.memory.ram_used)))),
        Series::new("RAM free", per_round(db, |r| Some(mb(r.memory.ram_free)))),
        Series::new("Swap used", per_round(db, |r| Some(mb(r.memory.swap_used)))),
    ];
    Ok(ctx
        .plot("2001_system_memory", "System memory usage", "MB", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

pub fn cpu_load(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let total = per_interval(db, |r| r.kernel?.cpu.map(|c| c.total() as f64));
    let share = |label: &str, f: fn(&CpuTimes) -> u64| {
        let part = per_interval(db, |r| r.kernel?.cpu.as_ref().map(|c| f(c) as f64));
        let values = part
            .iter()
            .zip(&total)
            .map(|(p, t)| match (p, t) {
                (Some(p), Some(t)) if *t > 0.0 => Some(100.0 * p / t),
                _ => None,
            })
            .collect();
        Series::new(label, values)
    };
    let series = vec![
        share("system", |c: &CpuTimes| c.system + c.irq + c.softirq),
        share("user", |c: &CpuTimes| c.user),
        share("nice", |c: &CpuTimes| c.nice),
        share("iowait", |c: &CpuTimes| c.iowait),
        share("idle", |c: &CpuTimes| c.idle),
    ];
    let mut plots: Vec<PlotSpec> = ctx
        .plot("2002_cpu_load", "System CPU load", "%", PlotStyle::Stacked, series)
        .into_iter()
        .collect();
    for p in &mut plots {
        p.command.y_max = Some(100.0);
    }
    Ok(plots)
}

pub fn kernel_events(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let uptime = per_interval(db, |r| Some(r.uptime));
    let rate = |label: &str, f: fn(&KernelCounters) -> u64| {
        let diff = per_interval(db, |r| r.kernel.as_ref().map(|k| f(k) as f64));
        let values = diff
            .iter()
            .zip(&uptime)
            .map(|(d, secs)| match (d, secs) {
                (Some(d), Some(s)) if *s > 0.0 => Some(d / s),
                _ => None,
            })
            .collect();
        Series::new(label, values)
    };
    let series = vec![
        rate("interrupts/s", |k: &KernelCounters| k.interrupts),
        rate("context switches/s", |k: &KernelCounters| k.context_switches),
        rate("forks/s", |k: &KernelCounters| k.forks),
    ];
    Ok(ctx
        .plot("2003_kernel_events", "Kernel events", "events per second", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

pub fn network_traffic(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let series = keys_of(db, |r| r.transfers.keys())
        .into_iter()
        .map(|iface| {
            let values = per_interval(db, |r| r.transfers.get(&iface).map(|b| *b as f64 / 1024.0));
            Series::new(iface, values)
        })
        .collect();
    Ok(ctx
        .plot("2004_network_traffic", "Network traffic per round", "kB", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

pub fn file_descriptors(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let series = vec![Series::new("free FDs", per_round(db, |r| Some(r.fd_free as f64)))];
    Ok(ctx
        .plot("2005_file_descriptors", "Free file descriptors", "count", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

pub fn shared_memory(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let series = vec![
        Series::new("normal segments", per_round(db, |r| Some(r.shm.normal as f64))),
        Series::new("orphan segments", per_round(db, |r| Some(r.shm.orphan as f64))),
    ];
    Ok(ctx
        .plot("2006_shared_memory", "Shared memory segments", "count", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

pub fn filesystem_usage(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let series = keys_of(db, |r| r.mounts.keys())
        .into_iter()
        .map(|mount| {
            let values = per_round(db, |r| r.mounts.get(&mount).map(|kb| mb(*kb)));
            Series::new(mount, values)
        })
        .collect();
    Ok(ctx
        .plot("2007_filesystem_usage", "Filesystem usage", "MB used", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

pub fn page_faults(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let fault = |label: &str, key: &'static str| {
        Series::new(label, per_interval(db, |r| r.vmstat.get(key).map(|v| *v as f64)))
    };
    let series = vec![fault("minor+major faults", "pgfault"), fault("major faults", "pgmajfault")];
    Ok(ctx
        .plot("2008_page_faults", "Page faults per round", "count", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

pub fn slab_caches(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let mut peaks: Vec<(u64, String)> = keys_of(db, |r| r.slabs.keys())
        .into_iter()
        .map(|name| {
            let peak = db
                .rounds()
                .iter()
                .filter_map(|r| r.slabs.get(&name).map(|s| s.size_kb))
                .max()
                .unwrap_or(0);
            (peak, name)
        })
        .collect();
    peaks.sort_by(|a, b| b.cmp(a));
    let series = peaks
        .into_iter()
        .take(MAX_SLABS)
        .map(|(_, name)| {
            let values = per_round(db, |r| r.slabs.get(&name).map(|s| s.size_kb as f64));
            Series::new(name, values)
        })
        .collect();
    Ok(ctx
        .plot("2009_slab_caches", "Largest slab caches", "kB", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

pub fn process_count(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let series = vec![
        Series::new("processes", per_round(db, |r| Some(r.processes.len() as f64))),
        Series::new("kernel threads", per_round(db, |r| Some(r.kthreads.len() as f64))),
    ];
    Ok(ctx
        .plot("2010_process_count", "Process count", "count", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

/// Each round's syslog capture already holds every earlier message, so the raw count is plotted.
pub fn syslog_errors(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let categories = keys_of(db, |r| r.syslog_errors.iter().flat_map(|m| m.keys()));
    let series = categories
        .into_iter()
        .map(|category| {
            let values = per_round(db, |r| {
                r.syslog_errors
                    .as_ref()
                    .map(|m| m.get(&category).copied().unwrap_or(0) as f64)
            });
            Series::new(ctx.syslog_label(&category), values)
        })
        .collect();
    Ok(ctx
        .plot("2011_syslog_errors", "Syslog errors", "messages", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

pub fn cgroup_memory(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let groups = keys_of(db, |r| r.cgroups.keys());
    let mut series = Vec::new();
    for group in &groups {
        let usage = per_round(db, |r| r.cgroups.get(group).map(|c| mib(c.usage_bytes)));
        series.push(Series::new(group.clone(), usage));
        // kernels without swap accounting leave the memsw counter out
        let with_swap = per_round(db, |r| {
            let c = r.cgroups.get(group)?;
            (c.memsw_usage_bytes > 0).then(|| mib(c.memsw_usage_bytes))
        });
        series.push(Series::new(format!("{group} incl. swap"), with_swap));
    }
    let usage = ctx.plot(
        "2012_cgroup_memory",
        "Memory usage per cgroup",
        "MB",
        PlotStyle::Lines,
        series,
    );

    let series = groups
        .iter()
        .map(|group| {
            let values = per_round(db, |r| {
                let c = r.cgroups.get(group)?;
                limited(c.limit_bytes).map(|limit| 100.0 * c.usage_bytes as f64 / limit as f64)
            });
            Series::new(group.clone(), values)
        })
        .collect();
    let share = ctx.plot(
        "2016_cgroup_limit_usage",
        "Cgroup memory usage of its limit",
        "%",
        PlotStyle::Lines,
        series,
    );
    Ok(usage.into_iter().chain(share).collect())
}

pub fn private_code(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let series = vec![Series::new(
        "dirty code pages",
        per_round(db, |r| r.smaps.as_ref().map(|s| s.private_code as f64)),
    )];
    Ok(ctx
        .plot("2013_private_code", "Private dirty code pages", "kB", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

pub fn process_crashes(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let series = keys_of(db, |r| r.crash_counts.keys())
        .into_iter()
        .map(|process| {
            let values = growth(db, |r| &r.crash_counts, &process);
            Series::new(process, values)
        })
        .collect();
    Ok(ctx
        .plot("2014_process_crashes", "New process crashes", "core dumps", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

pub fn respawned_jobs(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let series = keys_of(db, |r| r.respawned_jobs.keys())
        .into_iter()
        .map(|job| {
            let values = growth(db, |r| &r.respawned_jobs, &job);
            Series::new(job, values)
        })
        .collect();
    Ok(ctx
        .plot("2015_respawned_jobs", "Respawned upstart jobs", "respawns", PlotStyle::Lines, series)
        .into_iter()
        .collect())
}
