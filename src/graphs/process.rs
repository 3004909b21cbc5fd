// Per-process plots (keys 1xxx)

use std::collections::BTreeSet;

use super::selection::{interesting_processes, top_by_peak};
use super::{RenderContext, per_round};
use crate::masterdb::MasterDb;
use crate::models::{PlotSpec, PlotStyle, Round, Series, XClient};

/// Clock ticks per second of /proc/PID/stat counters.
const TICKS_PER_SEC: f64 = 100.0;

type Plots = anyhow::Result<Vec<PlotSpec>>;

/// Plot the selected processes, one series per process, using `values(pid)`.
fn process_plot(
    db: &MasterDb,
    ctx: &RenderContext,
    key: &str,
    legend: &str,
    ylabel: &str,
    values: impl Fn(u32) -> Vec<Option<f64>>,
) -> Plots {
    let names = db.process_names();
    let candidates = interesting_processes(db, ctx.show_all_processes)
        .into_iter()
        .map(|pid| (pid, values(pid)))
        .collect();
    let series = top_by_peak(candidates, ctx.max_processes)
        .into_iter()
        .map(|(pid, v)| {
            let name = names.get(&pid).map(String::as_str).unwrap_or("?");
            Series::new(format!("{name}[{pid}]"), v)
        })
        .collect();
    Ok(ctx
        .plot(key, legend, ylabel, PlotStyle::Lines, series)
        .into_iter()
        .collect())
}

fn metric(
    db: &MasterDb,
    f: fn(&Round, u32) -> Option<u64>,
) -> impl Fn(u32) -> Vec<Option<f64>> + '_ {
    move |pid| per_round(db, |r| f(r, pid).map(|v| v as f64))
}

pub fn private_dirty(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let dirty = |r: &Round, pid: u32| r.smaps.as_ref()?.processes.get(&pid).map(|t| t.dirty());
    process_plot(
        db,
        ctx,
        "1001_private_dirty",
        "Process private dirty memory (incl. swap)",
        "kB",
        metric(db, dirty),
    )
}

pub fn pss(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let pss = |r: &Round, pid: u32| r.smaps.as_ref()?.processes.get(&pid).map(|t| t.pss);
    process_plot(db, ctx, "1002_pss", "Process proportional set size", "kB", metric(db, pss))
}

pub fn rss(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let rss = |r: &Round, pid: u32| r.processes.get(&pid).map(|p| p.vm_rss);
    process_plot(db, ctx, "1003_rss", "Process resident set size", "kB", metric(db, rss))
}

pub fn vm_size(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let size = |r: &Round, pid: u32| r.processes.get(&pid).map(|p| p.vm_size);
    process_plot(db, ctx, "1004_vm_size", "Process virtual memory size", "kB", metric(db, size))
}

pub fn fd_count(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let fds = |r: &Round, pid: u32| r.commands.get(&pid).map(|c| c.fd_count);
    process_plot(
        db,
        ctx,
        "1005_fd_count",
        "Process open file descriptors",
        "count",
        metric(db, fds),
    )
}

pub fn threads(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let threads = |r: &Round, pid: u32| r.processes.get(&pid).map(|p| p.threads);
    process_plot(db, ctx, "1006_threads", "Process thread count", "count", metric(db, threads))
}

/// CPU % per interval from utime+stime tick deltas.
pub fn cpu_usage(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let rounds = db.rounds();
    let usage = |pid: u32| {
        let mut out = vec![None; rounds.len()];
        for i in 1..rounds.len() {
            let (prev, cur) = (&rounds[i - 1], &rounds[i]);
            let secs = cur.uptime - prev.uptime;
            if secs <= 0.0 {
                continue;
            }
            if let (Some(a), Some(b)) = (prev.cpu_ticks.get(&pid), cur.cpu_ticks.get(&pid))
                && b.total() >= a.total()
            {
                out[i] = Some(100.0 * (b.total() - a.total()) as f64 / (TICKS_PER_SEC * secs));
            }
        }
        out
    };
    process_plot(db, ctx, "1007_cpu_usage", "Process CPU usage", "%", usage)
}

/// X clients are keyed by identifier, not pid.
fn x_client_plot(
    db: &MasterDb,
    ctx: &RenderContext,
    key: &str,
    legend: &str,
    ylabel: &str,
    f: fn(&XClient) -> u64,
) -> Option<PlotSpec> {
    let clients: BTreeSet<&String> = db
        .rounds()
        .iter()
        .flat_map(|r| r.x_clients.keys())
        .collect();
    let candidates = clients
        .into_iter()
        .map(|name| {
            let values = per_round(db, |r| r.x_clients.get(name).map(|c| f(c) as f64));
            (name.clone(), values)
        })
        .collect();
    let series = top_by_peak(candidates, ctx.max_processes)
        .into_iter()
        .map(|(name, values)| Series::new(name, values))
        .collect();
    ctx.plot(key, legend, ylabel, PlotStyle::Lines, series)
}

pub fn x_resources(db: &MasterDb, ctx: &RenderContext) -> Plots {
    let memory = x_client_plot(
        db,
        ctx,
        "1008_x_resources",
        "X resource memory per client",
        "kB",
        |c| c.total_kb,
    );
    let count = x_client_plot(
        db,
        ctx,
        "1009_x_resource_count",
        "X resource count per client",
        "count",
        |c| c.resource_count,
    );
    Ok(memory.into_iter().chain(count).collect())
}
