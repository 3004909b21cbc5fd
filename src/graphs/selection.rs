// Picks the processes worth plotting

use std::collections::BTreeMap;

use crate::masterdb::MasterDb;
use crate::models::Round;

/// Share of all CPU ticks that makes a process a CPU user.
const CPU_USER_SHARE: f64 = 0.005;
/// A process seen in one round only is shown when its dirty memory exceeds this.
const SINGLE_ROUND_KB: u64 = 1024;
/// Dirty memory changes smaller than this are noise.
const DIRTY_MIN_DIFF_KB: u64 = 16;
/// Average relative change per round that makes memory usage interesting.
const CHANGE_PER_ROUND: f64 = 0.002;

/// A pid whose parent has the same command name and the same VmSize is a thread.
pub fn is_thread(round: &Round, pid: u32) -> bool {
    let Some(status) = round.processes.get(&pid) else {
        return false;
    };
    if status.ppid <= 1 {
        return false;
    }
    let Some(parent) = round.processes.get(&status.ppid) else {
        return false;
    };
    round.process_name(pid) == round.process_name(status.ppid) && status.vm_size == parent.vm_size
}

/// (dirty, size) in kB; SMAPS numbers when captured, VmRSS/VmSize otherwise.
fn memory_sample(round: &Round, pid: u32) -> Option<(u64, u64)> {
    let status = round.processes.get(&pid)?;
    let smaps = round.smaps.as_ref().and_then(|s| s.processes.get(&pid));
    Some(match smaps {
        Some(t) => (t.dirty(), t.size),
        None => (status.vm_rss, status.vm_size),
    })
}

/// Whether `pid` used at least the CPU user share of all ticks between its first
/// non-initial round and its last round.
fn is_cpu_user(db: &MasterDb, pid: u32, rounds: &[usize]) -> bool {
    let Some(&first) = rounds.iter().find(|&&i| i > 0) else {
        return false;
    };
    let Some(&last) = rounds.last() else {
        return false;
    };
    if first >= last {
        return false;
    }
    let (a, b) = (&db.rounds()[first], &db.rounds()[last]);
    let ticks = a.cpu_ticks.get(&pid).zip(b.cpu_ticks.get(&pid));
    let total = a.kernel.and_then(|k| k.cpu).zip(b.kernel.and_then(|k| k.cpu));
    match (ticks, total) {
        (Some((ta, tb)), Some((ca, cb))) if cb.total() > ca.total() => {
            let used = tb.total().saturating_sub(ta.total()) as f64;
            used >= CPU_USER_SHARE * (cb.total() - ca.total()) as f64
        }
        _ => false,
    }
}

/// Pids worth plotting, ascending. Threads never qualify.
pub fn interesting_processes(db: &MasterDb, show_all: bool) -> Vec<u32> {
    // pid -> (round index, dirty, size)
    let mut samples: BTreeMap<u32, Vec<(usize, u64, u64)>> = BTreeMap::new();
    for (i, round) in db.rounds().iter().enumerate() {
        for &pid in round.processes.keys() {
            if is_thread(round, pid) {
                continue;
            }
            if let Some((dirty, size)) = memory_sample(round, pid) {
                samples.entry(pid).or_default().push((i, dirty, size));
            }
        }
    }

    let total_rounds = db.len();
    samples
        .into_iter()
        .filter(|(pid, s)| show_all || is_interesting(db, *pid, s, total_rounds))
        .map(|(pid, _)| pid)
        .collect()
}

fn is_interesting(
    db: &MasterDb,
    pid: u32,
    samples: &[(usize, u64, u64)],
    total_rounds: usize,
) -> bool {
    let rounds: Vec<usize> = samples.iter().map(|s| s.0).collect();
    if is_cpu_user(db, pid, &rounds) {
        return true;
    }
    if let [(_, dirty, _)] = samples {
        return *dirty > SINGLE_ROUND_KB;
    }

    let dirty_max = samples.iter().map(|s| s.1).max().unwrap_or(0);
    let dirty_min = samples.iter().map(|s| s.1).min().unwrap_or(0);
    let size_max = samples.iter().map(|s| s.2).max().unwrap_or(0);
    let size_min = samples.iter().map(|s| s.2).min().unwrap_or(0);
    let changes = samples
        .windows(2)
        .filter(|w| w[0].1 != w[1].1 || w[0].2 != w[1].2)
        .count();

    let n = samples.len() as f64;
    let per_round = |max: u64, min: u64| {
        if max == 0 {
            0.0
        } else {
            (max - min) as f64 / max as f64 / n
        }
    };
    let dirty_diff = dirty_max - dirty_min;

    (dirty_diff >= DIRTY_MIN_DIFF_KB && per_round(dirty_max, dirty_min) > CHANGE_PER_ROUND)
        || per_round(size_max, size_min) > CHANGE_PER_ROUND
        || 2 * changes >= total_rounds
}

/// Keep the `max` candidates with the highest peak value, highest first.
/// Candidates without any value are dropped.
pub fn top_by_peak<K: Ord>(
    candidates: Vec<(K, Vec<Option<f64>>)>,
    max: usize,
) -> Vec<(K, Vec<Option<f64>>)> {
    let mut ranked: Vec<(f64, K, Vec<Option<f64>>)> = candidates
        .into_iter()
        .filter_map(|(k, values)| {
            let peak = values.iter().flatten().copied().reduce(f64::max)?;
            Some((peak, k, values))
        })
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    ranked.truncate(max);
    ranked.into_iter().map(|(_, k, v)| (k, v)).collect()
}
