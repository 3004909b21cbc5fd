// Sectioned CSV written by the on-device collector (usage.csv)

use std::collections::BTreeMap;

use super::{USAGE_FILE, df, kb_value, xres};
use crate::models::{
    CpuTicks, MemInfo, Parsed, ProcessCommand, ProcessStatus, ShmCounts, SkippedLine, XClient,
};

/// Name the first line must carry; anything else is a foreign file.
pub const GENERATOR: &str = "syte-endurance-stats";

#[derive(Debug, Clone, Default)]
pub struct UsageData {
    pub release: String,
    pub date: String,
    pub uptime: f64,
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
}

type Line<'a> = (usize, &'a str);

/// Parse usage.csv. Only a missing or foreign generator line is an error;
/// everything else degrades to skipped lines and zero values.
pub fn parse(text: &str) -> Result<Parsed<UsageData>, String> {
    let blocks = split_blocks(text);
    let Some(first) = blocks.first() else {
        return Err("file is empty".into());
    };
    let (_, generator) = first[0];
    let tokens: Vec<&str> = generator.split_whitespace().collect();
    if tokens.len() < 3 || tokens[0] != "generator" || tokens[2] != GENERATOR {
        return Err(format!("not generated by {GENERATOR}: '{generator}'"));
    }

    let mut data = UsageData::default();
    let mut skipped = Vec::new();

    for line in &first[1..] {
        preamble_line(&mut data, *line, &mut skipped);
    }

    for block in &blocks[1..] {
        let (lineno, header) = block[0];
        let rows = &block[1..];
        if is_preamble(header) {
            for line in block {
                preamble_line(&mut data, *line, &mut skipped);
            }
        } else if header.starts_with("Uptime") {
            data.uptime = parse_uptime(rows, &mut skipped);
        } else if header.starts_with("MemTotal") {
            data.memory = parse_meminfo(header, rows, &mut skipped);
        } else if header.starts_with("nr_free_pages") {
            data.vmstat = parse_vmstat(header, rows, &mut skipped);
        } else if header.starts_with("Shared memory segments") {
            data.shm = parse_shm(rows, &mut skipped);
        } else if header.starts_with("Allocated FDs") {
            data.fd_free = parse_fd_free(rows, &mut skipped);
        } else if header.starts_with("PID,FD count,Command") {
            data.commands = parse_commands(rows, &mut skipped);
        } else if header.starts_with("Name,State,") {
            let (processes, kthreads) = parse_status(header, rows, &mut skipped);
            data.processes = processes;
            data.kthreads = kthreads;
        } else if header.starts_with("Process status:") {
            data.cpu_ticks = parse_pid_stat(rows, &mut skipped);
        } else if header.starts_with("res-base") {
            let parsed = xres::parse_rows(header, rows, USAGE_FILE);
            data.x_clients = parsed.value;
            skipped.extend(parsed.skipped);
        } else if header.starts_with("Filesystem") {
            let parsed = df::parse_rows(rows, ',', USAGE_FILE);
            data.mounts = parsed.value;
            skipped.extend(parsed.skipped);
        } else {
            skipped.push(SkippedLine::new(
                USAGE_FILE,
                lineno,
                format!("unknown section '{header}'"),
            ));
        }
    }

    Ok(Parsed::new(data, skipped))
}

fn split_blocks(text: &str) -> Vec<Vec<Line<'_>>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push((i + 1, line));
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn is_preamble(line: &str) -> bool {
    line.starts_with("SW") || line.starts_with("date = ")
}

fn preamble_line(data: &mut UsageData, (lineno, line): Line<'_>, skipped: &mut Vec<SkippedLine>) {
    if let Some(date) = line.strip_prefix("date = ") {
        data.date = date.trim().to_string();
    } else if line.starts_with("SW") {
        data.release = line.to_string();
    } else {
        skipped.push(SkippedLine::new(USAGE_FILE, lineno, "unexpected preamble line"));
    }
}

fn parse_uptime(rows: &[Line<'_>], skipped: &mut Vec<SkippedLine>) -> f64 {
    match rows.first() {
        Some(&(lineno, row)) => match row.split(',').next().map(|v| v.trim().parse::<f64>()) {
            Some(Ok(v)) => v,
            _ => {
                skipped.push(SkippedLine::new(USAGE_FILE, lineno, "invalid uptime value"));
                0.0
            }
        },
        None => 0.0,
    }
}

fn parse_meminfo(header: &str, rows: &[Line<'_>], skipped: &mut Vec<SkippedLine>) -> MemInfo {
    let Some(&(lineno, values)) = rows.first() else {
        return MemInfo::default();
    };
    let mut mem: BTreeMap<&str, u64> = BTreeMap::new();
    for (key, value) in header.split(',').zip(values.split(',')) {
        let key = key.trim().trim_end_matches(':');
        match kb_value(value) {
            Some(v) => {
                mem.insert(key, v);
            }
            None => skipped.push(SkippedLine::new(
                USAGE_FILE,
                lineno,
                format!("invalid meminfo value for {key}"),
            )),
        }
    }
    let get = |k: &str| mem.get(k).copied().unwrap_or(0);

    let ram_total = get("MemTotal");
    let ram_free = get("MemFree") + get("Buffers") + get("Cached") + get("SReclaimable");
    let swap_total = get("SwapTotal");
    let swap_free = get("SwapFree");
    MemInfo {
        ram_total,
        ram_free,
        ram_used: ram_total.saturating_sub(ram_free),
        swap_total,
        swap_free,
        swap_used: swap_total.saturating_sub(swap_free),
    }
}

fn parse_vmstat(
    header: &str,
    rows: &[Line<'_>],
    skipped: &mut Vec<SkippedLine>,
) -> BTreeMap<String, u64> {
    let Some(&(lineno, values)) = rows.first() else {
        return BTreeMap::new();
    };
    let keys = header.trim_end_matches(':').split(',');
    let mut vmstat = BTreeMap::new();
    for (key, value) in keys.zip(values.split(',')) {
        match value.trim().parse() {
            Ok(v) => {
                vmstat.insert(key.trim().to_string(), v);
            }
            Err(_) => skipped.push(SkippedLine::new(
                USAGE_FILE,
                lineno,
                format!("invalid vmstat value for {key}"),
            )),
        }
    }
    vmstat
}

fn parse_shm(rows: &[Line<'_>], skipped: &mut Vec<SkippedLine>) -> ShmCounts {
    let mut counts = ShmCounts::default();
    let Some((&(lineno, columns), rows)) = rows.split_first() else {
        return counts;
    };
    let Some(nattch) = columns.split(',').position(|c| c.trim() == "nattch") else {
        skipped.push(SkippedLine::new(
            USAGE_FILE,
            lineno,
            "shared memory header has no 'nattch' column",
        ));
        return counts;
    };
    for &(lineno, row) in rows {
        match row.split(',').nth(nattch).map(|v| v.trim().parse::<u64>()) {
            Some(Ok(n)) if n > 1 => counts.normal += 1,
            Some(Ok(_)) => counts.orphan += 1,
            _ => skipped.push(SkippedLine::new(USAGE_FILE, lineno, "invalid nattch value")),
        }
    }
    counts
}

fn parse_fd_free(rows: &[Line<'_>], skipped: &mut Vec<SkippedLine>) -> u64 {
    let Some(&(lineno, row)) = rows.first() else {
        return 0;
    };
    let values: Vec<Option<u64>> = row.split(',').map(|v| v.trim().parse().ok()).collect();
    match values.as_slice() {
        [Some(used), Some(free), Some(total), ..] => total.saturating_sub(*used) + free,
        _ => {
            skipped.push(SkippedLine::new(USAGE_FILE, lineno, "expected used,free,total"));
            0
        }
    }
}

fn parse_commands(
    rows: &[Line<'_>],
    skipped: &mut Vec<SkippedLine>,
) -> BTreeMap<u32, ProcessCommand> {
    let mut commands = BTreeMap::new();
    for &(lineno, row) in rows {
        let mut cols = row.splitn(3, ',');
        let pid = cols.next().and_then(|p| p.trim().parse::<u32>().ok());
        let fd_count = cols.next().and_then(|c| c.trim().parse::<u64>().ok());
        let (Some(pid), Some(fd_count)) = (pid, fd_count) else {
            skipped.push(SkippedLine::new(USAGE_FILE, lineno, "expected pid,fdcount,cmdline"));
            continue;
        };
        let cmdline = cols.next().unwrap_or("");
        let first = cmdline.split(' ').next().unwrap_or("");
        let name = first.rsplit('/').next().unwrap_or(first).to_string();
        commands.insert(pid, ProcessCommand { name, fd_count });
    }
    commands
}

type StatusTables = (BTreeMap<u32, ProcessStatus>, BTreeMap<u32, String>);

fn parse_status(header: &str, rows: &[Line<'_>], skipped: &mut Vec<SkippedLine>) -> StatusTables {
    let mut processes = BTreeMap::new();
    let mut kthreads = BTreeMap::new();

    let fields: Vec<&str> = header
        .split(',')
        .map(|f| f.split(':').next().unwrap_or(f).trim())
        .collect();
    let idx = |name: &str| fields.iter().position(|f| *f == name);
    let (Some(pid_idx), Some(name_idx)) = (idx("Pid"), idx("Name")) else {
        if let Some(&(lineno, _)) = rows.first() {
            skipped.push(SkippedLine::new(
                USAGE_FILE,
                lineno.saturating_sub(1),
                "process status header lacks Pid or Name",
            ));
        }
        return (processes, kthreads);
    };
    let ppid_idx = idx("PPid");
    let threads_idx = idx("Threads");
    let size_idx = idx("VmSize");
    let rss_idx = idx("VmRSS");

    for &(lineno, row) in rows {
        let info: Vec<&str> = row.split(',').collect();
        let Some(pid) = info.get(pid_idx).and_then(|p| p.trim().parse::<u32>().ok()) else {
            skipped.push(SkippedLine::new(USAGE_FILE, lineno, "invalid pid"));
            continue;
        };
        let name = info.get(name_idx).copied().unwrap_or("").to_string();
        // kernel threads and zombies lack the memory columns
        if info.len() < fields.len() {
            kthreads.insert(pid, name);
            continue;
        }
        let num = |i: Option<usize>| {
            i.and_then(|i| info.get(i))
                .and_then(|v| kb_value(v))
                .unwrap_or(0)
        };
        processes.insert(
            pid,
            ProcessStatus {
                pid,
                name,
                ppid: num(ppid_idx) as u32,
                threads: num(threads_idx),
                vm_size: num(size_idx),
                vm_rss: num(rss_idx),
            },
        );
    }
    (processes, kthreads)
}

fn parse_pid_stat(rows: &[Line<'_>], skipped: &mut Vec<SkippedLine>) -> BTreeMap<u32, CpuTicks> {
    let mut ticks = BTreeMap::new();
    for &(lineno, row) in rows {
        let cols: Vec<&str> = row.split(',').collect();
        let pid = cols.first().and_then(|p| p.trim().parse::<u32>().ok());
        let utime = cols.get(13).and_then(|v| v.trim().parse::<u64>().ok());
        let stime = cols.get(14).and_then(|v| v.trim().parse::<u64>().ok());
        match (pid, utime, stime) {
            (Some(pid), Some(utime), Some(stime)) => {
                ticks.insert(pid, CpuTicks { utime, stime });
            }
            _ => skipped.push(SkippedLine::new(USAGE_FILE, lineno, "invalid /proc/PID/stat row")),
        }
    }
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
generator = syte-endurance-stats v2.2.0

SW-version: RELEASE_1.2.3
date = 2024-03-01 12:00:05

Uptime,Idletime (secs)
1000.25,800.00

MemTotal,MemFree,Buffers,Cached,SReclaimable,SwapTotal,SwapFree:
1000 kB,100 kB,50 kB,200 kB,50 kB,512 kB,412 kB

nr_free_pages,pgfault,pgmajfault:
25,1000,7

Shared memory segments:
key,shmid,owner,perms,size,nattch
0,1,root,600,4096,2
0,2,root,600,4096,1
0,3,root,600,4096,0

Allocated FDs,Freed FDs,Max FDs
500,20,10000

PID,FD count,Command
1,12,/sbin/init splash
42,30,/usr/bin/app --opt=a,b

Name,State,Tgid,Pid,PPid,Threads,VmSize,VmRSS:
init,S,1,1,0,1,2000 kB,800 kB
app,S,42,42,1,4,9000 kB,3000 kB
kworker,S,7,7

Process status:
1,(init),S,0,1,1,0,-1,0,0,0,0,0,5,6
42,(app),S,1,42,42,0,-1,0,0,0,0,0,100,50

Mystery section
whatever
";

    #[test]
    fn parses_every_known_section() {
        let parsed = parse(SAMPLE).unwrap();
        let d = parsed.value;
        assert_eq!(d.release, "SW-version: RELEASE_1.2.3");
        assert_eq!(d.date, "2024-03-01 12:00:05");
        assert_eq!(d.uptime, 1000.25);
        assert_eq!(d.memory.ram_free, 400);
        assert_eq!(d.memory.ram_used, 600);
        assert_eq!(d.memory.swap_used, 100);
        assert_eq!(d.vmstat.get("pgmajfault"), Some(&7));
        assert_eq!(d.shm, ShmCounts { normal: 1, orphan: 2 });
        assert_eq!(d.fd_free, 10000 - 500 + 20);
        assert_eq!(d.commands[&42].name, "app");
        assert_eq!(d.processes[&42].vm_size, 9000);
        assert_eq!(d.processes[&42].threads, 4);
        assert_eq!(d.processes[&42].ppid, 1);
        assert_eq!(d.kthreads.get(&7).map(String::as_str), Some("kworker"));
        assert_eq!(d.cpu_ticks[&42], CpuTicks { utime: 100, stime: 50 });
    }

    #[test]
    fn unknown_section_is_recorded_not_fatal() {
        let parsed = parse(SAMPLE).unwrap();
        assert!(
            parsed
                .skipped
                .iter()
                .any(|s| s.reason.contains("Mystery section"))
        );
    }

    #[test]
    fn foreign_generator_is_rejected() {
        let err = parse("generator = something-else v1\n\nSW x\n").unwrap_err();
        assert!(err.contains(GENERATOR));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let text = "generator = syte-endurance-stats v2\n\nPID,FD count,Command\nabc,1,x\n5,3,/bin/sh\n";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.value.commands.len(), 1);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line, 4);
    }
}
