// /proc/stat: aggregate CPU time, interrupts, context switches, forks

use super::{STAT_FILE, numbered_lines};
use crate::models::{CpuTimes, KernelCounters, Parsed, SkippedLine};

pub fn parse(text: &str) -> Parsed<KernelCounters> {
    let mut counters = KernelCounters::default();
    let mut skipped = Vec::new();

    for (lineno, line) in numbered_lines(text) {
        let mut fields = line.split_whitespace();
        let Some(key) = fields.next() else { continue };
        match key {
            "cpu" => {
                // steal and guest columns are ignored
                let values: Vec<u64> = fields.take(7).filter_map(|v| v.parse().ok()).collect();
                if let [user, nice, system, idle, iowait, irq, softirq] = values[..] {
                    counters.cpu = Some(CpuTimes {
                        user,
                        nice,
                        system,
                        idle,
                        iowait,
                        irq,
                        softirq,
                    });
                } else {
                    skipped.push(SkippedLine::new(
                        STAT_FILE,
                        lineno,
                        "cpu line has fewer than 7 counters",
                    ));
                }
            }
            "intr" | "ctxt" | "processes" => {
                let Some(value) = fields.next().and_then(|v| v.parse::<u64>().ok()) else {
                    let reason = format!("invalid {key} value");
                    skipped.push(SkippedLine::new(STAT_FILE, lineno, reason));
                    continue;
                };
                match key {
                    "intr" => counters.interrupts = value,
                    "ctxt" => counters.context_switches = value,
                    _ => counters.forks = value,
                }
            }
            _ => {}
        }
    }

    Parsed::new(counters, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_cpu_and_event_counters() {
        let text = "cpu  100 5 50 1000 10 1 2 0 0\ncpu0 100 5 50 1000 10 1 2 0 0\nintr 12345 0 1 2\nctxt 999\nbtime 1700000000\nprocesses 321\n";
        let parsed = parse(text);
        assert!(parsed.skipped.is_empty());
        let k = parsed.value;
        assert_eq!(k.cpu.map(|c| c.total()), Some(1168));
        assert_eq!(k.interrupts, 12345);
        assert_eq!(k.context_switches, 999);
        assert_eq!(k.forks, 321);
    }

    #[test]
    fn short_cpu_line_is_skipped() {
        let parsed = parse("cpu 1 2 3\n");
        assert!(parsed.value.cpu.is_none());
        assert_eq!(parsed.skipped.len(), 1);
    }
}
