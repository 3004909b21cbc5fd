// Cumulative crash counters: dsme rich-core counts and upstart job respawns

use std::collections::BTreeMap;

use super::{RESPAWNED_FILE, numbered_lines};
use crate::models::{Parsed, SkippedLine};

/// Core count file of one process: the count is the first line. Non-positive or unreadable
/// counts mean no crash was recorded.
pub fn core_count(text: &str) -> Option<u64> {
    let count: i64 = text.lines().next()?.trim().parse().ok()?;
    u64::try_from(count).ok().filter(|c| *c > 0)
}

/// Rows look like `<job>: <count>`; jobs with a zero count are left out.
pub fn parse_respawned(text: &str) -> Parsed<BTreeMap<String, u64>> {
    let mut jobs = BTreeMap::new();
    let mut skipped = Vec::new();

    for (lineno, line) in numbered_lines(text) {
        match respawn_row(line) {
            Some((_, 0)) => {}
            Some((job, count)) => {
                jobs.insert(job.to_string(), count);
            }
            None => {
                skipped.push(SkippedLine::new(RESPAWNED_FILE, lineno, "expected 'job: count'"));
            }
        }
    }

    Parsed::new(jobs, skipped)
}

fn respawn_row(line: &str) -> Option<(&str, u64)> {
    let (head, tail) = line.split_once(": ")?;
    let job = head.split_whitespace().next_back()?;
    let digits = tail.trim_start();
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    Some((job, digits[..end].parse().ok()?))
}
