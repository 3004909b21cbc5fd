// Memory cgroup counters dumped with `head /syspart/**/memory.*`

use std::collections::BTreeMap;

use super::{CGROUPS_FILE, numbered_lines};
use crate::models::{CgroupMemory, Parsed, SkippedLine};

/// Headers look like `==> /syspart/applications/memory.usage_in_bytes <==`; the value is on the
/// next line.
/// Group names keep their trailing slash (`/applications/`, root is `/`).
pub fn parse(text: &str) -> Parsed<BTreeMap<String, CgroupMemory>> {
    let mut groups: BTreeMap<String, CgroupMemory> = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut lines = numbered_lines(text).peekable();

    while let Some((lineno, line)) = lines.next() {
        let Some((group, file)) = header(line) else { continue };
        let is_counter = matches!(
            file,
            "memory.usage_in_bytes" | "memory.memsw.usage_in_bytes" | "memory.limit_in_bytes"
        );
        if !is_counter {
            continue;
        }
        let value = match lines.peek() {
            Some((_, next)) if header(next).is_none() => {
                let v = next.trim().parse::<u64>().ok();
                lines.next();
                v
            }
            _ => None,
        };
        let Some(value) = value else {
            skipped.push(SkippedLine::new(
                CGROUPS_FILE,
                lineno,
                format!("missing or invalid value for {file}"),
            ));
            continue;
        };
        let entry = groups.entry(group.to_string()).or_default();
        match file {
            "memory.usage_in_bytes" => entry.usage_bytes = value,
            "memory.memsw.usage_in_bytes" => entry.memsw_usage_bytes = value,
            _ => entry.limit_bytes = value,
        }
    }

    Parsed::new(groups, skipped)
}

/// `(group, file)` from a `==> /syspart<group><file> <==` line.
fn header(line: &str) -> Option<(&str, &str)> {
    let path = line
        .trim()
        .strip_prefix("==> /syspart")?
        .strip_suffix("<==")?
        .trim_end();
    let slash = path.rfind('/')?;
    Some((&path[..=slash], &path[slash + 1..]))
}
