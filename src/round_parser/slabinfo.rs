// /proc/slabinfo

use std::collections::BTreeMap;

use super::{SLABINFO_FILE, numbered_lines};
use crate::models::{Parsed, SkippedLine, SlabCache};

const PAGE_KB: u64 = 4;

/// Rows look like
/// `name active_objs num_objs objsize objperslab pagesperslab : tunables .. :
/// slabdata active num shared`.
pub fn parse(text: &str) -> Parsed<BTreeMap<String, SlabCache>> {
    let mut slabs = BTreeMap::new();
    let mut skipped = Vec::new();

    for (lineno, line) in numbered_lines(text) {
        if line.starts_with("slabinfo") || line.starts_with('#') {
            continue;
        }
        match parse_row(line) {
            Some((name, cache)) => {
                slabs.insert(name.to_string(), cache);
            }
            None => skipped.push(SkippedLine::new(SLABINFO_FILE, lineno, "malformed slab row")),
        }
    }

    Parsed::new(slabs, skipped)
}

fn parse_row(line: &str) -> Option<(&str, SlabCache)> {
    let mut parts = line.split(':');
    let head: Vec<&str> = parts.next()?.split_whitespace().collect();
    let slabdata = parts.find_map(|p| p.trim().strip_prefix("slabdata"))?;
    let [name, active, num, objsize, objperslab, pagesperslab] = head[..] else {
        return None;
    };
    // object counters are only checked, the size comes from the slab pages
    for counter in [active, num, objsize, objperslab] {
        counter.parse::<u64>().ok()?;
    }
    let num_slabs: u64 = slabdata.split_whitespace().nth(1)?.parse().ok()?;
    let pagesperslab: u64 = pagesperslab.parse().ok()?;
    Some((
        name,
        SlabCache {
            size_kb: num_slabs * pagesperslab * PAGE_KB,
        },
    ))
}
