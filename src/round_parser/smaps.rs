// Concatenated /proc/PID/smaps capture (smaps.cap)

use super::{SMAPS_FILE, kb_value, numbered_lines};
use crate::models::{Parsed, SkippedLine, SmapsCapture};

pub fn parse(text: &str) -> Parsed<SmapsCapture> {
    let mut capture = SmapsCapture::default();
    let mut skipped = Vec::new();
    let mut pid: Option<u32> = None;
    // whether the mapping being summed is file backed executable code
    let mut code = false;

    for (lineno, line) in numbered_lines(text) {
        if line.starts_with("==>") {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            if let Some(p) = rest.strip_prefix("Pid:") {
                match p.trim().parse::<u32>() {
                    Ok(p) => {
                        capture.processes.entry(p).or_default();
                        pid = Some(p);
                        code = false;
                    }
                    Err(_) => {
                        pid = None;
                        skipped.push(SkippedLine::new(SMAPS_FILE, lineno, "invalid pid marker"));
                    }
                }
            }
            continue;
        }
        let Some(current) = pid else {
            skipped.push(SkippedLine::new(SMAPS_FILE, lineno, "line before any #Pid marker"));
            continue;
        };

        if let Some(perms) = mapping_perms(line) {
            let path = line.split_whitespace().nth(5);
            code = perms.as_bytes().get(2) == Some(&b'x')
                && path.is_some_and(|p| p.starts_with('/'));
            continue;
        }

        let Some((field, value)) = line.split_once(':') else {
            skipped.push(SkippedLine::new(SMAPS_FILE, lineno, "unrecognised line"));
            continue;
        };
        let totals = capture.processes.entry(current).or_default();
        let slot: Option<&mut u64> = match field {
            "Size" => Some(&mut totals.size),
            "Rss" => Some(&mut totals.rss),
            "Pss" => Some(&mut totals.pss),
            "Swap" => Some(&mut totals.swap),
            "Private_Dirty" => Some(&mut totals.private_dirty),
            _ => None,
        };
        let Some(slot) = slot else {
            // other smaps fields (Shared_Clean, Referenced, VmFlags, ...) are not needed
            continue;
        };
        match kb_value(value) {
            Some(kb) => {
                *slot += kb;
                if field == "Private_Dirty" && code {
                    capture.private_code += kb;
                }
            }
            None => skipped.push(SkippedLine::new(
                SMAPS_FILE,
                lineno,
                format!("invalid {field} value"),
            )),
        }
    }

    Parsed::new(capture, skipped)
}

/// Permission column of a mapping line (`start-end perms offset dev inode [path]`).
fn mapping_perms(line: &str) -> Option<&str> {
    let mut tokens = line.split_whitespace();
    let range = tokens.next()?;
    let (start, end) = range.split_once('-')?;
    let is_hex = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit());
    if !is_hex(start) || !is_hex(end) {
        return None;
    }
    tokens.next().filter(|p| p.len() == 4)
}
