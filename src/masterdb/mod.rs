// Ordered, immutable time series of parsed rounds

mod stats;

pub use stats::{interval_stats, readable_duration};

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::instrument;

use crate::models::{IntervalStats, Round};

/// Fewer rounds than this leave nothing to plot.
pub const MIN_ROUNDS: usize = 2;

/// Identity files whose content names the software build.
const SOFTWARE_KEYS: [&str; 1] = ["sw_version"];
/// Identity files whose content names the device.
const HARDWARE_KEYS: [&str; 2] = ["hostname", "component_version"];

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("at least {MIN_ROUNDS} valid rounds are needed, found {found}")]
    TooFewRounds { found: usize },
}

/// Uptime did not increase between round `index - 1` and round `index`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebootAdvisory {
    pub index: usize,
    pub dirname: String,
    pub previous_uptime: f64,
    pub uptime: f64,
}

/// Rounds in caller order. Read-only after [`assemble`](MasterDb::assemble); safe to share
/// between generators.
#[derive(Debug, Clone)]
pub struct MasterDb {
    rounds: Vec<Round>,
    reboots: Vec<RebootAdvisory>,
}

impl MasterDb {
    /// Takes ownership of the rounds in the given order. Reboots are reported, never reordered
    /// or dropped.
    #[instrument(skip_all, fields(operation = "assemble", rounds = rounds.len()))]
    pub fn assemble(rounds: Vec<Round>) -> Result<Self, AssembleError> {
        if rounds.len() < MIN_ROUNDS {
            return Err(AssembleError::TooFewRounds {
                found: rounds.len(),
            });
        }
        let reboots: Vec<RebootAdvisory> = rounds
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[1].uptime <= pair[0].uptime)
            .map(|(i, pair)| RebootAdvisory {
                index: i + 1,
                dirname: pair[1].dirname.clone(),
                previous_uptime: pair[0].uptime,
                uptime: pair[1].uptime,
            })
            .collect();
        for r in &reboots {
            tracing::warn!(
                round = %r.dirname,
                previous_uptime = r.previous_uptime,
                uptime = r.uptime,
                "uptime did not increase, device rebooted before this round"
            );
        }
        Ok(Self { rounds, reboots })
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn reboots(&self) -> &[RebootAdvisory] {
        &self.reboots
    }

    /// Last uptime minus first uptime. Negative when a reboot happened in between.
    pub fn duration(&self) -> f64 {
        match (self.rounds.first(), self.rounds.last()) {
            (Some(first), Some(last)) => last.uptime - first.uptime,
            _ => 0.0,
        }
    }

    /// Seconds between the first and the last capture date that could be parsed. Unlike
    /// [`duration`](Self::duration) this survives reboots.
    pub fn wall_clock(&self) -> Option<f64> {
        let first = self.rounds.iter().find_map(|r| r.timestamp)?;
        let last = self.rounds.iter().rev().find_map(|r| r.timestamp)?;
        Some((last - first).num_seconds() as f64)
    }

    /// Uptime delta of every adjacent pair, `len() - 1` entries.
    pub fn uptime_deltas(&self) -> Vec<f64> {
        self.rounds
            .windows(2)
            .map(|pair| pair[1].uptime - pair[0].uptime)
            .collect()
    }

    pub fn interval_stats(&self) -> IntervalStats {
        interval_stats(&self.uptime_deltas()).unwrap_or(IntervalStats {
            avg: 0.0,
            min: 0.0,
            max: 0.0,
        })
    }

    /// First non-empty value for `key` in any round, cut to `max_bytes` and escaped for use inside
    /// double-quoted label strings.
    ///
    /// `key` is an identity file name, or `release` for the usage data release line.
    pub fn metadata_lookup(&self, key: &str, max_bytes: usize) -> Option<String> {
        let raw = self.rounds.iter().find_map(|r| {
            let value = if key == "release" {
                Some(r.release.as_str())
            } else {
                r.identity.get(key).map(String::as_str)
            };
            value.map(str::trim).filter(|v| !v.is_empty())
        })?;
        Some(escape_label(truncate(raw, max_bytes)))
    }

    /// Distinct software versions across rounds, in first-seen order.
    /// Falls back to the usage data release lines when no round carries `sw_version`.
    pub fn software_version(&self) -> String {
        let versions = self.distinct_identity(&SOFTWARE_KEYS);
        if !versions.is_empty() {
            return versions.join(", ");
        }
        let mut releases: Vec<&str> = Vec::new();
        for r in &self.rounds {
            let release = r.release.trim();
            if !release.is_empty() && !releases.contains(&release) {
                releases.push(release);
            }
        }
        releases.join(", ")
    }

    pub fn hardware_identity(&self) -> String {
        self.distinct_identity(&HARDWARE_KEYS).join(", ")
    }

    fn distinct_identity(&self, keys: &[&str]) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for key in keys {
            for r in &self.rounds {
                if let Some(value) = r.identity.get(*key) {
                    let value = value.lines().map(str::trim).collect::<Vec<_>>().join(" ");
                    if !value.is_empty() && !seen.contains(&value) {
                        seen.push(value);
                    }
                }
            }
        }
        seen
    }

    /// Best display name per pid: the first command name seen in any round, else the status name.
    pub fn process_names(&self) -> BTreeMap<u32, String> {
        let mut names: BTreeMap<u32, String> = BTreeMap::new();
        for r in &self.rounds {
            for (pid, status) in &r.processes {
                names.entry(*pid).or_insert_with(|| status.name.clone());
            }
        }
        let mut from_commands: BTreeMap<u32, String> = BTreeMap::new();
        for r in &self.rounds {
            for (pid, cmd) in &r.commands {
                if !cmd.name.is_empty() {
                    from_commands.entry(*pid).or_insert_with(|| cmd.name.clone());
                }
            }
        }
        names.extend(from_commands);
        names
    }

    pub fn dirnames(&self) -> Vec<String> {
        self.rounds.iter().map(|r| r.dirname.clone()).collect()
    }

    pub fn dates(&self) -> Vec<String> {
        self.rounds.iter().map(|r| r.date.clone()).collect()
    }

    pub fn steps(&self) -> Vec<Option<Vec<String>>> {
        self.rounds.iter().map(|r| r.step.clone()).collect()
    }
}

fn truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn escape_label(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}
