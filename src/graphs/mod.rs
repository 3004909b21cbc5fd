// Fixed registry of graph generators and the per-generator failure boundary

mod process;
pub mod selection;
mod system;

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::instrument;

use crate::config::AppConfig;
use crate::masterdb::MasterDb;
use crate::models::{PlotSpec, PlotStyle, RenderCommand, Round, Series};

/// `(MasterDb, RenderContext) -> plots`. Generators only read the MasterDb.
pub type GeneratorFn = fn(&MasterDb, &RenderContext) -> anyhow::Result<Vec<PlotSpec>>;

#[derive(Clone, Copy)]
pub struct Generator {
    /// Stable identity used in logs and failure reports.
    pub id: &'static str,
    pub run: GeneratorFn,
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator").field("id", &self.id).finish()
    }
}

pub const REGISTRY: &[Generator] = &[
    Generator {
        id: "private_dirty",
        run: process::private_dirty,
    },
    Generator {
        id: "pss",
        run: process::pss,
    },
    Generator {
        id: "rss",
        run: process::rss,
    },
    Generator {
        id: "vm_size",
        run: process::vm_size,
    },
    Generator {
        id: "fd_count",
        run: process::fd_count,
    },
    Generator {
        id: "threads",
        run: process::threads,
    },
    Generator {
        id: "cpu_usage",
        run: process::cpu_usage,
    },
    Generator {
        id: "x_resources",
        run: process::x_resources,
    },
    Generator {
        id: "system_memory",
        run: system::system_memory,
    },
    Generator {
        id: "cpu_load",
        run: system::cpu_load,
    },
    Generator {
        id: "kernel_events",
        run: system::kernel_events,
    },
    Generator {
        id: "network_traffic",
        run: system::network_traffic,
    },
    Generator {
        id: "file_descriptors",
        run: system::file_descriptors,
    },
    Generator {
        id: "shared_memory",
        run: system::shared_memory,
    },
    Generator {
        id: "filesystem_usage",
        run: system::filesystem_usage,
    },
    Generator {
        id: "page_faults",
        run: system::page_faults,
    },
    Generator {
        id: "slab_caches",
        run: system::slab_caches,
    },
    Generator {
        id: "process_count",
        run: system::process_count,
    },
    Generator {
        id: "syslog_errors",
        run: system::syslog_errors,
    },
    Generator {
        id: "cgroup_memory",
        run: system::cgroup_memory,
    },
    Generator {
        id: "private_code",
        run: system::private_code,
    },
    Generator {
        id: "process_crashes",
        run: system::process_crashes,
    },
    Generator {
        id: "respawned_jobs",
        run: system::respawned_jobs,
    },
];

/// Most x axis labels a plot gets; longer runs label every n-th round.
const MAX_XTICS: usize = 40;
/// Longest software or device name put into a plot subtitle.
const LABEL_MAX_BYTES: usize = 80;

/// Shared plot layout, computed once per run.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub width: u32,
    pub height: u32,
    /// Label printed on every plot (software version and device), already escaped for a
    /// double-quoted gnuplot string.
    pub subtitle: String,
    pub xtics: Vec<(usize, String)>,
    pub show_all_processes: bool,
    pub max_processes: usize,
    /// Syslog category name to its configured description.
    pub syslog_labels: BTreeMap<String, String>,
}

impl RenderContext {
    pub fn new(db: &MasterDb, config: &AppConfig) -> Self {
        let dirnames = db.dirnames();
        let every = dirnames.len().div_ceil(MAX_XTICS).max(1);
        let xtics = dirnames
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % every == 0)
            .collect();
        let lookup = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| db.metadata_lookup(key, LABEL_MAX_BYTES))
        };
        let subtitle = match (
            lookup(&["sw_version", "release"]),
            lookup(&["hostname", "component_version"]),
        ) {
            (Some(software), Some(hardware)) => format!("{software} on {hardware}"),
            (Some(one), None) | (None, Some(one)) => one,
            (None, None) => String::new(),
        };
        let syslog_labels = config
            .syslog
            .categories
            .iter()
            .filter(|c| !c.description.trim().is_empty())
            .map(|c| (c.name.clone(), c.description.trim().to_string()))
            .collect();
        Self {
            width: plot_width(db.len()),
            height: config.render.plot_height,
            subtitle,
            xtics,
            show_all_processes: config.parsing.show_all_processes,
            max_processes: config.parsing.max_processes_per_graph,
            syslog_labels,
        }
    }

    /// Series label for a syslog category: its description, else its name.
    pub fn syslog_label(&self, category: &str) -> String {
        self.syslog_labels
            .get(category)
            .cloned()
            .unwrap_or_else(|| category.to_string())
    }

    pub fn command(
        &self,
        title: &str,
        ylabel: &str,
        style: PlotStyle,
        series: Vec<Series>,
    ) -> RenderCommand {
        let points = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
        RenderCommand {
            title: title.to_string(),
            subtitle: self.subtitle.clone(),
            ylabel: ylabel.to_string(),
            style,
            y_min: Some(0.0),
            y_max: None,
            width: self.width,
            height: self.height,
            points,
            xtics: self.xtics.clone(),
            series,
        }
    }

    /// PlotSpec with a per-series JSON summary. `None` when every series is empty.
    pub fn plot(
        &self,
        key: &str,
        legend: &str,
        ylabel: &str,
        style: PlotStyle,
        series: Vec<Series>,
    ) -> Option<PlotSpec> {
        let series: Vec<Series> = series
            .into_iter()
            .filter(|s| s.values.iter().any(Option::is_some))
            .collect();
        if series.is_empty() {
            return None;
        }
        let summary = summarize(&series);
        Some(PlotSpec {
            key: key.to_string(),
            legend: legend.to_string(),
            command: self.command(legend, ylabel, style, series),
            summary: Some(summary),
        })
    }
}

/// Horizontal size grows with the round count, bounded on both ends.
pub fn plot_width(rounds: usize) -> u32 {
    (rounds.saturating_mul(13).saturating_add(200)).clamp(1000, 1900) as u32
}

/// `{label: {first, last, change, min, max}}`
pub fn summarize(series: &[Series]) -> Value {
    let mut map = Map::new();
    for s in series {
        let change = s.first().zip(s.last()).map(|(first, last)| last - first);
        map.insert(
            s.label.clone(),
            json!({
                "first": s.first(),
                "last": s.last(),
                "change": change,
                "min": s.min(),
                "max": s.max(),
            }),
        );
    }
    Value::Object(map)
}

/// One value per round.
pub(crate) fn per_round(db: &MasterDb, f: impl Fn(&Round) -> Option<f64>) -> Vec<Option<f64>> {
    db.rounds().iter().map(f).collect()
}

/// Change per interval; index 0 and intervals where the counter went backwards are `None`.
pub(crate) fn per_interval(
    db: &MasterDb,
    f: impl Fn(&Round) -> Option<f64>,
) -> Vec<Option<f64>> {
    let values = per_round(db, f);
    let mut out = vec![None; values.len()];
    for i in 1..values.len() {
        if let (Some(prev), Some(cur)) = (values[i - 1], values[i])
            && cur >= prev
        {
            out[i] = Some(cur - prev);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorFailure {
    pub id: &'static str,
    pub error: String,
}

/// Run one generator, turning both errors and panics into a [`GeneratorFailure`].
pub fn run_generator(
    generator: &Generator,
    db: &MasterDb,
    ctx: &RenderContext,
) -> Result<Vec<PlotSpec>, GeneratorFailure> {
    match catch_unwind(AssertUnwindSafe(|| (generator.run)(db, ctx))) {
        Ok(Ok(plots)) => Ok(plots),
        Ok(Err(e)) => Err(GeneratorFailure {
            id: generator.id,
            error: format!("{e:#}"),
        }),
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".into());
            Err(GeneratorFailure {
                id: generator.id,
                error: format!("panicked: {msg}"),
            })
        }
    }
}

/// Run every generator in order and hand each plot to `emit`.
/// A failing generator is logged and skipped; its partial output is discarded.
#[instrument(skip_all, fields(operation = "run_generators", generators = generators.len()))]
pub fn run_generators(
    generators: &[Generator],
    db: &MasterDb,
    ctx: &RenderContext,
    mut emit: impl FnMut(PlotSpec),
) -> Vec<GeneratorFailure> {
    let mut failures = Vec::new();
    for generator in generators {
        match run_generator(generator, db, ctx) {
            Ok(plots) => {
                tracing::debug!(generator = generator.id, plots = plots.len(), "generator done");
                for plot in plots {
                    emit(plot);
                }
            }
            Err(failure) => {
                tracing::warn!(
                    generator = failure.id,
                    error = %failure.error,
                    "generator failed, output discarded"
                );
                failures.push(failure);
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_is_clamped() {
        assert_eq!(plot_width(2), 1000);
        assert_eq!(plot_width(70), 1110);
        assert_eq!(plot_width(500), 1900);
    }

    #[test]
    fn registry_ids_are_unique() {
        for (i, g) in REGISTRY.iter().enumerate() {
            assert!(REGISTRY[..i].iter().all(|o| o.id != g.id), "duplicate {}", g.id);
        }
    }

    #[test]
    fn summary_reports_change() {
        let s = Series::new("a", vec![None, Some(10.0), Some(4.0), Some(16.0)]);
        let v = summarize(&[s]);
        assert_eq!(v["a"]["first"], json!(10.0));
        assert_eq!(v["a"]["change"], json!(6.0));
        assert_eq!(v["a"]["min"], json!(4.0));
    }
}
