// Generator registry tests: key partitioning, independence, failure isolation

use endurance_report::config::AppConfig;
use endurance_report::graphs::{self, Generator, REGISTRY, RenderContext};
use endurance_report::masterdb::MasterDb;
use endurance_report::models::{
    CgroupMemory, CpuTicks, CpuTimes, KernelCounters, MemInfo, PlotScope, PlotSpec,
    ProcessCommand, ProcessStatus, Round, XClient,
};
use std::collections::BTreeMap;

fn round(i: usize, uptime: f64, rss: u64) -> Round {
    let mut r = Round {
        dirname: format!("{i:03}"),
        date: format!("2024-03-01 12:{i:02}:00"),
        uptime,
        memory: MemInfo {
            ram_total: 100_000,
            ram_free: 40_000 - i as u64 * 100,
            ram_used: 60_000 + i as u64 * 100,
            ..MemInfo::default()
        },
        fd_free: 9000,
        kernel: Some(KernelCounters {
            cpu: Some(CpuTimes {
                user: 100 * i as u64,
                system: 50 * i as u64,
                idle: 1000 * i as u64,
                ..CpuTimes::default()
            }),
            interrupts: 500 * i as u64,
            context_switches: 900 * i as u64,
            forks: 10 * i as u64,
        }),
        ..Round::default()
    };
    r.identity.insert("sw_version".into(), "RELEASE_1".into());
    r.commands.insert(
        42,
        ProcessCommand {
            name: "app".into(),
            fd_count: 10 + i as u64,
        },
    );
    r.processes.insert(
        42,
        ProcessStatus {
            pid: 42,
            name: "app".into(),
            ppid: 1,
            threads: 4,
            vm_size: 9000,
            vm_rss: rss,
        },
    );
    r.cpu_ticks.insert(
        42,
        CpuTicks {
            utime: 20 * i as u64,
            stime: 5 * i as u64,
        },
    );
    r
}

fn db() -> MasterDb {
    MasterDb::assemble(vec![
        round(0, 100.0, 3000),
        round(1, 400.0, 3500),
        round(2, 700.0, 4200),
    ])
    .unwrap()
}

fn ctx(db: &MasterDb) -> RenderContext {
    let mut config = AppConfig::default();
    config.parsing.show_all_processes = true;
    RenderContext::new(db, &config)
}

fn collect(generators: &[Generator], db: &MasterDb, ctx: &RenderContext) -> Vec<PlotSpec> {
    let mut plots = Vec::new();
    let failures = graphs::run_generators(generators, db, ctx, |p| plots.push(p));
    assert!(failures.is_empty(), "unexpected failures: {failures:?}");
    plots
}

fn broken(_: &MasterDb, _: &RenderContext) -> anyhow::Result<Vec<PlotSpec>> {
    anyhow::bail!("series data corrupt")
}

fn panicking(_: &MasterDb, _: &RenderContext) -> anyhow::Result<Vec<PlotSpec>> {
    panic!("index out of range")
}

#[test]
fn registry_ids_are_unique() {
    let mut ids: Vec<_> = REGISTRY.iter().map(|g| g.id).collect();
    ids.sort_unstable();
    let before = ids.len();
    ids.dedup();
    assert_eq!(ids.len(), before);
}

#[test]
fn registry_produces_both_scopes_with_unique_keys() {
    let db = db();
    let plots = collect(REGISTRY, &db, &ctx(&db));
    assert!(plots.iter().any(|p| p.scope() == PlotScope::Process));
    assert!(plots.iter().any(|p| p.scope() == PlotScope::System));
    let mut keys: Vec<_> = plots.iter().map(|p| p.key.clone()).collect();
    keys.sort();
    let before = keys.len();
    keys.dedup();
    assert_eq!(keys.len(), before);
}

#[test]
fn scope_comes_from_key_prefix_only() {
    assert_eq!(PlotScope::of_key("1003_rss"), PlotScope::Process);
    assert_eq!(PlotScope::of_key("2001_memory"), PlotScope::System);
    assert_eq!(PlotScope::of_key("9_other"), PlotScope::System);
}

#[test]
fn plots_carry_shared_layout() {
    let db = db();
    let ctx = ctx(&db);
    let plots = collect(REGISTRY, &db, &ctx);
    for plot in &plots {
        assert_eq!(plot.command.width, 1000);
        assert_eq!(plot.command.height, 600);
        assert_eq!(plot.command.subtitle, "RELEASE_1");
        assert_eq!(plot.command.points, 3);
    }
}

#[test]
fn rss_plot_follows_process_values() {
    let db = db();
    let plots = collect(REGISTRY, &db, &ctx(&db));
    let rss = plots.iter().find(|p| p.key.starts_with("1003")).expect("rss plot");
    let series = &rss.command.series[0];
    assert_eq!(series.label, "app[42]");
    assert_eq!(series.values, vec![Some(3000.0), Some(3500.0), Some(4200.0)]);
    assert!(rss.summary.is_some());
}

#[test]
fn removing_a_generator_leaves_others_identical() {
    let db = db();
    let ctx = ctx(&db);
    let all = collect(REGISTRY, &db, &ctx);

    let removed = REGISTRY
        .iter()
        .position(|g| g.id == "rss")
        .expect("rss generator registered");
    let mut fewer: Vec<Generator> = REGISTRY.to_vec();
    let gone = fewer.remove(removed);
    let own = collect(&[gone], &db, &ctx);
    assert!(!own.is_empty());

    let rest = collect(&fewer, &db, &ctx);
    assert_eq!(rest.len(), all.len() - own.len());
    let expected: Vec<&PlotSpec> = all.iter().filter(|p| !own.contains(p)).collect();
    let actual: Vec<&PlotSpec> = rest.iter().collect();
    assert_eq!(actual, expected);
}

#[test]
fn failing_generators_are_isolated() {
    let db = db();
    let ctx = ctx(&db);
    let baseline = collect(REGISTRY, &db, &ctx);

    let mut generators = vec![
        Generator { id: "broken", run: broken },
        Generator { id: "panicking", run: panicking },
    ];
    generators.extend_from_slice(REGISTRY);

    let mut plots = Vec::new();
    let failures = graphs::run_generators(&generators, &db, &ctx, |p| plots.push(p));
    assert_eq!(plots, baseline);
    let ids: Vec<_> = failures.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec!["broken", "panicking"]);
    assert!(failures[0].error.contains("series data corrupt"));
    assert!(failures[1].error.contains("index out of range"));
}

#[test]
fn plot_width_is_clamped() {
    assert_eq!(graphs::plot_width(2), 1000);
    assert_eq!(graphs::plot_width(100), 1500);
    assert_eq!(graphs::plot_width(1000), 1900);
}

fn plot<'a>(plots: &'a [PlotSpec], key: &str) -> &'a PlotSpec {
    plots
        .iter()
        .find(|p| p.key == key)
        .unwrap_or_else(|| panic!("{key} plot"))
}

fn labels(plot: &PlotSpec) -> Vec<&str> {
    plot.command.series.iter().map(|s| s.label.as_str()).collect()
}

fn db_with(edit: impl Fn(usize, &mut Round)) -> MasterDb {
    let rounds = (0..3)
        .map(|i| {
            let mut r = round(i, 100.0 + 300.0 * i as f64, 3000);
            edit(i, &mut r);
            r
        })
        .collect();
    MasterDb::assemble(rounds).unwrap()
}

#[test]
fn repeated_syslog_message_stays_flat() {
    let db = db_with(|_, r| {
        r.syslog_errors = Some(BTreeMap::from([("kernel/oom".to_string(), 1)]));
    });
    let plots = collect(REGISTRY, &db, &ctx(&db));
    let syslog = plot(&plots, "2011_syslog_errors");
    assert_eq!(labels(syslog), vec!["Processes killed by the OOM killer"]);
    assert_eq!(syslog.command.series[0].values, vec![Some(1.0); 3]);
}

#[test]
fn syslog_category_without_description_keeps_its_name() {
    let db = db_with(|_, r| {
        r.syslog_errors = Some(BTreeMap::from([("custom/event".to_string(), 2)]));
    });
    let plots = collect(REGISTRY, &db, &ctx(&db));
    assert_eq!(labels(plot(&plots, "2011_syslog_errors")), vec!["custom/event"]);
}

#[test]
fn crash_and_respawn_plots_show_new_events_per_round() {
    let db = db_with(|i, r| {
        let (browser, camera, mce) = [(1, 0, 2), (1, 2, 5), (3, 2, 1)][i];
        r.crash_counts.insert("browser".into(), browser);
        if camera > 0 {
            r.crash_counts.insert("camera".into(), camera);
        }
        r.respawned_jobs.insert("mce".into(), mce);
    });
    let plots = collect(REGISTRY, &db, &ctx(&db));

    let crashes = plot(&plots, "2014_process_crashes");
    assert_eq!(labels(crashes), vec!["browser", "camera"]);
    assert_eq!(crashes.command.series[0].values, vec![None, Some(0.0), Some(2.0)]);
    assert_eq!(crashes.command.series[1].values, vec![None, Some(2.0), Some(0.0)]);

    // a counter that went backwards adds nothing
    let respawns = plot(&plots, "2015_respawned_jobs");
    assert_eq!(respawns.command.series[0].values, vec![None, Some(3.0), Some(0.0)]);
}

#[test]
fn cgroup_plots_use_swap_and_limit_counters() {
    const MIB: u64 = 1024 * 1024;
    let db = db_with(|_, r| {
        r.cgroups.insert(
            "/".into(),
            CgroupMemory {
                usage_bytes: 300 * MIB,
                memsw_usage_bytes: 0,
                limit_bytes: 9_223_372_036_854_771_712,
            },
        );
        r.cgroups.insert(
            "/applications/".into(),
            CgroupMemory {
                usage_bytes: 100 * MIB,
                memsw_usage_bytes: 150 * MIB,
                limit_bytes: 400 * MIB,
            },
        );
    });
    let plots = collect(REGISTRY, &db, &ctx(&db));

    let usage = plot(&plots, "2012_cgroup_memory");
    assert_eq!(
        labels(usage),
        vec!["/", "/applications/", "/applications/ incl. swap"]
    );
    assert_eq!(usage.command.series[2].values, vec![Some(150.0); 3]);

    let share = plot(&plots, "2016_cgroup_limit_usage");
    assert_eq!(labels(share), vec!["/applications/"]);
    assert_eq!(share.command.series[0].values, vec![Some(25.0); 3]);
}

#[test]
fn x_resource_count_gets_its_own_plot() {
    let db = db_with(|i, r| {
        r.x_clients.insert(
            "duihome".into(),
            XClient {
                pid: 1227,
                total_kb: 2000,
                resource_count: 10 + i as u64,
            },
        );
    });
    let plots = collect(REGISTRY, &db, &ctx(&db));
    let count = plot(&plots, "1009_x_resource_count");
    assert_eq!(count.command.series[0].values, vec![Some(10.0), Some(11.0), Some(12.0)]);
    assert!(plots.iter().any(|p| p.key == "1008_x_resources"));
}

#[test]
fn subtitle_is_truncated_and_escaped() {
    let db = db_with(|i, r| {
        if i == 0 {
            r.identity.insert("sw_version".into(), "RELEASE \"beta\"".into());
        }
        r.identity.insert("hostname".into(), "h".repeat(200));
    });
    let ctx = ctx(&db);
    assert_eq!(ctx.subtitle, format!("RELEASE \\\"beta\\\" on {}", "h".repeat(80)));
}
