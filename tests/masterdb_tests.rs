// MasterDb tests: assembly, reboot advisories, derived run metadata

use endurance_report::masterdb::{AssembleError, MasterDb};
use endurance_report::models::{ProcessCommand, ProcessStatus, Round};

fn round(dirname: &str, uptime: f64) -> Round {
    Round {
        dirname: dirname.into(),
        date: format!("2024-03-01 {dirname}"),
        uptime,
        ..Round::default()
    }
}

fn with_identity(mut r: Round, key: &str, value: &str) -> Round {
    r.identity.insert(key.into(), value.into());
    r
}

#[test]
fn fewer_than_two_rounds_is_rejected() {
    let err = MasterDb::assemble(vec![round("000", 10.0)]).unwrap_err();
    assert!(matches!(err, AssembleError::TooFewRounds { found: 1 }));
    assert!(matches!(
        MasterDb::assemble(Vec::new()),
        Err(AssembleError::TooFewRounds { found: 0 })
    ));
}

#[test]
fn duration_and_interval_from_uptime() {
    let db = MasterDb::assemble(vec![round("000", 1000.0), round("001", 1500.0)]).unwrap();
    assert_eq!(db.duration(), 500.0);
    let stats = db.interval_stats();
    assert_eq!((stats.avg, stats.min, stats.max), (500.0, 500.0, 500.0));
    assert!(db.reboots().is_empty());
}

#[test]
fn uneven_intervals() {
    let db = MasterDb::assemble(vec![
        round("000", 100.0),
        round("001", 400.0),
        round("002", 500.0),
    ])
    .unwrap();
    assert_eq!(db.uptime_deltas(), vec![300.0, 100.0]);
    let stats = db.interval_stats();
    assert_eq!(stats.avg, 200.0);
    assert_eq!(stats.min, 100.0);
    assert_eq!(stats.max, 300.0);
}

#[test]
fn reboot_is_flagged_and_no_round_dropped() {
    let db = MasterDb::assemble(vec![
        round("000", 1000.0),
        round("001", 900.0),
        round("002", 1300.0),
    ])
    .unwrap();
    assert_eq!(db.len(), 3);
    assert_eq!(db.dirnames(), vec!["000", "001", "002"]);
    assert_eq!(db.reboots().len(), 1);
    let advisory = &db.reboots()[0];
    assert_eq!(advisory.index, 1);
    assert_eq!(advisory.dirname, "001");
    assert_eq!(advisory.previous_uptime, 1000.0);
    // computed from the sequence as given
    assert_eq!(db.duration(), 300.0);
}

#[test]
fn equal_uptime_counts_as_reboot() {
    let db = MasterDb::assemble(vec![round("000", 700.0), round("001", 700.0)]).unwrap();
    assert_eq!(db.reboots().len(), 1);
    assert_eq!(db.reboots()[0].dirname, "001");
}

#[test]
fn negative_duration_is_reported_raw() {
    let db = MasterDb::assemble(vec![round("000", 5000.0), round("001", 60.0)]).unwrap();
    assert!(db.duration() < 0.0);
}

#[test]
fn software_version_is_deduplicated() {
    let db = MasterDb::assemble(vec![
        with_identity(round("000", 1.0), "sw_version", "RELEASE_1"),
        with_identity(round("001", 2.0), "sw_version", "RELEASE_1"),
        round("002", 3.0),
    ])
    .unwrap();
    assert_eq!(db.software_version(), "RELEASE_1");
}

#[test]
fn software_version_lists_upgrades_in_order() {
    let db = MasterDb::assemble(vec![
        with_identity(round("000", 1.0), "sw_version", "RELEASE_1"),
        with_identity(round("001", 2.0), "sw_version", "RELEASE_2"),
    ])
    .unwrap();
    assert_eq!(db.software_version(), "RELEASE_1, RELEASE_2");
}

#[test]
fn software_version_falls_back_to_release_line() {
    let mut a = round("000", 1.0);
    a.release = "SW-version: BUILD_9".into();
    let mut b = round("001", 2.0);
    b.release = "SW-version: BUILD_9".into();
    let db = MasterDb::assemble(vec![a, b]).unwrap();
    assert_eq!(db.software_version(), "SW-version: BUILD_9");
}

#[test]
fn hardware_identity_merges_rounds() {
    let db = MasterDb::assemble(vec![
        with_identity(round("000", 1.0), "hostname", "bench-07"),
        with_identity(round("001", 2.0), "component_version", "board rev B"),
    ])
    .unwrap();
    assert_eq!(db.hardware_identity(), "bench-07, board rev B");
}

#[test]
fn metadata_lookup_truncates_and_escapes() {
    let db = MasterDb::assemble(vec![
        round("000", 1.0),
        with_identity(round("001", 2.0), "os-release", "NAME=\"Dev OS\"\nVERSION=3"),
    ])
    .unwrap();
    assert_eq!(
        db.metadata_lookup("os-release", 64).as_deref(),
        Some("NAME=\\\"Dev OS\\\"\\nVERSION=3")
    );
    assert_eq!(db.metadata_lookup("os-release", 4).as_deref(), Some("NAME"));
    assert_eq!(db.metadata_lookup("hostname", 64), None);
}

#[test]
fn process_names_prefer_command_names() {
    let mut r = round("000", 1.0);
    r.processes.insert(
        42,
        ProcessStatus {
            pid: 42,
            name: "app-short".into(),
            ..ProcessStatus::default()
        },
    );
    r.processes.insert(
        7,
        ProcessStatus {
            pid: 7,
            name: "daemon".into(),
            ..ProcessStatus::default()
        },
    );
    let mut s = round("001", 2.0);
    s.commands.insert(
        42,
        ProcessCommand {
            name: "application".into(),
            fd_count: 3,
        },
    );
    let db = MasterDb::assemble(vec![r, s]).unwrap();
    let names = db.process_names();
    assert_eq!(names[&42], "application");
    assert_eq!(names[&7], "daemon");
}

#[test]
fn steps_and_dates_follow_round_order() {
    let mut a = round("000", 1.0);
    a.step = Some(vec!["boot".into()]);
    let db = MasterDb::assemble(vec![a, round("001", 2.0)]).unwrap();
    assert_eq!(db.steps(), vec![Some(vec!["boot".to_string()]), None]);
    assert_eq!(db.dates(), vec!["2024-03-01 000", "2024-03-01 001"]);
}

#[test]
fn wall_clock_spans_parsed_dates_across_a_reboot() {
    let stamp = |s: &str| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok();
    let mut first = round("000", 5000.0);
    first.timestamp = stamp("2024-03-01 12:00:00");
    let undated = round("001", 100.0);
    let mut last = round("002", 700.0);
    last.timestamp = stamp("2024-03-01 13:30:00");
    let db = MasterDb::assemble(vec![first, undated, last]).unwrap();
    assert!(db.duration() < 0.0);
    assert_eq!(db.wall_clock(), Some(5400.0));

    let undated = MasterDb::assemble(vec![round("000", 1.0), round("001", 2.0)]).unwrap();
    assert_eq!(undated.wall_clock(), None);
}
