// RoundParser tests: whole round directories, optional files, rejection of unusable rounds

mod common;

use endurance_report::config::SyslogConfig;
use endurance_report::round_parser::{ParseError, RoundParser};
use endurance_report::snapshot_reader::{Helpers, SnapshotReader};
use tempfile::TempDir;

fn parser() -> RoundParser {
    RoundParser::new(&SyslogConfig::default()).expect("default syslog patterns compile")
}

fn parse_dir(dir: &std::path::Path) -> Result<endurance_report::models::Round, ParseError> {
    parser().parse(&SnapshotReader::with_helpers(dir, Helpers::default()))
}

#[test]
fn parses_usage_and_identity() {
    let root = TempDir::new().unwrap();
    let dir = common::write_round(root.path(), "001", 1000.0, 3000);
    common::write_file(&dir, "sw_version", "  RELEASE_4.2\n");
    common::write_file(&dir, "hostname", "bench-07\n");

    let round = parse_dir(&dir).unwrap();
    assert_eq!(round.dirname, "001");
    assert_eq!(round.uptime, 1000.0);
    assert!(round.timestamp.is_some());
    assert_eq!(round.identity.get("sw_version").map(String::as_str), Some("RELEASE_4.2"));
    assert_eq!(round.identity.get("hostname").map(String::as_str), Some("bench-07"));
    assert_eq!(round.processes[&42].vm_rss, 3000);
    assert_eq!(round.process_name(42), Some("app"));
    assert_eq!(round.memory.ram_total, 100000);
}

#[test]
fn optional_files_default_to_absent() {
    let root = TempDir::new().unwrap();
    let dir = common::write_round(root.path(), "002", 50.0, 100);
    let round = parse_dir(&dir).unwrap();
    assert!(round.step.is_none());
    assert!(round.smaps.is_none());
    assert!(round.kernel.is_none());
    assert!(round.syslog_errors.is_none());
    assert!(round.slabs.is_empty());
    assert!(round.identity.is_empty());
    assert!(round.crash_counts.is_empty());
    assert!(round.respawned_jobs.is_empty());
}

#[test]
fn step_lines_are_kept_in_order() {
    let root = TempDir::new().unwrap();
    let dir = common::write_round(root.path(), "003", 50.0, 100);
    common::write_file(&dir, "step.txt", "open browser\n\n  play video  \n");
    let round = parse_dir(&dir).unwrap();
    assert_eq!(
        round.step,
        Some(vec!["open browser".to_string(), "play video".to_string()])
    );
}

#[test]
fn compressed_optional_files_are_parsed() {
    let root = TempDir::new().unwrap();
    let dir = common::write_round(root.path(), "004", 50.0, 100);
    common::write_gz(
        &dir,
        "smaps.cap",
        "#Pid: 42\n00008000-00010000 r-xp 00000000 1f:03 1 /usr/bin/app\nSize: 32 kB\nPss: 20 kB\nPrivate_Dirty: 4 kB\n",
    );
    common::write_gz(&dir, "stat", "cpu  100 5 50 1000 10 1 2\nintr 500\nctxt 900\nprocesses 77\n");

    let round = parse_dir(&dir).unwrap();
    let smaps = round.smaps.expect("smaps parsed");
    assert_eq!(smaps.processes[&42].pss, 20);
    assert_eq!(smaps.private_code, 4);
    let kernel = round.kernel.expect("stat parsed");
    assert_eq!(kernel.context_switches, 900);
    assert_eq!(kernel.forks, 77);
}

#[test]
fn syslog_lines_are_classified() {
    let root = TempDir::new().unwrap();
    let dir = common::write_round(root.path(), "005", 50.0, 100);
    common::write_file(
        &dir,
        "syslog",
        "Mar  1 12:00:00 dev kernel: Out of memory: Kill process 42 (app)\n\
         Mar  1 12:00:01 dev app[42]: all good\n\
         Mar  1 12:00:02 dev kernel: app[42]: segfault at 0 ip 0000\n",
    );
    let round = parse_dir(&dir).unwrap();
    let counts = round.syslog_errors.expect("syslog classified");
    assert_eq!(counts.get("kernel/oom"), Some(&1));
    assert_eq!(counts.get("process/crash"), Some(&1));
    assert_eq!(counts.get("kernel/oops"), Some(&0));
}

#[test]
fn malformed_lines_are_skipped_not_fatal() {
    let root = TempDir::new().unwrap();
    let dir = common::write_round(root.path(), "006", 50.0, 100);
    common::write_file(&dir, "stat", "cpu 1 2\nctxt 10\n");
    let round = parse_dir(&dir).unwrap();
    assert_eq!(round.kernel.map(|k| k.context_switches), Some(10));
    assert!(round.skipped.iter().any(|s| s.file == "stat"));
}

#[test]
fn missing_usage_file_rejects_round() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("007");
    common::write_file(&dir, "hostname", "bench-07\n");
    let err = parse_dir(&dir).unwrap_err();
    assert!(matches!(err, ParseError::MissingUsage { ref dir } if dir == "007"));
}

#[test]
fn foreign_usage_file_is_malformed() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("008");
    common::write_file(&dir, "usage.csv", "generator = other-tool v1\n");
    let err = parse_dir(&dir).unwrap_err();
    assert!(matches!(err, ParseError::Malformed { .. }));
    assert!(err.to_string().contains("usage.csv"));
}

#[test]
fn missing_decompressor_fails_the_round() {
    let root = TempDir::new().unwrap();
    let dir = common::write_round(root.path(), "009", 50.0, 100);
    common::write_file(&dir, "slabinfo.lzo", "compressed");
    let reader = SnapshotReader::with_helpers(
        &dir,
        Helpers {
            lzo: "endurance-no-such-lzop".into(),
            xz: "xzcat".into(),
        },
    );
    let err = parser().parse(&reader).unwrap_err();
    assert!(matches!(err, ParseError::Read(_)));
    assert!(err.to_string().contains("endurance-no-such-lzop"));
}

#[test]
fn crash_counters_are_collected() {
    let root = TempDir::new().unwrap();
    let dir = common::write_round(root.path(), "010", 50.0, 100);
    let cores = dir.join("dsme").join("rich-cores");
    common::write_file(&cores, "browser", "2\n");
    common::write_file(&cores, "camera", "0\n");
    common::write_file(&cores, "notes", "garbage\n");
    common::write_file(&dir, "upstart_jobs_respawned", "xsession/sysuid: 3\nmce: 0\n???\n");

    let round = parse_dir(&dir).unwrap();
    assert_eq!(round.crash_counts.len(), 1);
    assert_eq!(round.crash_counts["browser"], 2);
    assert_eq!(round.respawned_jobs.len(), 1);
    assert_eq!(round.respawned_jobs["xsession/sysuid"], 3);
    assert!(round.skipped.iter().any(|s| s.file == "upstart_jobs_respawned" && s.line == 3));
}
