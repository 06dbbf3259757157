//! Crash-recovery tests for the submission checkpoint: JSON round trip,
//! legacy text fallback, and corruption tolerance.

use std::fs;

use seqmine::submissions::{Submission, SubmissionFilter, SubmissionLog};
use tempfile::TempDir;

fn program(id: &str, submitter: &str, code: &str) -> Submission {
    let mut sub: Submission = serde_json::from_value(serde_json::json!({
        "id": id,
        "mode": "add",
        "type": "program",
        "submitter": submitter,
        "content": code,
        "minerProfile": "cpu-default",
    }))
    .unwrap();
    sub.prepare().unwrap();
    sub
}

fn entries(log: &SubmissionLog) -> Vec<Submission> {
    log.query(&SubmissionFilter {
        limit: usize::MAX,
        ..SubmissionFilter::default()
    })
    .results
}

#[test]
fn test_checkpoint_round_trip_is_field_identical() {
    let tmp = TempDir::new().unwrap();
    let log = SubmissionLog::new(tmp.path());
    log.do_submit(program("A000045", "alice", "mov $0,1\nadd $0,2\n"));
    log.do_submit(program("A000001", "bob", "sub $0,1\n"));
    log.write_checkpoint().unwrap();

    let restored = SubmissionLog::new(tmp.path());
    restored.load_checkpoint();
    assert_eq!(entries(&restored), entries(&log));
}

#[test]
fn test_checkpoint_is_pretty_printed_json_array() {
    let tmp = TempDir::new().unwrap();
    let log = SubmissionLog::new(tmp.path());
    log.do_submit(program("A000045", "alice", "mov $0,1\n"));
    log.write_checkpoint().unwrap();

    let text = fs::read_to_string(tmp.path().join("checkpoint.json")).unwrap();
    assert!(text.starts_with('['));
    assert!(text.contains('\n'));
    let decoded: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded.as_array().unwrap().len(), 1);
    assert_eq!(decoded[0]["id"], "A000045");
    assert_eq!(decoded[0]["minerProfile"], "cpu-default");
}

#[test]
fn test_restored_log_keeps_quota_counters() {
    let tmp = TempDir::new().unwrap();
    let log = SubmissionLog::new(tmp.path());
    for i in 0..100 {
        log.do_submit(program("A000045", "alice", &format!("mov $0,{i}\n")));
    }
    log.write_checkpoint().unwrap();

    let restored = SubmissionLog::new(tmp.path());
    restored.load_checkpoint();
    let next = program("A000045", "alice", "mov $0,12345\n");
    // The per-submitter count survives the restart.
    assert!(restored.check_submit(&next).is_err());
}

#[test]
fn test_legacy_checkpoint_fallback() {
    let tmp = TempDir::new().unwrap();
    let separator = "=".repeat(30);
    let text = format!(
        "; A000045: Fibonacci numbers\n; Submitted by alice\nmov $1,1\nadd $1,2\n{separator}\n; A000010: Euler totient\n; Submitted by bob\nmov $2,3\n{separator}\n; A000001: Groups\nsub $0,1\n",
    );
    fs::write(tmp.path().join("checkpoint.txt"), text).unwrap();

    let log = SubmissionLog::new(tmp.path());
    log.load_checkpoint();
    let loaded = entries(&log);
    assert_eq!(loaded.len(), 3);
    assert!(loaded.iter().all(|s| s.mode == seqmine::submissions::Mode::Add));
    assert_eq!(loaded[0].id.to_string(), "A000045");
    assert_eq!(loaded[0].submitter, "alice");
    assert_eq!(loaded[1].id.to_string(), "A000010");
    assert_eq!(loaded[2].submitter, "");
}

#[test]
fn test_corrupt_json_falls_back_to_legacy() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("checkpoint.json"), "[{\"id\": garbage").unwrap();
    fs::write(
        tmp.path().join("checkpoint.txt"),
        "; A000045\nmov $0,1\n",
    )
    .unwrap();

    let log = SubmissionLog::new(tmp.path());
    log.load_checkpoint();
    let loaded = entries(&log);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id.to_string(), "A000045");
}

#[test]
fn test_total_corruption_yields_empty_log_not_failure() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("checkpoint.json"), b"\x00\xff not json").unwrap();

    let log = SubmissionLog::new(tmp.path());
    log.load_checkpoint();
    assert!(log.is_empty());
}
