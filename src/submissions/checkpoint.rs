//! Submission Checkpointing
//!
//! The log is periodically serialized to `<dataDir>/checkpoint.json` as a
//! pretty-printed JSON array. Loading is crash-tolerant: an unreadable or
//! undecodable checkpoint falls back to the legacy text format (program
//! blocks separated by a line of exactly 30 `=` characters), and failing
//! that the log simply starts empty. Startup never aborts on checkpoint
//! corruption.

use std::fs;

use tracing::{info, warn};

use crate::submissions::{Submission, SubmissionLog, SubmitError};

/// Current checkpoint file name, relative to the data dir.
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Legacy checkpoint file name, relative to the data dir.
pub const LEGACY_CHECKPOINT_FILE: &str = "checkpoint.txt";

/// Block separator of the legacy format: exactly 30 `=` characters.
const LEGACY_SEPARATOR: &str = "==============================";

impl SubmissionLog {
    /// Serialize the entire log, in order, to `checkpoint.json`.
    ///
    /// Plain create-and-write: a torn write on crash is acceptable and is
    /// absorbed by the fallback chain in `load_checkpoint`.
    pub fn write_checkpoint(&self) -> Result<(), SubmitError> {
        let entries = self.snapshot();
        let json = serde_json::to_string_pretty(&entries)?;
        let path = self.data_dir().join(CHECKPOINT_FILE);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, json)?;
        info!(entries = entries.len(), path = %path.display(), "checkpoint written");
        Ok(())
    }

    /// Restore the log from disk: `checkpoint.json`, then the legacy
    /// `checkpoint.txt`, then empty. Never fails.
    pub fn load_checkpoint(&self) {
        let path = self.data_dir().join(CHECKPOINT_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Vec<Submission>>(&text) {
                Ok(entries) => {
                    info!(entries = entries.len(), "checkpoint loaded");
                    self.restore(entries);
                    return;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "undecodable checkpoint, trying legacy format");
                }
            },
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), error = %err, "unreadable checkpoint, trying legacy format");
            }
            Err(_) => {}
        }

        let legacy_path = self.data_dir().join(LEGACY_CHECKPOINT_FILE);
        match fs::read_to_string(&legacy_path) {
            Ok(text) => {
                let entries = parse_legacy(&text);
                info!(entries = entries.len(), "legacy checkpoint loaded");
                self.restore(entries);
            }
            Err(_) => {
                self.restore(Vec::new());
            }
        }
    }
}

/// Split legacy checkpoint text into program blocks and wrap each as an
/// `add` submission.
fn parse_legacy(text: &str) -> Vec<Submission> {
    let mut entries = Vec::new();
    let mut block = String::new();
    for line in text.lines() {
        if line == LEGACY_SEPARATOR {
            push_block(&mut entries, &block);
            block.clear();
        } else {
            block.push_str(line);
            block.push('\n');
        }
    }
    push_block(&mut entries, &block);
    entries
}

fn push_block(entries: &mut Vec<Submission>, block: &str) {
    if block.trim().is_empty() {
        return;
    }
    entries.push(Submission::from_program_code(block.trim_start_matches('\n')));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submissions::{Kind, Mode};
    use tempfile::TempDir;

    fn sample(id: &str, code: &str) -> Submission {
        let mut sub = Submission {
            id: id.parse().unwrap(),
            mode: Mode::Add,
            kind: Kind::Program,
            content: code.to_string(),
            submitter: "alice".to_string(),
            operations: Vec::new(),
            miner_profile: "fast".to_string(),
        };
        sub.prepare().unwrap();
        sub
    }

    #[test]
    fn test_checkpoint_round_trip_preserves_order_and_fields() {
        let tmp = TempDir::new().unwrap();
        let log = SubmissionLog::new(tmp.path());
        log.do_submit(sample("A000045", "mov $0,1\n"));
        log.do_submit(sample("A000001", "add $0,2\n"));
        log.write_checkpoint().unwrap();

        let fresh = SubmissionLog::new(tmp.path());
        fresh.load_checkpoint();
        assert_eq!(fresh.snapshot(), log.snapshot());
    }

    #[test]
    fn test_load_missing_checkpoint_yields_empty_log() {
        let tmp = TempDir::new().unwrap();
        let log = SubmissionLog::new(tmp.path());
        log.load_checkpoint();
        assert!(log.is_empty());
    }

    #[test]
    fn test_load_corrupt_checkpoint_falls_back_to_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CHECKPOINT_FILE), "[{\"id\": tr").unwrap();
        let log = SubmissionLog::new(tmp.path());
        log.load_checkpoint();
        assert!(log.is_empty());
    }

    #[test]
    fn test_legacy_fallback_parses_program_blocks() {
        let tmp = TempDir::new().unwrap();
        let text = format!(
            "; A000045: Fibonacci\n; Submitted by alice\nmov $1,1\n{sep}\n; A000001: Groups\nadd $0,1\n{sep}\n",
            sep = LEGACY_SEPARATOR
        );
        fs::write(tmp.path().join(LEGACY_CHECKPOINT_FILE), text).unwrap();

        let log = SubmissionLog::new(tmp.path());
        log.load_checkpoint();
        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.mode == Mode::Add));
        assert_eq!(entries[0].id.to_string(), "A000045");
        assert_eq!(entries[0].submitter, "alice");
        assert_eq!(entries[1].id.to_string(), "A000001");
    }

    #[test]
    fn test_legacy_separator_is_exactly_30_chars() {
        assert_eq!(LEGACY_SEPARATOR.len(), 30);
        assert!(LEGACY_SEPARATOR.chars().all(|c| c == '='));
        // A 29-char line does not separate blocks.
        let text = format!("mov $0,1\n{}\nadd $0,1\n", "=".repeat(29));
        let entries = parse_legacy(&text);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_json_checkpoint_wins_over_legacy() {
        let tmp = TempDir::new().unwrap();
        let log = SubmissionLog::new(tmp.path());
        log.do_submit(sample("A000045", "mov $0,1\n"));
        log.write_checkpoint().unwrap();
        fs::write(
            tmp.path().join(LEGACY_CHECKPOINT_FILE),
            "; A000001\nsub $0,1\n",
        )
        .unwrap();

        let fresh = SubmissionLog::new(tmp.path());
        fresh.load_checkpoint();
        let entries = fresh.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id.to_string(), "A000045");
    }
}
