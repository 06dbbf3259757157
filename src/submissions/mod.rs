//! Submission Pipeline
//!
//! A session-bounded append log of program contributions from mining
//! workers, with admission control (total cap, per-user quota, duplicate
//! detection), a 24-hour protection window for destructive b-file
//! removals, a rate-limited sequence-refresh path, and periodic
//! checkpointing to disk.
//!
//! The log and its counters live behind one mutex held only briefly; the
//! b-file protection map and refresh window have their own locks.

pub mod checkpoint;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::metrics::Metrics;
use crate::uid::{bfile_path, Uid};

/// Hard cap on retained submissions.
pub const NUM_SUBMISSIONS_MAX: usize = 50_000;
/// Per-submitter quota within one user-stats window.
pub const NUM_SUBMISSIONS_PER_USER: usize = 100;
/// Log length that arms a session roll-over.
pub const SESSION_HIGH_WATER: usize = 2_000;
/// Entries retained after a roll-over.
pub const SESSION_LOW_WATER: usize = 1_000;
/// Minimum spacing between session roll-overs.
const SESSION_INTERVAL_HOURS: i64 = 24;
/// Protection window for repeated b-file removals of one id.
const BFILE_PROTECT_HOURS: i64 = 24;
/// Sequence refreshes allowed per sliding hour.
const REFRESHES_PER_HOUR: usize = 200;

/// Errors surfaced by the submission pipeline. Messages are wire-visible:
/// handlers return them verbatim in the structured error body.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Missing sequence id")]
    MissingId,

    #[error("Missing program content")]
    MissingContent,

    #[error("Invalid mode '{mode}' for type '{kind}'")]
    InvalidMode { kind: String, mode: String },

    #[error("Too many submissions")]
    TotalCap,

    #[error("Too many user submissions")]
    UserQuota,

    #[error("Duplicate submission")]
    Duplicate,

    #[error("B-file for {id} was removed recently, try again in {hours} hours")]
    BfileProtected { id: Uid, hours: i64 },

    #[error("B-file does not exist")]
    BfileMissing,

    #[error("Too many sequence refreshes, try again later")]
    RefreshRateLimited,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Submission mode. The legacy wire alias `delete` decodes as `remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Add,
    Update,
    #[serde(alias = "delete")]
    Remove,
    Refresh,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Add => "add",
            Mode::Update => "update",
            Mode::Remove => "remove",
            Mode::Refresh => "refresh",
        }
    }

    /// Parse a wire mode name, accepting the legacy `delete` alias.
    pub fn parse(s: &str) -> Option<Mode> {
        match s {
            "add" => Some(Mode::Add),
            "update" => Some(Mode::Update),
            "remove" | "delete" => Some(Mode::Remove),
            "refresh" => Some(Mode::Refresh),
            _ => None,
        }
    }
}

/// Submission payload type (`type` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Program,
    Sequence,
    Bfile,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Program => "program",
            Kind::Sequence => "sequence",
            Kind::Bfile => "bfile",
        }
    }

    pub fn parse(s: &str) -> Option<Kind> {
        match s {
            "program" => Some(Kind::Program),
            "sequence" => Some(Kind::Sequence),
            "bfile" => Some(Kind::Bfile),
            _ => None,
        }
    }
}

/// One submission from a mining worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub id: Uid,
    pub mode: Mode,
    #[serde(rename = "type")]
    pub kind: Kind,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub submitter: String,
    /// Normalized operation lines of a program, extracted from `content`
    /// for duplicate detection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<String>,
    #[serde(default, rename = "minerProfile", skip_serializing_if = "String::is_empty")]
    pub miner_profile: String,
}

static HEADER_UID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"A\d{6}").unwrap()
});

impl Submission {
    /// Wrap a bare program text as an `add` submission, deriving the id
    /// and submitter from the header-comment conventions: the first
    /// `A<NNNNNN>` token of a comment names the id, a `Submitted by
    /// <name>` comment names the submitter.
    pub fn from_program_code(code: &str) -> Submission {
        let mut id = Uid::default();
        let mut submitter = String::new();
        for line in code.lines() {
            let Some(comment) = line.trim().strip_prefix(';') else {
                continue;
            };
            let comment = comment.trim();
            if id.is_zero() {
                if let Some(m) = HEADER_UID_RE.find(comment) {
                    if let Ok(parsed) = m.as_str().parse() {
                        id = parsed;
                    }
                }
            }
            if submitter.is_empty() {
                if let Some(rest) = comment.strip_prefix("Submitted by ") {
                    submitter = rest.trim().trim_end_matches('.').to_string();
                }
            }
        }
        Submission {
            id,
            mode: Mode::Add,
            kind: Kind::Program,
            operations: extract_operations(code),
            content: code.to_string(),
            submitter,
            miner_profile: String::new(),
        }
    }

    /// Validate the type/mode matrix and required fields, and extract
    /// `operations` for programs. Called by the intake adapter before
    /// admission control.
    pub fn prepare(&mut self) -> Result<(), SubmitError> {
        if self.id.number() == 0 {
            return Err(SubmitError::MissingId);
        }
        let mode_ok = match self.kind {
            Kind::Bfile => self.mode == Mode::Remove,
            Kind::Sequence => self.mode == Mode::Refresh,
            Kind::Program => matches!(self.mode, Mode::Add | Mode::Update | Mode::Remove),
        };
        if !mode_ok {
            return Err(SubmitError::InvalidMode {
                kind: self.kind.as_str().to_string(),
                mode: self.mode.as_str().to_string(),
            });
        }
        if self.kind == Kind::Program {
            if self.mode != Mode::Remove && self.content.trim().is_empty() {
                return Err(SubmitError::MissingContent);
            }
            self.operations = extract_operations(&self.content);
        }
        Ok(())
    }
}

/// Normalized operation lines of a program: comments (`;`) and directives
/// (`#`) are dropped, inline comments stripped, whitespace collapsed.
pub fn extract_operations(code: &str) -> Vec<String> {
    code.lines()
        .filter_map(|line| {
            let line = line.split(';').next().unwrap_or_default().trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            Some(line.split_whitespace().collect::<Vec<_>>().join(" "))
        })
        .collect()
}

#[derive(Default)]
struct LogInner {
    entries: Vec<Submission>,
    per_submitter: HashMap<String, usize>,
    per_profile: HashMap<String, u64>,
    session: Option<DateTime<Utc>>,
}

/// Filter for `GET /submissions`.
#[derive(Debug, Default, Clone)]
pub struct SubmissionFilter {
    pub mode: Option<Mode>,
    pub kind: Option<Kind>,
    pub submitter: Option<String>,
    pub limit: usize,
    pub skip: usize,
}

/// One page of submissions plus the session timestamp and total match
/// count.
#[derive(Debug, Serialize)]
pub struct SubmissionPage {
    pub session: Option<DateTime<Utc>>,
    pub total: usize,
    pub results: Vec<Submission>,
}

/// Session-bounded submission log with admission control.
pub struct SubmissionLog {
    data_dir: PathBuf,
    inner: Mutex<LogInner>,
    bfile_removals: DashMap<Uid, DateTime<Utc>>,
    refresh_times: Mutex<Vec<DateTime<Utc>>>,
}

impl SubmissionLog {
    pub fn new(data_dir: &Path) -> Self {
        SubmissionLog {
            data_dir: data_dir.to_path_buf(),
            inner: Mutex::new(LogInner {
                session: Some(Utc::now()),
                ..LogInner::default()
            }),
            bfile_removals: DashMap::new(),
            refresh_times: Mutex::new(Vec::new()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn session(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().session
    }

    /// Admission control. Rolls the session if armed, then rejects on the
    /// total cap, the per-submitter quota, and duplicate operation
    /// sequences (for non-remove modes).
    pub fn check_submit(&self, sub: &Submission) -> Result<(), SubmitError> {
        self.check_submit_at(sub, Utc::now())
    }

    fn check_submit_at(&self, sub: &Submission, now: DateTime<Utc>) -> Result<(), SubmitError> {
        let mut inner = self.inner.lock();
        roll_session(&mut inner, now);

        if inner.entries.len() > NUM_SUBMISSIONS_MAX {
            return Err(SubmitError::TotalCap);
        }
        let submitted = inner
            .per_submitter
            .get(&sub.submitter)
            .copied()
            .unwrap_or(0);
        if submitted >= NUM_SUBMISSIONS_PER_USER {
            return Err(SubmitError::UserQuota);
        }
        if sub.mode != Mode::Remove
            && !sub.operations.is_empty()
            && inner.entries.iter().any(|e| e.operations == sub.operations)
        {
            return Err(SubmitError::Duplicate);
        }
        Ok(())
    }

    /// Append an admitted submission and bump the per-submitter and
    /// per-profile counters.
    pub fn do_submit(&self, sub: Submission) {
        let mut inner = self.inner.lock();
        *inner
            .per_submitter
            .entry(sub.submitter.clone())
            .or_insert(0) += 1;
        let profile = if sub.miner_profile.is_empty() {
            "unknown".to_string()
        } else {
            sub.miner_profile.clone()
        };
        *inner.per_profile.entry(profile).or_insert(0) += 1;
        info!(
            id = %sub.id,
            mode = sub.mode.as_str(),
            kind = sub.kind.as_str(),
            submitter = %sub.submitter,
            "submission accepted"
        );
        inner.entries.push(sub);
    }

    /// Page through the log in acceptance order.
    pub fn query(&self, filter: &SubmissionFilter) -> SubmissionPage {
        let inner = self.inner.lock();
        let matches = |sub: &&Submission| {
            filter.mode.is_none_or(|m| sub.mode == m)
                && filter.kind.is_none_or(|k| sub.kind == k)
                && filter
                    .submitter
                    .as_deref()
                    .is_none_or(|s| sub.submitter == s)
        };
        let total = inner.entries.iter().filter(matches).count();
        let results = inner
            .entries
            .iter()
            .filter(matches)
            .skip(filter.skip)
            .take(if filter.limit == 0 {
                usize::MAX
            } else {
                filter.limit
            })
            .cloned()
            .collect();
        SubmissionPage {
            session: inner.session,
            total,
            results,
        }
    }

    /// Remove the b-file of `id`, subject to the 24-hour protection
    /// window for repeated removals of the same id.
    pub fn remove_bfile(&self, id: Uid) -> Result<(), SubmitError> {
        self.remove_bfile_at(id, Utc::now())
    }

    fn remove_bfile_at(&self, id: Uid, now: DateTime<Utc>) -> Result<(), SubmitError> {
        let entry = self.bfile_removals.entry(id);
        if let dashmap::mapref::entry::Entry::Occupied(ref occupied) = entry {
            let elapsed = now - *occupied.get();
            if elapsed < Duration::hours(BFILE_PROTECT_HOURS) {
                let hours = BFILE_PROTECT_HOURS - elapsed.num_hours();
                return Err(SubmitError::BfileProtected { id, hours });
            }
        }
        let path = bfile_path(&self.data_dir, id);
        if !path.exists() {
            return Err(SubmitError::BfileMissing);
        }
        fs::remove_file(&path)?;
        warn!(%id, path = %path.display(), "b-file removed");
        entry.insert(now);
        Ok(())
    }

    /// Admit a sequence refresh under the hourly rate limit, deleting a
    /// stale b-file if one exists (non-fatal when absent).
    pub fn refresh_sequence(&self, id: Uid) -> Result<(), SubmitError> {
        self.refresh_sequence_at(id, Utc::now())
    }

    fn refresh_sequence_at(&self, id: Uid, now: DateTime<Utc>) -> Result<(), SubmitError> {
        let mut times = self.refresh_times.lock();
        let cutoff = now - Duration::hours(1);
        times.retain(|t| *t > cutoff);
        if times.len() >= REFRESHES_PER_HOUR {
            return Err(SubmitError::RefreshRateLimited);
        }
        let path = bfile_path(&self.data_dir, id);
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                warn!(%id, error = %err, "stale b-file removal failed");
            }
        }
        times.push(now);
        Ok(())
    }

    /// Emit per-profile submission counts into the metrics sink, then
    /// reset the per-profile counter.
    pub fn publish_metrics(&self, metrics: &Metrics) {
        let mut inner = self.inner.lock();
        for (profile, count) in inner.per_profile.drain() {
            metrics.set(
                "submissions",
                &[("kind", "submitted"), ("profile", profile.as_str())],
                count as f64,
            );
        }
    }

    /// Reset the per-submitter counters (opens a fresh quota window).
    pub fn clear_user_stats(&self) {
        self.inner.lock().per_submitter.clear();
    }

    pub(crate) fn snapshot(&self) -> Vec<Submission> {
        self.inner.lock().entries.clone()
    }

    pub(crate) fn restore(&self, entries: Vec<Submission>) {
        let mut inner = self.inner.lock();
        inner.per_submitter.clear();
        for sub in &entries {
            *inner
                .per_submitter
                .entry(sub.submitter.clone())
                .or_insert(0) += 1;
        }
        inner.entries = entries;
    }
}

/// Session rule: once the log reaches the high-water mark and the session
/// is older than the roll-over interval, stamp a new session and keep only
/// the newest low-water entries.
fn roll_session(inner: &mut LogInner, now: DateTime<Utc>) {
    if inner.entries.len() < SESSION_HIGH_WATER {
        return;
    }
    let stale = match inner.session {
        Some(session) => now - session >= Duration::hours(SESSION_INTERVAL_HOURS),
        None => true,
    };
    if !stale {
        return;
    }
    let keep_from = inner.entries.len().saturating_sub(SESSION_LOW_WATER);
    inner.entries.drain(..keep_from);
    inner.session = Some(now);
    info!(retained = inner.entries.len(), "submission session rolled over");
}
