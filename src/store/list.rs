//! Derived List Store
//!
//! One compressed append-merge text file per registered field key. Incoming
//! fields accumulate in memory; a flush merges them with the existing
//! on-disk content and replaces the live file atomically, then refreshes a
//! gzip sibling. The uncompressed file is the source of truth; the `.gz`
//! copy is a derived cache.
//!
//! ## On-disk format
//!
//! Entries are grouped by entry number in ascending order. The first entry
//! of a group renders as `A<NNNNNN>: <content>`; further entries for the
//! same number render as two-space-indented continuations:
//!
//! ```text
//! A000001: first-content
//!   second-content
//! A000002: only-content
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use tracing::debug;

use crate::store::error::{StoreError, StoreResult};
use crate::uid::Field;

/// A per-key derived list with an in-memory buffer and an on-disk file.
pub struct ListStore {
    name: &'static str,
    key: char,
    path: PathBuf,
    buffer: Mutex<Vec<Field>>,
}

impl ListStore {
    /// Create a list named `name` for field key `key`, stored at
    /// `<dir>/<name>`.
    pub fn new(name: &'static str, key: char, dir: &Path) -> Self {
        ListStore {
            name,
            key,
            path: dir.join(name),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// List name, e.g. `"offsets"`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The field key this list accepts.
    pub fn key(&self) -> char {
        self.key
    }

    /// Path of the live (uncompressed) file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the fields whose key matches this list. In-memory only;
    /// nothing touches disk until the next flush.
    pub fn update(&self, fields: &[Field]) {
        let mut buffer = self.buffer.lock();
        buffer.extend(fields.iter().filter(|f| f.key == self.key).cloned());
    }

    /// Number of buffered entries awaiting flush.
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Merge buffered entries into the on-disk file.
    ///
    /// Within each entry group, new arrivals precede old entries and
    /// duplicates are collapsed by exact content equality; with
    /// `deduplicate` set, only the first entry of each group survives.
    /// The live file is replaced by atomic rename, so a failing flush
    /// leaves it intact, and the buffer is only cleared on success.
    pub fn flush(&self, deduplicate: bool) -> StoreResult<()> {
        let mut buffer = self.buffer.lock();
        if buffer.is_empty() {
            return Ok(());
        }
        let mut fresh: Vec<(u32, String)> = buffer
            .iter()
            .map(|f| (f.seq_id, f.content.clone()))
            .collect();
        fresh.sort();

        let old_groups = read_groups(&self.path)?;
        let merged = merge_groups(&fresh, &old_groups, deduplicate);

        let tmp_path = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for (seq_id, contents) in &merged {
                let mut contents = contents.iter();
                if let Some(first) = contents.next() {
                    writeln!(writer, "A{seq_id:06}: {first}")?;
                }
                for rest in contents {
                    writeln!(writer, "  {rest}")?;
                }
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        write_gzip_sibling(&self.path)?;

        debug!(
            list = self.name,
            entries = buffer.len(),
            groups = merged.len(),
            "list flushed"
        );
        buffer.clear();
        Ok(())
    }

    /// Scan the current file for gaps in the entry-number sequence
    /// starting at 1. Returns up to `cap` missing numbers plus the exact
    /// total number of gaps, including the unfilled suffix up to `max_id`.
    pub fn find_missing_ids(&self, max_id: u32, cap: usize) -> StoreResult<(Vec<u32>, usize)> {
        let _buffer = self.buffer.lock();
        let groups = read_groups(&self.path)?;

        let mut missing = Vec::new();
        let mut total = 0usize;
        let mut expected = 1u32;
        for (seq_id, _) in &groups {
            if *seq_id < expected {
                continue;
            }
            for gap in expected..*seq_id {
                total += 1;
                if missing.len() < cap {
                    missing.push(gap);
                }
            }
            expected = seq_id + 1;
        }
        for gap in expected..=max_id {
            total += 1;
            if missing.len() < cap {
                missing.push(gap);
            }
        }
        Ok((missing, total))
    }
}

/// Read the live file into `(seq_id, contents)` groups, in file order.
/// A missing file reads as empty. Any line that is neither a group header
/// nor a two-space continuation is a hard error.
fn read_groups(path: &Path) -> StoreResult<Vec<(u32, Vec<String>)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut groups: Vec<(u32, Vec<String>)> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some((seq_id, content)) = parse_group_header(&line) {
            groups.push((seq_id, vec![content.to_string()]));
        } else if let Some(content) = line.strip_prefix("  ") {
            match groups.last_mut() {
                Some((_, contents)) => contents.push(content.to_string()),
                None => {
                    return Err(StoreError::Malformed {
                        path: path.to_path_buf(),
                        line_no: idx + 1,
                        line,
                    })
                }
            }
        } else {
            return Err(StoreError::Malformed {
                path: path.to_path_buf(),
                line_no: idx + 1,
                line,
            });
        }
    }
    Ok(groups)
}

/// Parse `A<NNNNNN>: <content>` into `(number, content)`.
fn parse_group_header(line: &str) -> Option<(u32, &str)> {
    let rest = line.strip_prefix('A')?;
    if rest.len() < 7 || !rest.as_bytes()[..6].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let (digits, tail) = rest.split_at(6);
    let content = tail.strip_prefix(": ").or_else(|| tail.strip_prefix(':'))?;
    let seq_id: u32 = digits.parse().ok()?;
    Some((seq_id, content))
}

/// Combine sorted fresh entries with the existing groups. Both inputs are
/// in ascending id order; the output is too.
fn merge_groups(
    fresh: &[(u32, String)],
    old: &[(u32, Vec<String>)],
    deduplicate: bool,
) -> Vec<(u32, Vec<String>)> {
    let mut merged: Vec<(u32, Vec<String>)> = Vec::with_capacity(old.len() + 16);
    let mut fresh_iter = fresh.iter().peekable();
    let mut old_iter = old.iter().peekable();

    loop {
        let next_id = match (fresh_iter.peek(), old_iter.peek()) {
            (Some((f, _)), Some((o, _))) => (*f).min(*o),
            (Some((f, _)), None) => *f,
            (None, Some((o, _))) => *o,
            (None, None) => break,
        };

        // New arrivals first, then surviving old entries; first occurrence
        // of each content wins.
        let mut contents: Vec<String> = Vec::new();
        while fresh_iter.peek().is_some_and(|(f, _)| *f == next_id) {
            if let Some((_, content)) = fresh_iter.next() {
                if !contents.iter().any(|c| c == content) {
                    contents.push(content.clone());
                }
            }
        }
        if old_iter.peek().is_some_and(|(o, _)| *o == next_id) {
            if let Some((_, old_contents)) = old_iter.next() {
                for content in old_contents {
                    if !contents.iter().any(|c| c == content) {
                        contents.push(content.clone());
                    }
                }
            }
        }
        if deduplicate {
            contents.truncate(1);
        }
        if !contents.is_empty() {
            merged.push((next_id, contents));
        }
    }
    merged
}

/// Refresh the `.gz` sibling from the live file.
fn write_gzip_sibling(path: &Path) -> StoreResult<()> {
    let gz_path = sibling_gz_path(path);
    let mut reader = BufReader::new(File::open(path)?);
    let mut encoder = GzEncoder::new(
        BufWriter::new(File::create(&gz_path)?),
        Compression::default(),
    );
    std::io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// `<path>.gz` next to the live file.
pub fn sibling_gz_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".gz");
    PathBuf::from(os)
}
