//! Catalog File Loaders
//!
//! Readers for the mirrored catalog files under `<dataDir>/seqs/oeis/`:
//! `names`, `stripped`, the derived lists, and the trigger scans that
//! produce locally derived keyword bits. Readers prefer the uncompressed
//! file and fall back to its `.gz` sibling; absent files read as empty so
//! a partially mirrored catalog still yields a usable index.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::index::IndexError;
use crate::optypes::OpTypeIndex;
use crate::store::list::sibling_gz_path;
use crate::uid::Uid;

/// Open a catalog text file, falling back to its gzip sibling. `None`
/// when neither exists.
fn open_text(path: &Path) -> Result<Option<Box<dyn BufRead>>, IndexError> {
    if path.exists() {
        let file = File::open(path)?;
        return Ok(Some(Box::new(BufReader::new(file))));
    }
    let gz = sibling_gz_path(path);
    if gz.exists() {
        let file = File::open(gz)?;
        return Ok(Some(Box::new(BufReader::new(GzDecoder::new(file)))));
    }
    debug!(path = %path.display(), "catalog file absent, reading as empty");
    Ok(None)
}

/// Iterate the `(seq_id, content)` entries of a grouped list file,
/// skipping lines that match neither the header nor the continuation
/// shape. The tolerant read path: strictness lives in the flush.
fn scan_grouped(
    path: &Path,
    mut visit: impl FnMut(u32, &str),
) -> Result<(), IndexError> {
    let Some(reader) = open_text(path)? else {
        return Ok(());
    };
    let mut current: Option<u32> = None;
    for line in reader.lines() {
        let line = line?;
        if let Some((seq_id, content)) = parse_group_header(&line) {
            current = Some(seq_id);
            visit(seq_id, content);
        } else if let (Some(seq_id), Some(content)) = (current, line.strip_prefix("  ")) {
            visit(seq_id, content);
        }
    }
    Ok(())
}

fn parse_group_header(line: &str) -> Option<(u32, &str)> {
    let rest = line.strip_prefix('A')?;
    if rest.len() < 7 || !rest.as_bytes()[..6].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let (digits, tail) = rest.split_at(6);
    let content = tail.strip_prefix(": ").or_else(|| tail.strip_prefix(':'))?;
    Some((digits.parse().ok()?, content))
}

/// `names`: `A<NNNNNN> <name>` per line, `#` lines are comments.
pub fn load_names(path: &Path) -> Result<HashMap<Uid, String>, IndexError> {
    let mut names = HashMap::new();
    let Some(reader) = open_text(path)? else {
        return Ok(names);
    };
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((id, name)) = line.split_once(' ') else {
            continue;
        };
        if let Ok(uid) = id.parse::<Uid>() {
            names.insert(uid, name.trim().to_string());
        }
    }
    Ok(names)
}

/// `keywords` list: `A<NNNNNN>: kw1,kw2,...`; unknown keywords are
/// dropped, so the resulting mask holds known keywords only.
pub fn load_keyword_masks(path: &Path) -> Result<HashMap<u32, u64>, IndexError> {
    let mut masks: HashMap<u32, u64> = HashMap::new();
    scan_grouped(path, |seq_id, content| {
        let known = content
            .split(',')
            .map(str::trim)
            .filter(|kw| crate::keywords::is_known(kw));
        let mask = crate::keywords::encode(known).unwrap_or(0);
        *masks.entry(seq_id).or_insert(0) |= mask;
    })?;
    Ok(masks)
}

/// `stripped`: `A<NNNNNN> ,t1,t2,...,` per line. Returns `(uid, terms)`
/// in file order.
pub fn load_stripped(path: &Path) -> Result<Vec<(Uid, String)>, IndexError> {
    let mut rows = Vec::new();
    let Some(reader) = open_text(path)? else {
        return Ok(rows);
    };
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((id, terms)) = line.split_once(' ') else {
            continue;
        };
        if let Ok(uid) = id.parse::<Uid>() {
            rows.push((uid, terms.trim().to_string()));
        }
    }
    Ok(rows)
}

/// Trigger scan results over the comments and formulas lists.
#[derive(Debug, Default)]
pub struct Triggers {
    /// Ids whose comments contain a conjecture trigger phrase.
    pub conjectured: HashSet<u32>,
    /// Ids with at least one formula entry.
    pub with_formula: HashSet<u32>,
    /// Ids whose formulas mention an exponential generating function.
    pub egf: HashSet<u32>,
    /// Ids whose formulas mention an ordinary generating function.
    pub gf: HashSet<u32>,
    /// First formula entry per id.
    pub first_formula: HashMap<u32, String>,
}

/// Phrases that mark a sequence as conjectural, matched case-insensitively
/// in names and comments.
pub const CONJECTURE_TRIGGERS: &[&str] = &["conjecture", "it appears", "empirical"];

pub fn scan_triggers(comments: &Path, formulas: &Path) -> Result<Triggers, IndexError> {
    let mut triggers = Triggers::default();
    scan_grouped(comments, |seq_id, content| {
        let lower = content.to_lowercase();
        if CONJECTURE_TRIGGERS.iter().any(|t| lower.contains(t)) {
            triggers.conjectured.insert(seq_id);
        }
    })?;
    scan_grouped(formulas, |seq_id, content| {
        triggers.with_formula.insert(seq_id);
        triggers
            .first_formula
            .entry(seq_id)
            .or_insert_with(|| content.to_string());
        let lower = content.to_lowercase();
        if lower.contains("e.g.f.") {
            triggers.egf.insert(seq_id);
        } else if lower.contains("g.f.") {
            triggers.gf.insert(seq_id);
        }
    })?;
    Ok(triggers)
}

/// Ids whose upstream program list contains a `(PARI)` entry.
pub fn pari_ids(programs: &Path) -> Result<HashSet<u32>, IndexError> {
    let mut ids = HashSet::new();
    scan_grouped(programs, |seq_id, content| {
        if content.contains("(PARI)") {
            ids.insert(seq_id);
        }
    })?;
    Ok(ids)
}

/// Author names per id from the `authors` list.
pub fn load_authors(path: &Path) -> Result<HashMap<u32, Vec<String>>, IndexError> {
    let mut authors: HashMap<u32, Vec<String>> = HashMap::new();
    scan_grouped(path, |seq_id, content| {
        let name = content.trim();
        if !name.is_empty() {
            authors.entry(seq_id).or_default().push(name.to_string());
        }
    })?;
    Ok(authors)
}

/// Extract the known operation tokens of a program: the first
/// whitespace-delimited token of every line that is not a comment or
/// directive, distinct, in first-seen order, plus their combined mask.
pub fn program_operations(code: &str, optypes: &OpTypeIndex) -> (Vec<String>, u64) {
    let mut operations = Vec::new();
    let mut mask = 0u64;
    for line in code.lines() {
        let line = line.split(';').next().unwrap_or_default().trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(token) = line.split_whitespace().next() else {
            continue;
        };
        if let Some(bit) = optypes.bit(token) {
            if mask & bit == 0 {
                operations.push(token.to_string());
            }
            mask |= bit;
        }
    }
    (operations, mask)
}
