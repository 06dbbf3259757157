//! Stats CSV Loaders
//!
//! Loads the locally computed statistics under `<dataDir>/stats/`:
//! submitters, mined programs (with their flag columns), and the program
//! call graph. Headers are validated strictly so a half-written stats
//! drop fails the index load instead of producing a silently wrong
//! directory.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::index::{IndexError, Submitter};
use crate::keywords;
use crate::uid::Uid;

/// `submitters.csv` record: `submitter,ref_id,num_programs`.
#[derive(Debug, Deserialize)]
struct SubmitterRecord {
    submitter: String,
    ref_id: u32,
    num_programs: u64,
}

/// Load submitters indexed by ref_id; the returned vector has a slot for
/// every ref_id in `0..=max` with absent ids left as `None`.
pub fn load_submitters(path: &Path) -> Result<Vec<Option<Submitter>>, IndexError> {
    let mut reader = csv::Reader::from_reader(File::open(path)?);
    expect_headers(&mut reader, path, &["submitter", "ref_id", "num_programs"])?;

    let mut records = Vec::new();
    for result in reader.deserialize() {
        let record: SubmitterRecord = result?;
        records.push(record);
    }
    let max_ref = records.iter().map(|r| r.ref_id).max().unwrap_or(0);
    let mut slots: Vec<Option<Submitter>> = vec![None; max_ref as usize + 1];
    for record in records {
        slots[record.ref_id as usize] = Some(Submitter {
            name: record.submitter,
            ref_id: record.ref_id,
            num_programs: record.num_programs,
        });
    }
    Ok(slots)
}

/// One row of `programs.csv` in either the 6-column legacy schema
/// (`id,submitter,length,usages,inc_eval,log_eval`) or the full 10-column
/// schema adding `vir_eval,loop,formula,indirect`.
#[derive(Debug)]
pub struct ProgramRow {
    pub id: Uid,
    pub submitter_ref: u32,
    pub length: u32,
    pub usages: u64,
    pub keywords: u64,
}

const PROGRAMS_HEADER_LEGACY: &[&str] = &["id", "submitter", "length", "usages", "inc_eval", "log_eval"];
const PROGRAMS_HEADER_FULL: &[&str] = &[
    "id", "submitter", "length", "usages", "inc_eval", "log_eval", "vir_eval", "loop", "formula",
    "indirect",
];

/// Flag columns map onto derived keyword bits; column position 4 + i of
/// the full schema carries flag `PROGRAM_FLAG_KEYWORDS[i]`.
const PROGRAM_FLAG_KEYWORDS: &[&str] = &[
    "loda-inceval",
    "loda-logeval",
    "loda-vireval",
    "loda-loop",
    "loda-formula",
    "loda-indirect",
];

/// Load the mined-program rows. Every row carries the `loda` keyword bit
/// plus one derived bit per set flag column.
pub fn load_programs(path: &Path) -> Result<Vec<ProgramRow>, IndexError> {
    let mut reader = csv::Reader::from_reader(File::open(path)?);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(str::to_string)
        .collect();
    let num_flags = if headers == PROGRAMS_HEADER_FULL {
        6
    } else if headers == PROGRAMS_HEADER_LEGACY {
        2
    } else {
        return Err(IndexError::BadHeader {
            path: path.to_path_buf(),
            found: headers.join(","),
        });
    };

    let loda_bit = keywords::bit("loda")?;
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let field = |i: usize| record.get(i).unwrap_or("").trim();
        let id: Uid = field(0)
            .parse()
            .map_err(|_| IndexError::BadValue {
                path: path.to_path_buf(),
                value: field(0).to_string(),
            })?;
        let mut kw_mask = loda_bit;
        for (i, name) in PROGRAM_FLAG_KEYWORDS.iter().take(num_flags).enumerate() {
            if parse_flag(field(4 + i)) {
                kw_mask |= keywords::bit(name)?;
            }
        }
        rows.push(ProgramRow {
            id,
            submitter_ref: field(1).parse().unwrap_or(0),
            length: field(2).parse().unwrap_or(0),
            usages: field(3).parse().unwrap_or(0),
            keywords: kw_mask,
        });
    }
    Ok(rows)
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True")
}

/// `call_graph.csv` record: `caller,callee`.
#[derive(Debug, Deserialize)]
struct CallGraphRecord {
    caller: String,
    callee: String,
}

/// Invert the call graph into `callee number -> callers`, callers in file
/// order.
pub fn load_call_graph(path: &Path) -> Result<HashMap<u32, Vec<Uid>>, IndexError> {
    let mut reader = csv::Reader::from_reader(File::open(path)?);
    expect_headers(&mut reader, path, &["caller", "callee"])?;

    let mut callers: HashMap<u32, Vec<Uid>> = HashMap::new();
    for result in reader.deserialize() {
        let record: CallGraphRecord = result?;
        let caller: Uid = record.caller.parse().map_err(|_| IndexError::BadValue {
            path: path.to_path_buf(),
            value: record.caller.clone(),
        })?;
        let callee: Uid = record.callee.parse().map_err(|_| IndexError::BadValue {
            path: path.to_path_buf(),
            value: record.callee.clone(),
        })?;
        callers.entry(callee.number()).or_default().push(caller);
    }
    Ok(callers)
}

fn expect_headers<R: Read>(
    reader: &mut csv::Reader<R>,
    path: &Path,
    expected: &[&str],
) -> Result<(), IndexError> {
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers != expected {
        return Err(IndexError::BadHeader {
            path: path.to_path_buf(),
            found: headers.join(","),
        });
    }
    Ok(())
}
