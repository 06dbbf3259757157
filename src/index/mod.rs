//! In-Memory Data Index
//!
//! A read-mostly snapshot of the mirrored catalog plus the locally
//! computed statistics: parallel sorted arrays of sequences and programs
//! joined by id with a linear-scan merge, bitmask keyword and
//! operation-type fields, and an id-indexed direct lookup with linear
//! fallback.
//!
//! The index is rebuilt by reloading the files; the owning server may
//! drop it to free memory, and `IndexHolder::get` lazily reloads it under
//! a lock.

pub mod load;
pub mod stats;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::keywords::{self, KeywordError};
use crate::optypes::{OpTypeError, OpTypeIndex};
use crate::store::{catalog_dir, program_path, stats_dir};
use crate::uid::Uid;

/// Errors produced while loading the data index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unexpected header in {path:?}: {found}")]
    BadHeader { path: PathBuf, found: String },

    #[error("bad value in {path:?}: {value:?}")]
    BadValue { path: PathBuf, value: String },

    #[error(transparent)]
    Keyword(#[from] KeywordError),

    #[error(transparent)]
    OpType(#[from] OpTypeError),
}

/// A known program submitter, referenced by small integer ref_id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submitter {
    pub name: String,
    pub ref_id: u32,
    pub num_programs: u64,
}

/// One catalog sequence.
#[derive(Debug, Clone, Serialize)]
pub struct Sequence {
    pub id: Uid,
    pub name: String,
    /// Union of upstream keyword bits and locally derived bits.
    pub keywords: u64,
    /// Raw term-table line, `,t1,t2,...,`.
    pub terms: String,
    pub authors: Vec<Submitter>,
    pub submitter: Option<Submitter>,
}

/// One mined program.
#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub id: Uid,
    pub name: String,
    pub code: String,
    pub submitter: Option<Submitter>,
    pub keywords: u64,
    pub ops_mask: u64,
    pub operations: Vec<String>,
    pub formula: String,
    pub length: u32,
    /// Space-joined caller ids from the call graph.
    pub usages: String,
}

/// Anything addressable by entry id.
pub trait HasUid {
    fn uid(&self) -> Uid;
}

impl HasUid for Sequence {
    fn uid(&self) -> Uid {
        self.id
    }
}

impl HasUid for Program {
    fn uid(&self) -> Uid {
        self.id
    }
}

/// The loaded snapshot: sorted parallel arrays plus the codecs needed to
/// interpret their masks.
pub struct DataIndex {
    pub sequences: Vec<Sequence>,
    pub programs: Vec<Program>,
    pub submitters: Vec<Option<Submitter>>,
    pub optypes: OpTypeIndex,
}

impl DataIndex {
    /// Load the index from the data directory. Absent catalog files read
    /// as empty; malformed stats CSVs fail the load.
    pub fn load(data_dir: &Path) -> Result<DataIndex, IndexError> {
        let catalog = catalog_dir(data_dir);
        let stats = stats_dir(data_dir);

        let optypes_path = stats.join("operation_types.csv");
        let optypes = if optypes_path.exists() {
            OpTypeIndex::load(&optypes_path)?
        } else {
            OpTypeIndex::empty()
        };

        let names = load::load_names(&catalog.join("names"))?;
        let kw_masks = load::load_keyword_masks(&catalog.join("keywords"))?;
        let triggers = load::scan_triggers(&catalog.join("comments"), &catalog.join("formulas"))?;
        let pari = load::pari_ids(&catalog.join("programs"))?;
        let author_names = load::load_authors(&catalog.join("authors"))?;

        let conjecture_bit = keywords::bit("conjecture")?;
        let formula_bit = keywords::bit("formula")?;
        let pari_bit = keywords::bit("pari")?;
        let decimal_bit = keywords::bit("decimal-expansion")?;
        let egf_bit = keywords::bit("egf-expansion")?;
        let gf_bit = keywords::bit("gf-expansion")?;

        let mut sequences = Vec::new();
        for (uid, terms) in load::load_stripped(&catalog.join("stripped"))? {
            let n = uid.number();
            let name = names.get(&uid).cloned().unwrap_or_default();
            let lower_name = name.to_lowercase();
            let mut mask = kw_masks.get(&n).copied().unwrap_or(0);
            if triggers.conjectured.contains(&n)
                || load::CONJECTURE_TRIGGERS.iter().any(|t| lower_name.contains(t))
            {
                mask |= conjecture_bit;
            }
            if triggers.with_formula.contains(&n) {
                mask |= formula_bit;
            }
            if lower_name.contains("decimal expansion") {
                mask |= decimal_bit;
            }
            if triggers.egf.contains(&n) {
                mask |= egf_bit;
            }
            if triggers.gf.contains(&n) {
                mask |= gf_bit;
            }
            if pari.contains(&n) {
                mask |= pari_bit;
            }
            let authors = author_names
                .get(&n)
                .map(|names| {
                    names
                        .iter()
                        .map(|name| Submitter {
                            name: name.clone(),
                            ref_id: 0,
                            num_programs: 0,
                        })
                        .collect()
                })
                .unwrap_or_default();
            sequences.push(Sequence {
                id: uid,
                name,
                keywords: mask,
                terms,
                authors,
                submitter: None,
            });
        }

        let submitters_path = stats.join("submitters.csv");
        let submitters = if submitters_path.exists() {
            stats::load_submitters(&submitters_path)?
        } else {
            Vec::new()
        };
        let programs_path = stats.join("programs.csv");
        let rows = if programs_path.exists() {
            stats::load_programs(&programs_path)?
        } else {
            Vec::new()
        };
        let call_graph_path = stats.join("call_graph.csv");
        let callers: HashMap<u32, Vec<Uid>> = if call_graph_path.exists() {
            stats::load_call_graph(&call_graph_path)?
        } else {
            HashMap::new()
        };

        let mut programs = Vec::with_capacity(rows.len());
        for row in rows {
            let submitter = submitters
                .get(row.submitter_ref as usize)
                .and_then(Clone::clone);
            let code = fs::read_to_string(program_path(data_dir, row.id)).unwrap_or_default();
            let (operations, ops_mask) = load::program_operations(&code, &optypes);
            let usages = callers
                .get(&row.id.number())
                .map(|ids| {
                    ids.iter()
                        .map(Uid::to_string)
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            let formula = triggers
                .first_formula
                .get(&row.id.number())
                .cloned()
                .unwrap_or_default();
            programs.push(Program {
                id: row.id,
                name: String::new(),
                code,
                submitter,
                keywords: row.keywords,
                ops_mask,
                operations,
                formula,
                length: row.length,
                usages,
            });
        }

        sequences.sort_by_key(|s| s.id);
        sequences.dedup_by_key(|s| s.id);
        programs.sort_by_key(|p| p.id);
        programs.dedup_by_key(|p| p.id);

        // Linear-scan merge over the parallel sorted arrays.
        let mut p = 0usize;
        for seq in &mut sequences {
            while p < programs.len() && programs[p].id < seq.id {
                p += 1;
            }
            if p < programs.len() && programs[p].id == seq.id {
                let prog = &mut programs[p];
                prog.keywords |= seq.keywords;
                seq.keywords = prog.keywords;
                prog.name.clone_from(&seq.name);
                seq.submitter.clone_from(&prog.submitter);
            }
        }

        info!(
            sequences = sequences.len(),
            programs = programs.len(),
            submitters = submitters.iter().flatten().count(),
            optypes = optypes.len(),
            "data index loaded"
        );
        Ok(DataIndex {
            sequences,
            programs,
            submitters,
            optypes,
        })
    }
}

/// Direct lookup by id: probe the slot where the entry would sit if ids
/// were dense (index == number), scan linearly in the indicated
/// direction, and fall back to a full scan. Returns a stable reference
/// into the slice.
pub fn find_by_id<T: HasUid>(items: &[T], id: Uid) -> Option<&T> {
    if items.is_empty() || id.is_zero() {
        return None;
    }
    let probe = (id.number() as usize).min(items.len() - 1);
    let found = match items[probe].uid().cmp(&id) {
        Ordering::Equal => Some(&items[probe]),
        Ordering::Less => items[probe + 1..]
            .iter()
            .take_while(|t| t.uid() <= id)
            .find(|t| t.uid() == id),
        Ordering::Greater => items[..probe]
            .iter()
            .rev()
            .take_while(|t| t.uid() >= id)
            .find(|t| t.uid() == id),
    };
    found.or_else(|| items.iter().find(|t| t.uid() == id))
}

/// Lazily loaded, droppable handle to the current index.
pub struct IndexHolder {
    data_dir: PathBuf,
    current: Mutex<Option<Arc<DataIndex>>>,
}

impl IndexHolder {
    pub fn new(data_dir: &Path) -> Self {
        IndexHolder {
            data_dir: data_dir.to_path_buf(),
            current: Mutex::new(None),
        }
    }

    /// The current index, loading it first if it was never built or was
    /// dropped for memory pressure.
    pub fn get(&self) -> Result<Arc<DataIndex>, IndexError> {
        let mut current = self.current.lock();
        if let Some(index) = current.as_ref() {
            return Ok(Arc::clone(index));
        }
        let index = Arc::new(DataIndex::load(&self.data_dir)?);
        *current = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Drop the loaded index; the next `get` reloads from disk.
    pub fn clear(&self) {
        *self.current.lock() = None;
    }
}
