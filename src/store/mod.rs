//! On-Disk Store Layout
//!
//! The data directory holds the mirrored catalog under `seqs/oeis/` (the
//! derived list files plus `names`, `stripped`, and the b-file tree) and
//! locally computed statistics under `stats/`. This module owns the derived
//! lists and the directory layout helpers; the submission checkpoint and the
//! data index build on top of it.

pub mod error;
pub mod list;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use list::ListStore;

use crate::uid::Field;

/// Registered derived lists: `(file name, field key)`.
pub const LIST_KEYS: &[(&str, char)] = &[
    ("authors", 'A'),
    ("comments", 'C'),
    ("formulas", 'F'),
    ("keywords", 'K'),
    ("offsets", 'O'),
    ("programs", 'o'),
];

/// Lists flushed with per-entry deduplication (only the newest entry per
/// id survives).
const DEDUP_LISTS: &[&str] = &["offsets"];

/// Subdirectory of the data dir holding the mirrored catalog files.
pub fn catalog_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("seqs").join("oeis")
}

/// Subdirectory of the data dir holding the stats CSVs.
pub fn stats_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("stats")
}

/// Path of a mined program's source file:
/// `<dataDir>/programs/oeis/<nnn>/A<NNNNNN>.asm`.
pub fn program_path(data_dir: &Path, uid: crate::uid::Uid) -> PathBuf {
    let padded = format!("{:06}", uid.number());
    data_dir
        .join("programs")
        .join("oeis")
        .join(&padded[..3])
        .join(format!("A{padded}.asm"))
}

/// The full set of registered derived lists for one data directory.
pub struct ListSet {
    lists: Vec<Arc<ListStore>>,
}

impl ListSet {
    /// Open all registered lists under `<dataDir>/seqs/oeis/`.
    pub fn open(data_dir: &Path) -> Self {
        let dir = catalog_dir(data_dir);
        let lists = LIST_KEYS
            .iter()
            .map(|(name, key)| Arc::new(ListStore::new(name, *key, &dir)))
            .collect();
        ListSet { lists }
    }

    /// Dispatch a batch of fields to every list; each list keeps the
    /// fields matching its key.
    pub fn update(&self, fields: &[Field]) {
        for list in &self.lists {
            list.update(fields);
        }
    }

    /// Flush every list, deduplicating the lists registered for it.
    /// Stops at the first failing list so the caller can halt the crawler.
    pub fn flush_all(&self) -> StoreResult<()> {
        for list in &self.lists {
            list.flush(DEDUP_LISTS.contains(&list.name()))?;
        }
        Ok(())
    }

    /// Look up one list by file name.
    pub fn get(&self, name: &str) -> Option<&Arc<ListStore>> {
        self.lists.iter().find(|l| l.name() == name)
    }

    /// All registered lists.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ListStore>> {
        self.lists.iter()
    }
}
