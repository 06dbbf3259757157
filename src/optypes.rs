//! Operation-Type Codec
//!
//! Like the keyword codec, but data-driven: the table of operation names is
//! loaded at startup from a stats CSV whose `ref_id` column gives the bit
//! position of each name. Bit 0 is unused; ref_ids must be unique and
//! contiguous in `1..=N`, and construction fails fast on any violation so a
//! malformed stats drop cannot silently skew search results.
//!
//! CSV schema: `name,ref_id,num_programs`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors produced while building or using the op-type codec.
#[derive(Error, Debug)]
pub enum OpTypeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("duplicate operation name: {0}")]
    DuplicateName(String),

    #[error("duplicate ref_id: {0}")]
    DuplicateRefId(i64),

    #[error("invalid ref_id: {0}")]
    InvalidRefId(i64),

    #[error("ref_id gap: no operation with ref_id {0}")]
    RefIdGap(usize),

    #[error("too many operation types: {0} (limit 63)")]
    TooMany(usize),

    #[error("unknown operation type: {0}")]
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct OpTypeRecord {
    name: String,
    ref_id: i64,
    #[serde(rename = "num_programs")]
    #[allow(dead_code)]
    num_programs: u64,
}

/// Bijection between operation-type names and bit positions of a 64-bit
/// mask. Built once at load time and treated as read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct OpTypeIndex {
    /// `names[i]` is the operation with ref_id `i + 1` (bit `i + 1`).
    names: Vec<String>,
}

impl OpTypeIndex {
    /// An index with no known operations. Every encode of a non-empty set
    /// fails; every mask decodes to nothing.
    pub fn empty() -> Self {
        OpTypeIndex { names: Vec::new() }
    }

    /// Load the codec from a CSV file at `path`.
    pub fn load(path: &Path) -> Result<Self, OpTypeError> {
        Self::from_reader(File::open(path)?)
    }

    /// Build the codec from CSV content.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, OpTypeError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();
        for result in csv_reader.deserialize() {
            let record: OpTypeRecord = result?;
            records.push(record);
        }
        if records.len() > 63 {
            return Err(OpTypeError::TooMany(records.len()));
        }

        let mut slots: Vec<Option<String>> = vec![None; records.len()];
        for record in records {
            if record.ref_id <= 0 {
                return Err(OpTypeError::InvalidRefId(record.ref_id));
            }
            let idx = record.ref_id as usize - 1;
            if idx >= slots.len() {
                // A ref_id beyond N implies a gap somewhere below it.
                return Err(OpTypeError::InvalidRefId(record.ref_id));
            }
            if slots[idx].is_some() {
                return Err(OpTypeError::DuplicateRefId(record.ref_id));
            }
            if slots.iter().flatten().any(|n| *n == record.name) {
                return Err(OpTypeError::DuplicateName(record.name));
            }
            slots[idx] = Some(record.name);
        }

        let mut names = Vec::with_capacity(slots.len());
        for (i, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(name) => names.push(name),
                None => return Err(OpTypeError::RefIdGap(i + 1)),
            }
        }
        Ok(OpTypeIndex { names })
    }

    /// Number of known operation types.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether a token names a known operation type.
    pub fn is_known(&self, token: &str) -> bool {
        self.names.iter().any(|n| n == token)
    }

    /// The single-bit mask for one operation name, if known.
    pub fn bit(&self, token: &str) -> Option<u64> {
        self.names
            .iter()
            .position(|n| n == token)
            .map(|i| 1u64 << (i + 1))
    }

    /// Encode a set of operation names into a bitmask. Fails if any name
    /// is unknown.
    pub fn encode<'a, I>(&self, tokens: I) -> Result<u64, OpTypeError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut mask = 0u64;
        for token in tokens {
            mask |= self
                .bit(token)
                .ok_or_else(|| OpTypeError::Unknown(token.to_string()))?;
        }
        Ok(mask)
    }

    /// Decode a bitmask into operation names, in ref_id order.
    pub fn decode(&self, mask: u64) -> Vec<&str> {
        self.names
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1u64 << (i + 1)) != 0)
            .map(|(_, name)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_csv() -> &'static str {
        "name,ref_id,num_programs\nmov,1,100\nadd,2,90\nsub,3,80\nlpb,4,70\nlpe,5,70\n"
    }

    #[test]
    fn test_load_valid_csv() {
        let index = OpTypeIndex::from_reader(sample_csv().as_bytes()).unwrap();
        assert_eq!(index.len(), 5);
        assert!(index.is_known("mov"));
        assert!(index.is_known("lpe"));
        assert!(!index.is_known("nop"));
    }

    #[test]
    fn test_bit_zero_unused() {
        let index = OpTypeIndex::from_reader(sample_csv().as_bytes()).unwrap();
        assert_eq!(index.bit("mov"), Some(1 << 1));
        assert_eq!(index.bit("lpe"), Some(1 << 5));
    }

    #[test]
    fn test_encode_decode_in_ref_id_order() {
        let index = OpTypeIndex::from_reader(sample_csv().as_bytes()).unwrap();
        let mask = index.encode(["sub", "mov"]).unwrap();
        assert_eq!(index.decode(mask), vec!["mov", "sub"]);
    }

    #[test]
    fn test_encode_unknown_fails() {
        let index = OpTypeIndex::from_reader(sample_csv().as_bytes()).unwrap();
        assert!(matches!(
            index.encode(["mov", "jmp"]),
            Err(OpTypeError::Unknown(name)) if name == "jmp"
        ));
    }

    #[test]
    fn test_duplicate_name_fails() {
        let csv = "name,ref_id,num_programs\nmov,1,1\nmov,2,1\n";
        assert!(matches!(
            OpTypeIndex::from_reader(csv.as_bytes()),
            Err(OpTypeError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_duplicate_ref_id_fails() {
        let csv = "name,ref_id,num_programs\nmov,1,1\nadd,1,1\n";
        assert!(matches!(
            OpTypeIndex::from_reader(csv.as_bytes()),
            Err(OpTypeError::DuplicateRefId(1))
        ));
    }

    #[test]
    fn test_non_positive_ref_id_fails() {
        let csv = "name,ref_id,num_programs\nmov,0,1\n";
        assert!(matches!(
            OpTypeIndex::from_reader(csv.as_bytes()),
            Err(OpTypeError::InvalidRefId(0))
        ));
        let csv = "name,ref_id,num_programs\nmov,-3,1\n";
        assert!(matches!(
            OpTypeIndex::from_reader(csv.as_bytes()),
            Err(OpTypeError::InvalidRefId(-3))
        ));
    }

    #[test]
    fn test_ref_id_gap_fails() {
        let csv = "name,ref_id,num_programs\nmov,1,1\nadd,3,1\n";
        assert!(OpTypeIndex::from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_empty_index() {
        let index = OpTypeIndex::empty();
        assert!(index.is_empty());
        assert!(index.decode(u64::MAX).is_empty());
        assert!(index.encode(["mov"]).is_err());
        assert_eq!(index.encode([]).unwrap(), 0);
    }
}
