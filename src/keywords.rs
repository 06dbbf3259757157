//! Keyword Codec
//!
//! A fixed table of keyword names with position `i` mapping to bit `i` of a
//! 64-bit mask. The first block of names mirrors the upstream catalog's
//! keyword vocabulary; the tail holds locally derived keywords (set during
//! index load from trigger phrases, formula presence, and program flags).
//!
//! Masks support the usual set algebra: `has_all(a, b)` iff `b ⊆ a`,
//! `has_none(a, b)` iff `a ∩ b = ∅`.

use std::collections::HashMap;
use std::sync::LazyLock;

use thiserror::Error;

/// Keyword table. Position i -> bit i. Order is load-bearing: `decode`
/// returns names in this order and the table must never be reordered, only
/// appended to.
pub const KEYWORDS: &[&str] = &[
    // Upstream catalog vocabulary
    "base", "bref", "changed", "cofr", "cons", "core", "dead", "dumb", "easy", "eigen", "fini",
    "frac", "full", "hard", "hear", "less", "look", "more", "mult", "new", "nice", "nonn", "obsc",
    "recycled", "sign", "tabf", "tabl", "uned", "unkn", "walk", "word",
    // Derived locally during index load
    "conjecture", "formula", "pari", "decimal-expansion", "egf-expansion", "gf-expansion", "loda",
    "loda-inceval", "loda-logeval", "loda-vireval", "loda-loop", "loda-formula", "loda-indirect",
];

static POSITIONS: LazyLock<HashMap<&'static str, u32>> = LazyLock::new(|| {
    KEYWORDS
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i as u32))
        .collect()
});

/// Errors produced by the keyword codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeywordError {
    #[error("unknown keyword: {0}")]
    Unknown(String),
}

/// Encode a set of keyword names into a bitmask. Fails on any name not in
/// the table.
pub fn encode<'a, I>(tokens: I) -> Result<u64, KeywordError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut mask = 0u64;
    for token in tokens {
        let pos = POSITIONS
            .get(token)
            .ok_or_else(|| KeywordError::Unknown(token.to_string()))?;
        mask |= 1u64 << pos;
    }
    Ok(mask)
}

/// Decode a bitmask into keyword names, in table order.
pub fn decode(mask: u64) -> Vec<&'static str> {
    KEYWORDS
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1u64 << i) != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// Whether a token names a known keyword.
pub fn is_known(token: &str) -> bool {
    POSITIONS.contains_key(token)
}

/// The single-bit mask for one known keyword name.
pub fn bit(token: &str) -> Result<u64, KeywordError> {
    POSITIONS
        .get(token)
        .map(|pos| 1u64 << pos)
        .ok_or_else(|| KeywordError::Unknown(token.to_string()))
}

/// `b ⊆ a` over bitmask sets.
pub fn has_all(a: u64, b: u64) -> bool {
    a & b == b
}

/// `a ∩ b = ∅` over bitmask sets.
pub fn has_none(a: u64, b: u64) -> bool {
    a & b == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_fits_in_mask() {
        assert!(KEYWORDS.len() <= 64);
    }

    #[test]
    fn test_table_has_no_duplicates() {
        assert_eq!(POSITIONS.len(), KEYWORDS.len());
    }

    #[test]
    fn test_encode_decode_round_trip_in_table_order() {
        // Deliberately out of table order
        let mask = encode(["nice", "core", "nonn"]).unwrap();
        assert_eq!(decode(mask), vec!["core", "nice", "nonn"]);
    }

    #[test]
    fn test_encode_unknown_fails() {
        let err = encode(["core", "no-such-keyword"]).unwrap_err();
        assert_eq!(err, KeywordError::Unknown("no-such-keyword".to_string()));
    }

    #[test]
    fn test_encode_empty_is_zero() {
        assert_eq!(encode([]).unwrap(), 0);
        assert!(decode(0).is_empty());
    }

    #[test]
    fn test_has_all() {
        let a = encode(["core", "nice", "nonn"]).unwrap();
        let b = encode(["core", "nonn"]).unwrap();
        assert!(has_all(a, b));
        assert!(!has_all(b, a));
        assert!(has_all(a, 0));
    }

    #[test]
    fn test_has_none() {
        let a = encode(["core", "nonn"]).unwrap();
        let b = encode(["hard"]).unwrap();
        assert!(has_none(a, b));
        assert!(!has_none(a, a));
        assert!(has_none(0, a));
    }

    #[test]
    fn test_is_known() {
        assert!(is_known("core"));
        assert!(is_known("loda-inceval"));
        assert!(!is_known("CORE"));
        assert!(!is_known(""));
    }

    #[test]
    fn test_bit_matches_encode() {
        for name in KEYWORDS {
            assert_eq!(bit(name).unwrap(), encode([*name]).unwrap());
        }
        assert!(bit("nope").is_err());
    }
}
