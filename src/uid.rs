//! Entry Identifiers and Upstream Fields
//!
//! A catalog entry is identified by a `Uid`: an uppercase domain letter
//! followed by a six-digit number, e.g. `A000045`. Uids are small value
//! types ordered by `(domain, number)`; the zero value means "absent".
//!
//! Upstream metadata arrives as text lines of the form
//! `%<K> A<NNNNNN> <content>`, one `Field` per line, where `<K>` is a
//! single letter selecting the derived list the content belongs to.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Largest entry number representable in the six-digit form.
pub const MAX_NUMBER: u32 = 999_999;

/// Errors produced when parsing a `Uid` from its string form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UidError {
    #[error("invalid id length: {0}")]
    Length(usize),

    #[error("invalid id domain: {0}")]
    Domain(char),

    #[error("invalid id number: {0}")]
    Number(String),
}

/// Globally unique entry identifier: domain letter plus entry number.
///
/// The zero value (`Uid::default()`) is the "absent" id; parsed ids
/// always carry an uppercase domain letter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid {
    domain: u8,
    number: u32,
}

impl Uid {
    /// Create a uid from a domain letter and number.
    pub fn new(domain: char, number: u32) -> Result<Self, UidError> {
        if !domain.is_ascii_uppercase() {
            return Err(UidError::Domain(domain));
        }
        if number > MAX_NUMBER {
            return Err(UidError::Number(number.to_string()));
        }
        Ok(Uid {
            domain: domain as u8,
            number,
        })
    }

    /// The domain letter, e.g. `'A'`.
    pub fn domain(&self) -> char {
        self.domain as char
    }

    /// The numeric part, `0..=999_999`.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Whether this is the zero ("absent") id.
    pub fn is_zero(&self) -> bool {
        self.domain == 0 && self.number == 0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:06}", self.domain as char, self.number)
    }
}

impl FromStr for Uid {
    type Err = UidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 2 || s.len() > 10 {
            return Err(UidError::Length(s.len()));
        }
        let mut chars = s.chars();
        let domain = chars.next().ok_or(UidError::Length(0))?;
        if !domain.is_ascii_uppercase() {
            return Err(UidError::Domain(domain));
        }
        let digits = &s[1..];
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(UidError::Number(digits.to_string()));
        }
        let number: u32 = digits
            .parse()
            .map_err(|_| UidError::Number(digits.to_string()))?;
        if number > MAX_NUMBER {
            return Err(UidError::Number(digits.to_string()));
        }
        Ok(Uid {
            domain: domain as u8,
            number,
        })
    }
}

impl Serialize for Uid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Uid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// One line of upstream metadata: `%<K> A<NNNNNN> <content>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Single-letter list key, e.g. `'K'` for keywords.
    pub key: char,
    /// Numeric part of the entry id the field belongs to.
    pub seq_id: u32,
    /// Opaque field payload.
    pub content: String,
}

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^%([A-Za-z]) A(\d{6})(?: (.*))?$").unwrap()
});

impl Field {
    /// Parse a single upstream line. Returns `None` for lines that do not
    /// match the field format; callers skip those.
    pub fn parse(line: &str) -> Option<Field> {
        let caps = FIELD_RE.captures(line.trim_end())?;
        let key = caps.get(1)?.as_str().chars().next()?;
        let seq_id: u32 = caps.get(2)?.as_str().parse().ok()?;
        let content = caps.get(3).map_or(String::new(), |m| m.as_str().to_string());
        Some(Field {
            key,
            seq_id,
            content,
        })
    }
}

/// Canonical on-disk location of the term-table ("b-file") for an entry:
/// `<dataDir>/seqs/oeis/b/<nnn>/b<NNNNNN>.txt.gz` where `<nnn>` is the
/// first three digits of the zero-padded number.
pub fn bfile_path(data_dir: &Path, uid: Uid) -> PathBuf {
    let padded = format!("{:06}", uid.number());
    data_dir
        .join("seqs")
        .join("oeis")
        .join("b")
        .join(&padded[..3])
        .join(format!("b{padded}.txt.gz"))
}
