//! Derived List Store Error Types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the on-disk list store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A line in an existing list file did not match the grouped format.
    /// Fatal for the running flush; the live file is left intact.
    #[error("malformed line {line_no} in {path:?}: {line:?}")]
    Malformed {
        path: PathBuf,
        line_no: usize,
        line: String,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
