//! HTTP API DTOs
//!
//! Wire shapes for the intake and query endpoints. Masks travel as
//! decoded name lists; the 64-bit encodings never leave the process.

use serde::{Deserialize, Serialize};

use crate::index::{Program, Sequence, Submitter};
use crate::keywords;
use crate::uid::Uid;

/// `POST /submissions` response body. Always carried with HTTP 200; the
/// accept/reject decision lives in `status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub status: String,
    pub message: String,
}

impl SubmitOutcome {
    pub fn success() -> Self {
        SubmitOutcome {
            status: "success".to_string(),
            message: "Submission accepted".to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SubmitOutcome {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Query string of `GET /submissions`.
#[derive(Debug, Default, Deserialize)]
pub struct SubmissionsQuery {
    pub mode: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub submitter: Option<String>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

/// Query string of the search endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

/// Full sequence body for `GET /sequences/<UID>`.
#[derive(Debug, Serialize)]
pub struct SequenceDto {
    pub id: Uid,
    pub name: String,
    pub keywords: Vec<&'static str>,
    pub terms: String,
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter: Option<String>,
}

impl SequenceDto {
    pub fn from_sequence(seq: &Sequence) -> Self {
        SequenceDto {
            id: seq.id,
            name: seq.name.clone(),
            keywords: keywords::decode(seq.keywords),
            terms: seq.terms.clone(),
            authors: seq.authors.iter().map(|a| a.name.clone()).collect(),
            submitter: seq.submitter.as_ref().map(|s| s.name.clone()),
        }
    }
}

/// Full program body for `GET /programs/<UID>`.
#[derive(Debug, Serialize)]
pub struct ProgramDto {
    pub id: Uid,
    pub name: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter: Option<Submitter>,
    pub keywords: Vec<&'static str>,
    pub operations: Vec<String>,
    pub formula: String,
    pub length: u32,
    pub usages: String,
}

impl ProgramDto {
    pub fn from_program(prog: &Program) -> Self {
        ProgramDto {
            id: prog.id,
            name: prog.name.clone(),
            code: prog.code.clone(),
            submitter: prog.submitter.clone(),
            keywords: keywords::decode(prog.keywords),
            operations: prog.operations.clone(),
            formula: prog.formula.clone(),
            length: prog.length,
            usages: prog.usages.clone(),
        }
    }
}

/// One row of `GET /sequences/search`.
#[derive(Debug, Serialize)]
pub struct SequenceSearchItem {
    pub id: Uid,
    pub name: String,
}

/// One row of `GET /programs/search`.
#[derive(Debug, Serialize)]
pub struct ProgramSearchItem {
    pub id: Uid,
    pub name: String,
    pub keywords: Vec<&'static str>,
}

/// Search response envelope.
#[derive(Debug, Serialize)]
pub struct SearchPage<T> {
    pub total: usize,
    pub results: Vec<T>,
}

/// `POST /programs/eval` request body.
#[derive(Debug, Deserialize)]
pub struct EvalRequest {
    pub content: String,
    #[serde(rename = "numTerms")]
    pub num_terms: Option<u32>,
}

/// `POST /programs/export` request body.
#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub content: String,
    #[serde(default = "default_export_format")]
    pub format: String,
}

fn default_export_format() -> String {
    "pari".to_string()
}

/// `GET /stats` response body.
#[derive(Debug, Serialize)]
pub struct StatsDto {
    pub sequences: usize,
    pub programs: usize,
    pub submitters: usize,
    pub submissions: usize,
    pub queued_fetches: usize,
}

/// `GET /health` response body.
#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub submissions: usize,
}
