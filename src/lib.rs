//! # Seqmine Backend
//!
//! Backend for a distributed program-mining platform that searches for
//! short register-machine programs generating integer sequences from a
//! large public catalog. Three tightly coupled responsibilities:
//!
//! 1. **Catalog mirroring and enrichment** — a polite randomized crawler
//!    pulls per-entry metadata from the upstream catalog and maintains
//!    per-key derived list files (authors, comments, formulas, keywords,
//!    offsets, programs) with an append/merge/dedup flush pipeline.
//! 2. **Submission intake** — mining workers POST program contributions;
//!    admission control rejects duplicates and abuse, accepted work is
//!    checkpointed to disk and exposed for downstream consumption.
//! 3. **Queryable data index** — the mirrored files plus locally computed
//!    stats load into a memory-resident index supporting id lookup and
//!    keyword/operation-type search.
//!
//! ## Architecture
//!
//! ```text
//! Upstream catalog
//!     ↓ fetch (coprime walk + directed queue)
//! [Crawler]  →  Fields  →  [Derived lists]  →  flush/merge  →  files
//!                                                               ↓
//! Workers → [HTTP intake] → [Submission log] → checkpoint    [Data index]
//!                                                               ↓
//!                                    [Search] ← lookup ← HTTP queries
//! ```
//!
//! Background loops (crawler ticks, checkpoint/metrics maintenance,
//! crawler restart) run as tokio tasks behind a shared shutdown channel;
//! shared state sits behind one lock per resource.

pub mod config;
pub mod crawler;
pub mod http;
pub mod index;
pub mod keywords;
pub mod metrics;
pub mod optypes;
pub mod scheduler;
pub mod search;
pub mod store;
pub mod submissions;
pub mod tool;
pub mod uid;

pub use config::Config;
pub use http::AppState;
pub use uid::Uid;
