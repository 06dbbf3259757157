//! Term-Table Cache
//!
//! Raw term-tables ("b-files") are large per-entry text files listing
//! `n a(n)` pairs. They are mirrored on demand: a lookup serves the
//! cached gzip copy under `<dataDir>/seqs/oeis/b/<nnn>/`, fetching from
//! the upstream catalog on a miss. The submission pipeline deletes these
//! cached copies on b-file removal and sequence refresh; the next lookup
//! re-fetches.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::crawler::CrawlerError;
use crate::store::StoreError;
use crate::uid::{bfile_path, Uid};

/// Fetch-through cache of upstream term-tables.
pub struct TermTableCache {
    data_dir: PathBuf,
    base_url: String,
    client: reqwest::Client,
}

impl TermTableCache {
    pub fn new(data_dir: &Path, base_url: impl Into<String>) -> Self {
        TermTableCache {
            data_dir: data_dir.to_path_buf(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Location of the cached gzip copy for `id`.
    pub fn cached_path(&self, id: Uid) -> PathBuf {
        bfile_path(&self.data_dir, id)
    }

    fn upstream_url(&self, id: Uid) -> String {
        let padded = format!("{:06}", id.number());
        format!("{}/A{padded}/b{padded}.txt", self.base_url)
    }

    /// Read the cached gzip bytes, if present.
    pub fn read_cached(&self, id: Uid) -> Result<Option<Vec<u8>>, CrawlerError> {
        let path = self.cached_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let mut bytes = Vec::new();
        File::open(&path)
            .and_then(|mut file| file.read_to_end(&mut bytes))
            .map_err(StoreError::from)?;
        Ok(Some(bytes))
    }

    /// The gzip term-table for `id`: served from cache, fetched from the
    /// upstream catalog on a miss and cached via a temporary sibling so a
    /// failed fetch never leaves a partial file behind.
    pub async fn get(&self, id: Uid) -> Result<Vec<u8>, CrawlerError> {
        if let Some(bytes) = self.read_cached(id)? {
            debug!(%id, "term-table cache hit");
            return Ok(bytes);
        }

        let url = self.upstream_url(id);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(CrawlerError::Status(status.as_u16()));
        }
        let text = response.text().await?;
        let bytes = self.store(id, &text)?;
        info!(%id, bytes = bytes.len(), "term-table cached");
        Ok(bytes)
    }

    /// Compress and cache a fetched term-table, returning the gzip bytes.
    pub fn store(&self, id: Uid, text: &str) -> Result<Vec<u8>, CrawlerError> {
        let gz_bytes = gzip_bytes(text.as_bytes()).map_err(StoreError::from)?;
        let path = self.cached_path(id);
        write_atomic(&path, &gz_bytes).map_err(StoreError::from)?;
        Ok(gz_bytes)
    }
}

fn gzip_bytes(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Write via a temporary sibling and rename so readers never observe a
/// partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)
}
