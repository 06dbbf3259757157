//! Upstream Catalog Client
//!
//! Fetches one entry's metadata from the upstream catalog as a text body of
//! `%<K> A<NNNNNN> <content>` lines. The transport is behind the
//! `CatalogClient` trait so the crawler's binary-search initialization and
//! walk are testable without a network.

use std::future::Future;

use tracing::trace;

use crate::crawler::CrawlerError;
use crate::uid::Field;

/// Source of per-entry field sets.
pub trait CatalogClient: Send + Sync {
    /// Fetch the fields of entry `seq_id`. Fails on transport errors, on
    /// HTTP status >= 400, and when no line of the body parses as a field.
    fn fetch(&self, seq_id: u32) -> impl Future<Output = Result<Vec<Field>, CrawlerError>> + Send;
}

/// HTTPS-backed catalog client.
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    /// `base_url` without a trailing slash, e.g. `https://oeis.org`.
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpCatalogClient {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn search_url(&self, seq_id: u32) -> String {
        format!("{}/search?q=id:A{:06}&fmt=text", self.base_url, seq_id)
    }
}

impl CatalogClient for HttpCatalogClient {
    async fn fetch(&self, seq_id: u32) -> Result<Vec<Field>, CrawlerError> {
        let url = self.search_url(seq_id);
        trace!(%url, "fetching entry");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(CrawlerError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let fields: Vec<Field> = body.lines().filter_map(Field::parse).collect();
        if fields.is_empty() {
            return Err(CrawlerError::NoFields(seq_id));
        }
        Ok(fields)
    }
}
