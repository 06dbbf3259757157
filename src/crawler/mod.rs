//! Polite Catalog Crawler
//!
//! Walks the entry space with a randomized coprime step so every id in
//! `[1, maxId]` is visited exactly once per full cycle, with a bounded
//! queue of directed fetches that jump the walk. Initialization discovers
//! `maxId` by binary search over fetch success, then draws the walk start
//! and step size from the crawler's own PRNG.
//!
//! The crawler holds no scheduling policy: the owning scheduler decides
//! when to tick, flush, re-initialize, and restart after failures.

pub mod bfile;
pub mod client;

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

use crate::store::StoreError;
use crate::uid::Field;

pub use bfile::TermTableCache;
pub use client::{CatalogClient, HttpCatalogClient};

/// Upper bound (exclusive) of the id space searched during init.
const ID_SPACE: u32 = 1_000_000;

/// Errors produced by the crawler.
#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("crawler init failed: {0}")]
    Init(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("no fields recognized for A{0:06}")]
    NoFields(u32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Thread-safe bounded queue of directed fetches. Ids pushed here are
/// fetched before the walk continues.
#[derive(Default)]
pub struct NextIdQueue {
    queue: Mutex<VecDeque<u32>>,
}

impl NextIdQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(NextIdQueue::default())
    }

    /// Enqueue a directed fetch. Returns false when the queue already
    /// holds `max_len` entries.
    pub fn add(&self, seq_id: u32, max_len: usize) -> bool {
        let mut queue = self.queue.lock();
        if queue.len() >= max_len {
            return false;
        }
        queue.push_back(seq_id);
        true
    }

    pub fn pop(&self) -> Option<u32> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// Randomized coprime-step crawler over `[1, maxId]`.
pub struct Crawler<C> {
    client: C,
    next_ids: Arc<NextIdQueue>,
    rng: StdRng,
    max_id: u32,
    current_id: u32,
    step_size: u32,
    num_fetched: u32,
}

impl<C: CatalogClient> Crawler<C> {
    pub fn new(client: C, next_ids: Arc<NextIdQueue>) -> Self {
        Self::with_rng(client, next_ids, StdRng::from_entropy())
    }

    /// Deterministic construction for tests.
    pub fn with_rng(client: C, next_ids: Arc<NextIdQueue>, rng: StdRng) -> Self {
        Crawler {
            client,
            next_ids,
            rng,
            max_id: 0,
            current_id: 0,
            step_size: 0,
            num_fetched: 0,
        }
    }

    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    pub fn num_fetched(&self) -> u32 {
        self.num_fetched
    }

    pub fn step_size(&self) -> u32 {
        self.step_size
    }

    pub fn next_ids(&self) -> &Arc<NextIdQueue> {
        &self.next_ids
    }

    /// Discover `maxId` and re-randomize the walk parameters.
    ///
    /// `maxId` is the least id whose fetch fails, found by binary search
    /// over `[0, 1_000_000)` with silent probe fetches. The step size is
    /// drawn until it is coprime with `maxId`, bounded by `maxId`
    /// attempts, so a full cycle visits every id exactly once.
    pub async fn init(&mut self) -> Result<(), CrawlerError> {
        let mut low = 0u32;
        let mut high = ID_SPACE;
        while low < high {
            let mid = low + (high - low) / 2;
            match self.client.fetch(mid).await {
                Ok(_) => low = mid + 1,
                Err(_) => high = mid,
            }
        }
        if low == 0 {
            return Err(CrawlerError::Init("no entries found upstream".to_string()));
        }
        self.max_id = low;
        self.current_id = self.rng.gen_range(1..=self.max_id);
        self.step_size = 0;
        for _ in 0..self.max_id {
            let candidate = self.rng.gen_range(1..=self.max_id);
            if gcd(candidate, self.max_id) == 1 {
                self.step_size = candidate;
                break;
            }
        }
        if self.step_size == 0 {
            return Err(CrawlerError::Init(format!(
                "no step size coprime with {}",
                self.max_id
            )));
        }
        self.num_fetched = 0;
        info!(
            max_id = self.max_id,
            start = self.current_id,
            step = self.step_size,
            "crawler initialized"
        );
        Ok(())
    }

    /// Fetch the next entry: a queued directed fetch if one is pending,
    /// otherwise the next id of the walk. Re-initializes first when a full
    /// cycle has completed. Returns the id fetched and its fields.
    pub async fn fetch_next(&mut self) -> Result<(u32, Vec<Field>), CrawlerError> {
        if let Some(seq_id) = self.next_ids.pop() {
            debug!(seq_id, "directed fetch");
            let fields = self.client.fetch(seq_id).await?;
            self.num_fetched += 1;
            return Ok((seq_id, fields));
        }
        if self.max_id == 0 || self.num_fetched == self.max_id {
            self.init().await?;
        }
        self.current_id = advance(self.current_id, self.step_size, self.max_id);
        let fields = self.client.fetch(self.current_id).await?;
        self.num_fetched += 1;
        Ok((self.current_id, fields))
    }
}

/// One step of the coprime walk: stays within `[1, max]` and, with
/// `gcd(step, max) == 1`, enumerates a permutation of `[1, max]`.
pub fn advance(current: u32, step: u32, max: u32) -> u32 {
    1 + ((current - 1 + step) % max)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}
