//! Background Schedulers
//!
//! Three long-lived loops wrap the core with periodic policy:
//!
//! - the crawler loop fetches one entry per tick, dispatches its fields to
//!   the derived lists, and owns the flush/re-init/gap-seeding cadence;
//! - the maintenance loop checkpoints the submission log, publishes
//!   metrics, and resets the per-user quota window;
//! - a restart timer re-initializes a stopped crawler after a pause.
//!
//! All loops stop on the shared shutdown watch channel.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CrawlerConfig;
use crate::crawler::{CatalogClient, Crawler, CrawlerError, HttpCatalogClient};
use crate::http::AppState;
use crate::keywords;
use crate::store::ListSet;
use crate::uid::Field;

/// The crawler with its scheduling policy: counters for the periodic
/// flush, re-initialization, and gap-seeding decisions.
pub struct CrawlerTask<C: CatalogClient> {
    crawler: Crawler<C>,
    lists: Arc<ListSet>,
    config: CrawlerConfig,
    fetches: u64,
    initialized: bool,
}

impl<C: CatalogClient> CrawlerTask<C> {
    pub fn new(crawler: Crawler<C>, lists: Arc<ListSet>, config: CrawlerConfig) -> Self {
        CrawlerTask {
            crawler,
            lists,
            config,
            fetches: 0,
            initialized: false,
        }
    }

    pub fn crawler(&self) -> &Crawler<C> {
        &self.crawler
    }

    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    /// One scheduling step: fetch, dispatch, and apply the periodic
    /// policy. Any error leaves the task marked stopped so the next tick
    /// goes through re-initialization.
    pub async fn tick(&mut self) -> Result<(), CrawlerError> {
        let result = self.step().await;
        if result.is_err() {
            self.initialized = false;
        }
        result
    }

    async fn step(&mut self) -> Result<(), CrawlerError> {
        if !self.initialized {
            self.crawler.init().await?;
            self.initialized = true;
        }

        let (seq_id, fields) = self.crawler.fetch_next().await?;
        let fields = filter_keyword_fields(fields);
        self.lists.update(&fields);
        self.fetches += 1;
        debug!(seq_id, fields = fields.len(), "entry dispatched");

        if self.config.flush_interval > 0 && self.fetches % u64::from(self.config.flush_interval) == 0
        {
            self.lists.flush_all()?;
        }
        if self.config.reinit_interval > 0
            && self.fetches % u64::from(self.config.reinit_interval) == 0
        {
            self.crawler.init().await?;
        }
        if self.config.ids_cache_size > 0
            && self.fetches % u64::from(self.config.ids_cache_size) == 0
            && rand::thread_rng().gen_bool(self.config.ids_fetch_ratio.clamp(0.0, 1.0))
        {
            self.seed_missing_ids()?;
        }
        Ok(())
    }

    /// Refill the directed-fetch queue with gaps from the offsets list so
    /// unseen entries are prioritized over the walk.
    fn seed_missing_ids(&self) -> Result<(), CrawlerError> {
        let Some(offsets) = self.lists.get("offsets") else {
            return Ok(());
        };
        let (missing, total) = offsets.find_missing_ids(
            self.crawler.max_id(),
            self.config.ids_cache_size as usize,
        )?;
        let mut queued = 0usize;
        for seq_id in missing {
            if !self
                .crawler
                .next_ids()
                .add(seq_id, self.config.max_queue_size)
            {
                break;
            }
            queued += 1;
        }
        info!(queued, gaps = total, "missing ids queued");
        Ok(())
    }
}

/// Keyword fields are reduced to the known vocabulary before dispatch;
/// fields left without any known keyword are dropped.
pub fn filter_keyword_fields(fields: Vec<Field>) -> Vec<Field> {
    fields
        .into_iter()
        .filter_map(|mut field| {
            if field.key != 'K' {
                return Some(field);
            }
            let known: Vec<&str> = field
                .content
                .split(',')
                .map(str::trim)
                .filter(|kw| keywords::is_known(kw))
                .collect();
            if known.is_empty() {
                return None;
            }
            field.content = known.join(",");
            Some(field)
        })
        .collect()
}

/// Drive the crawler task until shutdown: one tick per fetch interval,
/// with the restart pause applied after any error.
pub async fn run_crawler_loop<C: CatalogClient>(
    state: Arc<AppState>,
    mut task: CrawlerTask<C>,
    mut shutdown: watch::Receiver<bool>,
) {
    let fetch_interval = Duration::from_secs(state.config.crawler.fetch_interval_secs.max(1));
    let restart_pause = Duration::from_secs(state.config.crawler.restart_pause_secs.max(1));
    let mut interval = tokio::time::interval(fetch_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                info!("crawler_loop_shutdown");
                break;
            }
        }
        match task.tick().await {
            Ok(()) => {
                state
                    .metrics
                    .set("crawler_fetched_total", &[], task.fetches() as f64);
                state
                    .metrics
                    .set("crawler_max_id", &[], f64::from(task.crawler().max_id()));
            }
            Err(err) => {
                warn!(error = %err, pause_secs = restart_pause.as_secs(), "crawler stopped, restart scheduled");
                tokio::select! {
                    () = tokio::time::sleep(restart_pause) => {}
                    _ = shutdown.changed() => {
                        info!("crawler_loop_shutdown");
                        break;
                    }
                }
            }
        }
    }
}

/// Checkpoint, metrics, and user-stats maintenance on a fixed cadence.
pub async fn run_maintenance_loop(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let tick = Duration::from_secs(state.config.submissions.checkpoint_interval_secs.max(1));
    let mut interval = tokio::time::interval(tick);
    // Skip the immediate first tick.
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(err) = state.log.write_checkpoint() {
                    warn!(error = %err, "checkpoint failed");
                }
                state.log.publish_metrics(&state.metrics);
                state.log.clear_user_stats();
                state.metrics.set("submissions_total", &[], state.log.len() as f64);
            }
            _ = shutdown.changed() => {
                info!("maintenance_loop_shutdown");
                break;
            }
        }
    }
}

/// Spawn all background loops. Dropping or signalling the returned sender
/// stops them.
pub fn spawn_background_tasks(state: &Arc<AppState>) -> (watch::Sender<bool>, Vec<JoinHandle<()>>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    handles.push(tokio::spawn(run_maintenance_loop(
        Arc::clone(state),
        shutdown_rx.clone(),
    )));

    if state.config.crawler.enabled {
        let lists = Arc::new(ListSet::open(&state.config.storage.data_dir));
        let client = HttpCatalogClient::new(state.config.upstream.base_url.clone());
        let crawler = Crawler::new(client, Arc::clone(&state.next_ids));
        let task = CrawlerTask::new(crawler, lists, state.config.crawler.clone());
        handles.push(tokio::spawn(run_crawler_loop(
            Arc::clone(state),
            task,
            shutdown_rx,
        )));
    }

    (shutdown_tx, handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::NextIdQueue;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    struct FakeClient {
        max_id: u32,
    }

    impl CatalogClient for FakeClient {
        async fn fetch(&self, seq_id: u32) -> Result<Vec<Field>, CrawlerError> {
            if seq_id >= 1 && seq_id < self.max_id {
                Ok(vec![
                    Field {
                        key: 'O',
                        seq_id,
                        content: "1,1".to_string(),
                    },
                    Field {
                        key: 'K',
                        seq_id,
                        content: "nonn,bogus".to_string(),
                    },
                ])
            } else {
                Err(CrawlerError::NoFields(seq_id))
            }
        }
    }

    fn make_task(tmp: &TempDir, max_id: u32, config: CrawlerConfig) -> CrawlerTask<FakeClient> {
        let lists = Arc::new(ListSet::open(tmp.path()));
        let crawler = Crawler::with_rng(
            FakeClient { max_id },
            NextIdQueue::new(),
            StdRng::seed_from_u64(3),
        );
        CrawlerTask::new(crawler, lists, config)
    }

    #[test]
    fn test_filter_keyword_fields() {
        let fields = vec![
            Field {
                key: 'K',
                seq_id: 1,
                content: "nonn,bogus,core".to_string(),
            },
            Field {
                key: 'K',
                seq_id: 2,
                content: "onlybogus".to_string(),
            },
            Field {
                key: 'C',
                seq_id: 3,
                content: "anything goes".to_string(),
            },
        ];
        let filtered = filter_keyword_fields(fields);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].content, "nonn,core");
        assert_eq!(filtered[1].key, 'C');
    }

    #[tokio::test]
    async fn test_tick_initializes_then_dispatches() {
        let tmp = TempDir::new().unwrap();
        let config = CrawlerConfig {
            flush_interval: 0,
            reinit_interval: 0,
            ids_cache_size: 0,
            ..CrawlerConfig::default()
        };
        let mut task = make_task(&tmp, 16, config);
        task.tick().await.unwrap();
        assert_eq!(task.fetches(), 1);
        assert!(task.crawler().max_id() > 0);
        // Both the offsets and keywords lists saw the fields.
        assert_eq!(task.lists.get("offsets").unwrap().pending(), 1);
        assert_eq!(task.lists.get("keywords").unwrap().pending(), 1);
    }

    #[tokio::test]
    async fn test_flush_cadence_writes_lists() {
        let tmp = TempDir::new().unwrap();
        let config = CrawlerConfig {
            flush_interval: 2,
            reinit_interval: 0,
            ids_cache_size: 0,
            ..CrawlerConfig::default()
        };
        let mut task = make_task(&tmp, 16, config);
        let mut done = 0;
        while done < 2 {
            if task.tick().await.is_ok() {
                done += 1;
            }
        }
        assert_eq!(task.lists.get("offsets").unwrap().pending(), 0);
        assert!(task.lists.get("offsets").unwrap().path().exists());
    }

    #[tokio::test]
    async fn test_gap_seeding_fills_queue() {
        let tmp = TempDir::new().unwrap();
        let config = CrawlerConfig {
            flush_interval: 1,
            reinit_interval: 0,
            ids_cache_size: 1,
            ids_fetch_ratio: 1.0,
            ..CrawlerConfig::default()
        };
        let mut task = make_task(&tmp, 16, config);
        let mut done = 0;
        while done < 1 {
            if task.tick().await.is_ok() {
                done += 1;
            }
        }
        // One entry flushed; every other id below max_id is a gap.
        assert!(!task.crawler().next_ids().is_empty());
    }

    #[tokio::test]
    async fn test_error_marks_task_for_reinit() {
        let tmp = TempDir::new().unwrap();
        let config = CrawlerConfig {
            flush_interval: 0,
            reinit_interval: 0,
            ids_cache_size: 0,
            ..CrawlerConfig::default()
        };
        let mut task = make_task(&tmp, 4, config);
        // Force a directed fetch of a failing id.
        task.crawler.next_ids().add(9999, 10);
        // First tick initializes, then the directed fetch fails.
        assert!(task.tick().await.is_err());
        assert!(!task.initialized);
        // The next tick recovers by re-initializing.
        let mut recovered = false;
        for _ in 0..4 {
            if task.tick().await.is_ok() {
                recovered = true;
                break;
            }
        }
        assert!(recovered);
    }
}
