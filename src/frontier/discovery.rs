//! Scroll-driven frontier discovery loop

use crate::config::DiscoveryConfig;
use crate::frontier::{DedupCache, RenderSession};
use crate::storage::{lock_storage, SharedStorage, Storage};
use crate::url::item_url;
use crate::{ConfigError, Result};
use rand::Rng;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";
const PAGE_EXTENT: &str = "document.body.scrollHeight";

/// Why a discovery run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Ran the requested number of rounds
    IterationCap,
    /// Too many consecutive rounds without new items
    Stagnant,
    /// Page extent stayed the same for too many rounds
    ExtentUnchanged,
}

/// Outcome of a discovery run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub rounds: u32,
    pub items_added: usize,
    pub reason: TerminationReason,
}

/// What one scroll round observed
#[derive(Debug, Clone, Copy)]
struct RoundObservation {
    count_before: usize,
    count_after: usize,
    extent_before: i64,
    extent_after: i64,
}

/// Drives a [`RenderSession`] over the listing page and enqueues item URLs
pub struct DiscoveryLoop<S: RenderSession> {
    session: S,
    config: DiscoveryConfig,
    id_pattern: Regex,
    storage: SharedStorage,
    cache: Arc<DedupCache>,
}

impl<S: RenderSession> DiscoveryLoop<S> {
    pub fn new(
        session: S,
        config: DiscoveryConfig,
        storage: SharedStorage,
        cache: Arc<DedupCache>,
    ) -> Result<Self> {
        let id_pattern = Regex::new(&config.id_pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("id-pattern: {}", e)))?;

        Ok(Self {
            session,
            config,
            id_pattern,
            storage,
            cache,
        })
    }

    /// Runs up to `max_iterations` scroll rounds
    ///
    /// Navigation failure aborts the run; every later error is logged and
    /// the loop keeps going.
    pub async fn run(mut self, max_iterations: u32) -> Result<DiscoveryReport> {
        let storage = Arc::clone(&self.storage);
        self.cache
            .populate_with(|| -> Result<Vec<String>> { Ok(lock_storage(&storage)?.all_urls()?) })?;
        info!("Dedup cache holds {} known item URLs", self.cache.len());

        self.session.navigate(&self.config.start_url).await?;
        info!(
            "Opened {} (up to {} scroll rounds)",
            self.config.start_url, max_iterations
        );
        let initial_wait = random_between(
            self.config.initial_wait_min_ms,
            self.config.initial_wait_max_ms,
        );
        tokio::time::sleep(Duration::from_millis(initial_wait)).await;

        let mut stagnant: u32 = 0;
        let mut unchanged: u32 = 0;
        let mut previous_extent: i64 = 0;
        let mut items_added = 0;
        let mut rounds = 0;
        let mut reason = TerminationReason::IterationCap;

        for round in 0..max_iterations {
            rounds = round + 1;

            let observation = match self.scroll_round().await {
                Ok(observation) => {
                    if observation.count_after > observation.count_before {
                        debug!(
                            "Round {}: {} -> {} items",
                            rounds, observation.count_before, observation.count_after
                        );
                        stagnant = 0;
                    } else {
                        stagnant += 1;
                    }
                    observation
                }
                Err(e) => {
                    warn!("Scroll round {} failed: {}", rounds, e);
                    stagnant += 1;
                    RoundObservation {
                        count_before: 0,
                        count_after: 0,
                        extent_before: 0,
                        extent_after: 0,
                    }
                }
            };

            if rounds % self.config.flush_interval == 0 {
                items_added += self.collect_logged().await;
            }

            if stagnant >= self.config.stagnation_threshold {
                info!("No new items for {} rounds, stopping", stagnant);
                reason = TerminationReason::Stagnant;
                break;
            }

            if previous_extent > 0
                && observation.extent_before == previous_extent
                && observation.extent_after == observation.extent_before
            {
                unchanged += 1;
                if unchanged >= self.config.unchanged_extent_threshold {
                    info!("Page extent unchanged for {} rounds, stopping", unchanged);
                    reason = TerminationReason::ExtentUnchanged;
                    break;
                }
            } else {
                unchanged = 0;
            }

            previous_extent = observation.extent_after;
        }

        items_added += self.collect_logged().await;
        info!(
            "Discovery finished after {} rounds ({:?}), {} new items",
            rounds, reason, items_added
        );

        Ok(DiscoveryReport {
            rounds,
            items_added,
            reason,
        })
    }

    /// Scrolls once and waits for the item count to grow
    async fn scroll_round(&mut self) -> Result<RoundObservation> {
        let count_before = self.session.count(&self.config.item_selector).await?;
        let extent_before = self.read_extent().await;

        if let Err(e) = self.session.execute_script(SCROLL_TO_BOTTOM).await {
            warn!("Scroll failed: {}", e);
        }

        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;

        let mut count_after = count_before;
        for _ in 0..self.config.max_polls {
            tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
            match self.session.count(&self.config.item_selector).await {
                Ok(count) => {
                    count_after = count;
                    if count > count_before {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Polling item count failed: {}", e);
                    break;
                }
            }
        }

        let extent_before = extent_before.unwrap_or(0);
        let extent_after = self.read_extent().await.unwrap_or(extent_before);

        Ok(RoundObservation {
            count_before,
            count_after,
            extent_before,
            extent_after,
        })
    }

    async fn read_extent(&mut self) -> Option<i64> {
        match self.session.execute_script(PAGE_EXTENT).await {
            Ok(value) => value.as_i64(),
            Err(e) => {
                warn!("Reading page extent failed: {}", e);
                None
            }
        }
    }

    async fn collect_logged(&mut self) -> usize {
        match self.collect_and_enqueue().await {
            Ok(added) => added,
            Err(e) => {
                error!("Collecting item URLs failed: {}", e);
                0
            }
        }
    }

    /// Scans the rendered links and enqueues every unseen item URL
    ///
    /// Returns the number of items actually inserted.
    async fn collect_and_enqueue(&mut self) -> Result<usize> {
        let links = self.session.query_all(&self.config.link_selector).await?;

        let mut pending = Vec::new();
        let mut added = 0;

        for link in &links {
            let value = match self
                .session
                .element_attribute(link, &self.config.id_attribute)
                .await
            {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping link: {}", e);
                    continue;
                }
            };

            let Some(id) = self.id_pattern.captures(&value).and_then(|c| c.get(1)) else {
                debug!("No item id in '{}'", value);
                continue;
            };

            let url = item_url(&self.config.item_url_base, id.as_str());
            if self.cache.add(&url) {
                pending.push(url);
                if pending.len() >= self.config.flush_batch_size {
                    added += self.flush(&mut pending)?;
                }
            }
        }

        added += self.flush(&mut pending)?;
        if added > 0 {
            info!("Enqueued {} new items ({} links scanned)", added, links.len());
        }
        Ok(added)
    }

    /// Writes pending URLs to the store
    ///
    /// On failure the URLs are dropped from the cache as well, so a later
    /// collect sees them as new again.
    fn flush(&self, pending: &mut Vec<String>) -> Result<usize> {
        if pending.is_empty() {
            return Ok(0);
        }
        let result = lock_storage(&self.storage)
            .and_then(|mut storage| Ok(storage.insert_new_items(&pending[..])?));
        if result.is_err() {
            self.cache.remove_all(pending);
        }
        pending.clear();
        result
    }
}

fn random_between(min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::within;
    use crate::storage::SqliteStorage;
    use crate::HarvestError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const HUNG_CALL_LIMIT: Duration = Duration::from_millis(20);

    /// Listing that reveals `page_size` more items per scroll until
    /// `grow_scrolls` scrolls have happened
    struct FakeListing {
        scrolls: usize,
        grow_scrolls: usize,
        page_size: usize,
        fail_counts: bool,
        hang_scripts: bool,
    }

    impl FakeListing {
        fn new(grow_scrolls: usize) -> Self {
            Self {
                scrolls: 0,
                grow_scrolls,
                page_size: 10,
                fail_counts: false,
                hang_scripts: false,
            }
        }

        fn visible(&self) -> usize {
            self.page_size * (1 + self.scrolls.min(self.grow_scrolls))
        }
    }

    #[async_trait]
    impl RenderSession for FakeListing {
        type Element = String;

        async fn navigate(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn query_all(&mut self, selector: &str) -> Result<Vec<String>> {
            if self.fail_counts && selector.ends_with("li") {
                return Err(HarvestError::Render("detached".to_string()));
            }
            if self.hang_scripts && selector.ends_with("li") {
                return within(HUNG_CALL_LIMIT, "query", std::future::pending()).await;
            }
            Ok((1..=self.visible())
                .map(|id| format!("fn_prvwCheck('{}', 'N')", id))
                .collect())
        }

        async fn execute_script(&mut self, script: &str) -> Result<serde_json::Value> {
            if self.hang_scripts {
                return within(HUNG_CALL_LIMIT, "script", std::future::pending()).await;
            }
            if script.contains("scrollTo") {
                self.scrolls += 1;
                return Ok(serde_json::Value::Null);
            }
            Ok(serde_json::json!(self.visible() * 100))
        }

        async fn element_attribute(&mut self, element: &String, name: &str) -> Result<Option<String>> {
            Ok((name == "onclick").then(|| element.clone()))
        }
    }

    fn fast_config() -> DiscoveryConfig {
        DiscoveryConfig {
            start_url: "https://shop.example.com/list".to_string(),
            item_url_base: "https://shop.example.com/item?goodsNo=".to_string(),
            poll_interval_ms: 0,
            max_polls: 2,
            settle_ms: 0,
            initial_wait_min_ms: 0,
            initial_wait_max_ms: 0,
            ..DiscoveryConfig::default()
        }
    }

    fn shared_storage() -> SharedStorage {
        Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_stops_after_stagnant_rounds() {
        let mut config = fast_config();
        config.stagnation_threshold = 5;

        let storage = shared_storage();
        let discovery = DiscoveryLoop::new(
            FakeListing::new(1),
            config,
            Arc::clone(&storage),
            Arc::new(DedupCache::new()),
        )
        .unwrap();

        let report = discovery.run(10).await.unwrap();

        assert_eq!(report.rounds, 6);
        assert_eq!(report.reason, TerminationReason::Stagnant);
        assert_eq!(report.items_added, 20);
        assert_eq!(storage.lock().unwrap().count_items().unwrap(), 20);
    }

    #[tokio::test]
    async fn test_stops_when_extent_unchanged() {
        let mut config = fast_config();
        config.unchanged_extent_threshold = 3;

        let discovery = DiscoveryLoop::new(
            FakeListing::new(0),
            config,
            shared_storage(),
            Arc::new(DedupCache::new()),
        )
        .unwrap();

        let report = discovery.run(50).await.unwrap();

        // round 1 records the extent, rounds 2-4 see it unchanged
        assert_eq!(report.rounds, 4);
        assert_eq!(report.reason, TerminationReason::ExtentUnchanged);
    }

    #[tokio::test]
    async fn test_iteration_cap_and_final_collect() {
        let config = fast_config();
        let storage = shared_storage();
        let discovery = DiscoveryLoop::new(
            FakeListing::new(100),
            config,
            Arc::clone(&storage),
            Arc::new(DedupCache::new()),
        )
        .unwrap();

        let report = discovery.run(4).await.unwrap();

        assert_eq!(report.rounds, 4);
        assert_eq!(report.reason, TerminationReason::IterationCap);
        // 10 initial + 10 per scroll, collected at round 3 and at the end
        assert_eq!(report.items_added, 50);
    }

    #[tokio::test]
    async fn test_rerun_adds_nothing() {
        let storage = shared_storage();
        let cache = Arc::new(DedupCache::new());

        let first = DiscoveryLoop::new(
            FakeListing::new(2),
            fast_config(),
            Arc::clone(&storage),
            Arc::clone(&cache),
        )
        .unwrap()
        .run(3)
        .await
        .unwrap();
        assert_eq!(first.items_added, 30);

        // fresh cache forces a reload from the store
        let second = DiscoveryLoop::new(
            FakeListing::new(2),
            fast_config(),
            Arc::clone(&storage),
            Arc::new(DedupCache::new()),
        )
        .unwrap()
        .run(3)
        .await
        .unwrap();
        assert_eq!(second.items_added, 0);
        assert_eq!(storage.lock().unwrap().count_items().unwrap(), 30);
    }

    #[tokio::test]
    async fn test_failed_flush_is_enqueued_by_later_collect() {
        let storage = shared_storage();
        let cache = Arc::new(DedupCache::new());
        storage
            .lock()
            .unwrap()
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_items BEFORE INSERT ON queue_items
                 BEGIN SELECT RAISE(ABORT, 'store unavailable'); END;",
            )
            .unwrap();

        let first = DiscoveryLoop::new(
            FakeListing::new(0),
            fast_config(),
            Arc::clone(&storage),
            Arc::clone(&cache),
        )
        .unwrap()
        .run(1)
        .await
        .unwrap();
        assert_eq!(first.items_added, 0);
        assert!(cache.is_empty());

        storage
            .lock()
            .unwrap()
            .connection()
            .execute_batch("DROP TRIGGER reject_items;")
            .unwrap();

        let second = DiscoveryLoop::new(
            FakeListing::new(0),
            fast_config(),
            Arc::clone(&storage),
            Arc::clone(&cache),
        )
        .unwrap()
        .run(1)
        .await
        .unwrap();

        assert_eq!(second.items_added, 10);
        assert_eq!(storage.lock().unwrap().count_items().unwrap(), 10);
        assert_eq!(cache.len(), 10);
    }

    #[tokio::test]
    async fn test_round_errors_count_as_stagnant() {
        let mut config = fast_config();
        config.stagnation_threshold = 3;

        let mut listing = FakeListing::new(100);
        listing.fail_counts = true;

        let report = DiscoveryLoop::new(
            listing,
            config,
            shared_storage(),
            Arc::new(DedupCache::new()),
        )
        .unwrap()
        .run(10)
        .await
        .unwrap();

        assert_eq!(report.rounds, 3);
        assert_eq!(report.reason, TerminationReason::Stagnant);
    }

    #[tokio::test]
    async fn test_hung_browser_calls_end_as_stagnant_rounds() {
        let mut config = fast_config();
        config.stagnation_threshold = 3;

        let storage = shared_storage();
        let mut listing = FakeListing::new(100);
        listing.hang_scripts = true;

        let report = DiscoveryLoop::new(
            listing,
            config,
            Arc::clone(&storage),
            Arc::new(DedupCache::new()),
        )
        .unwrap()
        .run(10)
        .await
        .unwrap();

        assert_eq!(report.rounds, 3);
        assert_eq!(report.reason, TerminationReason::Stagnant);
        // links stay readable, so the initial items are still enqueued
        assert_eq!(report.items_added, 10);
        assert_eq!(storage.lock().unwrap().count_items().unwrap(), 10);
    }
}
