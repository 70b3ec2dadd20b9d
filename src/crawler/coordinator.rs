//! Pipeline coordinator - owns the shared state of every stage
//!
//! This module holds the [`Pipeline`], which wires together:
//! - The queue and record store
//! - The dedup cache used by discovery
//! - The HTTP fetcher and retry policy used by the fetch and asset stages
//! - The compiled extraction rules
//!
//! The batch operations themselves live next to their stage
//! (`page_fetch`, `extraction`, `assets`).

use crate::config::Config;
use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::parser::CompiledSelectors;
use crate::crawler::retry::RetryPolicy;
use crate::frontier::{DedupCache, DiscoveryLoop, DiscoveryReport, RenderSession};
use crate::state::ItemStatus;
use crate::storage::{lock_storage, SharedStorage, SqliteStorage, Storage};
use crate::{HarvestError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

/// Largest batch a single call may claim
pub const MAX_BATCH_SIZE: usize = 1000;

/// Largest number of scroll rounds a discovery run may request
pub const MAX_DISCOVERY_ITERATIONS: u32 = 50_000;

/// Key of the overall item count in [`Pipeline::status_counts`]
pub const TOTAL_KEY: &str = "TOTAL";

/// Outcome counts of one batch call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Tallies committed outcomes; `success` is the stage's target status
    pub fn tally(outcomes: &[(i64, ItemStatus)], success: ItemStatus) -> Self {
        let succeeded = outcomes
            .iter()
            .filter(|(_, status)| *status == success)
            .count();
        Self {
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "succeeded: {}, failed: {}", self.succeeded, self.failed)
    }
}

/// Main pipeline structure
pub struct Pipeline {
    pub(crate) config: Arc<Config>,
    pub(crate) storage: SharedStorage,
    pub(crate) cache: Arc<DedupCache>,
    pub(crate) fetcher: Arc<HttpFetcher>,
    pub(crate) retry: RetryPolicy,
    pub(crate) selectors: CompiledSelectors,
}

impl Pipeline {
    /// Creates a pipeline over the database named in the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Storage opened and HTTP clients built
    /// * `Err(HarvestError)` - Failed to initialize
    pub fn new(config: Config) -> Result<Self> {
        let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
        Self::with_storage(config, storage)
    }

    /// Creates a pipeline over an already opened store
    pub fn with_storage(config: Config, storage: SqliteStorage) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        let selectors = CompiledSelectors::compile(&config.extraction)?;
        let retry = RetryPolicy::from_config(&config.fetch);

        Ok(Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            cache: Arc::new(DedupCache::new()),
            fetcher: Arc::new(fetcher),
            retry,
            selectors,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    pub fn cache(&self) -> &Arc<DedupCache> {
        &self.cache
    }

    /// Starts a discovery run on a background task
    ///
    /// Returns immediately; the handle resolves to the run's report. Must be
    /// called from within a Tokio runtime.
    pub fn run_discovery<S>(
        &self,
        session: S,
        max_iterations: u32,
    ) -> Result<JoinHandle<Result<DiscoveryReport>>>
    where
        S: RenderSession + 'static,
    {
        if !(1..=MAX_DISCOVERY_ITERATIONS).contains(&max_iterations) {
            return Err(HarvestError::InvalidArgument(format!(
                "max_iterations must be between 1 and {}, got {}",
                MAX_DISCOVERY_ITERATIONS, max_iterations
            )));
        }

        let discovery = DiscoveryLoop::new(
            session,
            self.config.discovery.clone(),
            Arc::clone(&self.storage),
            Arc::clone(&self.cache),
        )?;

        info!("Starting discovery ({} rounds max)", max_iterations);
        Ok(tokio::spawn(discovery.run(max_iterations)))
    }

    /// Counts items per status name, plus [`TOTAL_KEY`]
    pub fn status_counts(&self) -> Result<BTreeMap<String, u64>> {
        let storage = lock_storage(&self.storage)?;

        let mut counts = BTreeMap::new();
        for status in ItemStatus::all_statuses() {
            counts.insert(status.to_string(), storage.count_by_status(status)?);
        }
        counts.insert(TOTAL_KEY.to_string(), storage.count_items()?);

        Ok(counts)
    }

    /// Deletes all records, returns every item to NEW and clears the cache
    ///
    /// Returns the number of items reset.
    pub fn reset_all(&self) -> Result<u64> {
        let reset = lock_storage(&self.storage)?.reset_all()?;
        self.cache.clear();
        info!("Reset {} items to {}", reset, ItemStatus::New);
        Ok(reset)
    }

    /// Returns items interrupted mid-fetch to NEW and releases stale claims
    pub fn requeue_interrupted(&self) -> Result<u64> {
        let requeued = lock_storage(&self.storage)?.requeue_interrupted()?;
        info!("Requeued {} interrupted items", requeued);
        Ok(requeued)
    }
}

/// Rejects batch sizes outside `1..=MAX_BATCH_SIZE`
pub(crate) fn check_batch_size(size: usize) -> Result<()> {
    if (1..=MAX_BATCH_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(HarvestError::InvalidArgument(format!(
            "batch size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, size
        )))
    }
}
