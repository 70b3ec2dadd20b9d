//! Fetch stage: downloads NEW item pages to the raw page store

use crate::crawler::coordinator::{check_batch_size, BatchSummary, Pipeline};
use crate::crawler::fetcher::HttpFetcher;
use crate::state::ItemStatus;
use crate::storage::layout::raw_page_path;
use crate::storage::{lock_storage, QueueItem, Stage, Storage};
use crate::url::item_key;
use crate::Result;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tracing::{debug, error, info};

impl Pipeline {
    /// Claims up to `batch_size` NEW items and fetches them in parallel
    ///
    /// Each page is retried with backoff; successful pages are written to
    /// the raw page store and move to FETCHED, the rest to FAILED. All
    /// outcomes are committed in one transaction.
    pub async fn fetch_batch(&self, batch_size: usize) -> Result<BatchSummary> {
        check_batch_size(batch_size)?;

        let items = lock_storage(&self.storage)?.claim_batch(Stage::Fetch, batch_size)?;
        if items.is_empty() {
            info!("No {} items to fetch", ItemStatus::New);
            return Ok(BatchSummary::default());
        }

        let concurrency = self.config.fetch.concurrency.max(1);
        info!("Fetching {} items ({} in flight)", items.len(), concurrency);

        let outcomes: Vec<(i64, ItemStatus)> = stream::iter(items)
            .map(|item| self.fetch_one(item))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        lock_storage(&self.storage)?.commit_batch(&outcomes)?;

        let summary = BatchSummary::tally(&outcomes, ItemStatus::Fetched);
        info!("Fetch batch complete ({})", summary);
        Ok(summary)
    }

    async fn fetch_one(&self, item: QueueItem) -> (i64, ItemStatus) {
        let fetcher: &HttpFetcher = &self.fetcher;
        let url = item.url.as_str();

        let body = match self.retry.run(url, move || fetcher.get_page(url)).await {
            Ok(body) => body,
            Err((attempts, e)) => {
                error!("Giving up on {} after {} attempts: {}", url, attempts, e);
                return (item.id, ItemStatus::Failed);
            }
        };

        match self.store_raw_page(&item, &body).await {
            Ok(path) => {
                debug!("Saved {} to {}", url, path.display());
                (item.id, ItemStatus::Fetched)
            }
            Err(e) => {
                error!("Failed to save page {}: {}", url, e);
                (item.id, ItemStatus::Failed)
            }
        }
    }

    async fn store_raw_page(&self, item: &QueueItem, body: &str) -> Result<PathBuf> {
        let path = self.raw_page_location(item);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }

    /// Where the raw page of `item` lives
    pub(crate) fn raw_page_location(&self, item: &QueueItem) -> PathBuf {
        let storage = &self.config.storage;
        let key = item_key(&item.url, &storage.item_id_param, item.id);
        raw_page_path(storage, item.id, &key)
    }
}
