//! Asset stage: downloads the images referenced by PARSED records
//!
//! Files land under `<asset-root>/<BRAND>/<shard>/<external-id>_<slot>.<ext>`.
//! A failed slot keeps the attempted URL behind the failure sentinel so the
//! record still shows what was tried.

use crate::crawler::coordinator::{check_batch_size, BatchSummary, Pipeline};
use crate::state::ItemStatus;
use crate::storage::layout::{asset_dir, asset_file_name};
use crate::storage::{lock_storage, AssetRef, QueueItem, Stage, Storage};
use crate::url::file_extension;
use crate::{HarvestError, Result};
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, error, info, warn};

impl Pipeline {
    /// Claims up to `batch_size` PARSED items and downloads their assets
    ///
    /// Records are processed in parallel, the slots of one record in order.
    /// An item moves to ASSETS_READY only if every pending slot downloaded.
    pub async fn fetch_assets_batch(&self, batch_size: usize) -> Result<BatchSummary> {
        check_batch_size(batch_size)?;

        let items = lock_storage(&self.storage)?.claim_batch(Stage::Assets, batch_size)?;
        if items.is_empty() {
            info!("No {} items awaiting assets", ItemStatus::Parsed);
            return Ok(BatchSummary::default());
        }

        let concurrency = self.config.fetch.concurrency.max(1);
        info!("Downloading assets for {} items", items.len());

        let outcomes: Vec<(i64, ItemStatus)> = stream::iter(items)
            .map(|item| self.fetch_item_assets(item))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        lock_storage(&self.storage)?.commit_batch(&outcomes)?;

        let summary = BatchSummary::tally(&outcomes, ItemStatus::AssetsReady);
        info!("Asset batch complete ({})", summary);
        Ok(summary)
    }

    async fn fetch_item_assets(&self, item: QueueItem) -> (i64, ItemStatus) {
        match self.download_record_assets(&item).await {
            Ok(true) => (item.id, ItemStatus::AssetsReady),
            Ok(false) => (item.id, ItemStatus::Failed),
            Err(e) => {
                error!("Asset download for {} aborted: {}", item.url, e);
                (item.id, ItemStatus::Failed)
            }
        }
    }

    /// Downloads every pending slot and stores the updated references
    ///
    /// Returns whether all slots succeeded.
    async fn download_record_assets(&self, item: &QueueItem) -> Result<bool> {
        let stored = lock_storage(&self.storage)?
            .get_record(item.id)?
            .ok_or_else(|| {
                HarvestError::Storage(format!("item {} has no extracted record", item.id))
            })?;

        let record = &stored.record;
        let dir = asset_dir(&self.config.storage, record.brand.as_deref(), stored.id);

        let mut assets = record.assets.clone();
        let mut all_ok = true;

        for (slot, asset) in assets.iter_mut().enumerate() {
            let url = match asset.as_ref().and_then(AssetRef::pending_url) {
                Some(url) => url.to_string(),
                None => continue,
            };

            let file_name = asset_file_name(&record.external_id, slot + 1, &file_extension(&url));
            let path = dir.join(file_name);

            match self.download_asset(&url, &path).await {
                Ok(()) => {
                    debug!("Saved {} to {}", url, path.display());
                    *asset = Some(AssetRef::Local(display_path(&path)));
                }
                Err(e) => {
                    warn!("Asset slot {} of {} failed: {}", slot + 1, item.url, e);
                    *asset = Some(AssetRef::Failed(url));
                    all_ok = false;
                }
            }
        }

        lock_storage(&self.storage)?.update_asset_refs(stored.id, &assets)?;
        Ok(all_ok)
    }

    async fn download_asset(&self, url: &str, path: &Path) -> Result<()> {
        let bytes = self.fetcher.get_bytes(url).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

/// Stored path form, with forward slashes on every platform
fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
