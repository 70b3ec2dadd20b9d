//! Parse stage: turns fetched raw pages into extracted records

use crate::crawler::coordinator::{check_batch_size, BatchSummary, Pipeline};
use crate::crawler::parser::extract_record;
use crate::state::ItemStatus;
use crate::storage::{lock_storage, QueueItem, Stage, Storage};
use crate::{HarvestError, Result};
use tracing::{debug, info, warn};

impl Pipeline {
    /// Claims up to `batch_size` FETCHED items and extracts their records
    ///
    /// Items whose raw page is missing, lacks an external identifier or
    /// cannot be stored move to FAILED; the rest move to PARSED.
    pub async fn parse_batch(&self, batch_size: usize) -> Result<BatchSummary> {
        check_batch_size(batch_size)?;

        let items = lock_storage(&self.storage)?.claim_batch(Stage::Parse, batch_size)?;
        if items.is_empty() {
            info!("No {} items to parse", ItemStatus::Fetched);
            return Ok(BatchSummary::default());
        }

        info!("Parsing {} items", items.len());

        let mut outcomes = Vec::with_capacity(items.len());
        for item in &items {
            let status = match self.parse_one(item).await {
                Ok(record_id) => {
                    debug!("Item {} stored as record {}", item.id, record_id);
                    ItemStatus::Parsed
                }
                Err(e) => {
                    warn!("Could not parse {}: {}", item.url, e);
                    ItemStatus::Failed
                }
            };
            outcomes.push((item.id, status));
        }

        lock_storage(&self.storage)?.commit_batch(&outcomes)?;

        let summary = BatchSummary::tally(&outcomes, ItemStatus::Parsed);
        info!("Parse batch complete ({})", summary);
        Ok(summary)
    }

    async fn parse_one(&self, item: &QueueItem) -> Result<i64> {
        let path = self.raw_page_location(item);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| HarvestError::Extraction {
                url: item.url.clone(),
                message: format!("raw page {}: {}", path.display(), e),
            })?;

        let html = String::from_utf8_lossy(&bytes);
        let record = extract_record(&html, &item.url, &self.selectors)?;

        let record_id = lock_storage(&self.storage)?.upsert_record(item.id, &record)?;
        Ok(record_id)
    }
}
