//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::ItemStatus;
use crate::storage::{AssetSlots, ExtractedRecord, QueueItem, Stage, StoredRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue item not found: {0}")]
    ItemNotFound(i64),

    #[error("Record not found: {0}")]
    RecordNotFound(i64),

    #[error("Invalid state transition for item {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: i64,
        from: ItemStatus,
        to: ItemStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the pipeline.
/// Callers serialize access (the pipeline keeps the backend behind a mutex).
pub trait Storage {
    // ===== Queue =====

    /// Inserts unseen URLs as NEW items in one transaction
    ///
    /// URLs already present are ignored.
    ///
    /// # Returns
    ///
    /// The number of items actually inserted
    fn insert_new_items(&mut self, urls: &[String]) -> StorageResult<usize>;

    /// Returns every queued URL (used to warm the dedup cache)
    fn all_urls(&self) -> StorageResult<Vec<String>>;

    /// Gets a queue item by ID
    fn get_item(&self, id: i64) -> StorageResult<QueueItem>;

    /// Gets all items in a specific status, ordered by ID
    fn items_by_status(&self, status: ItemStatus) -> StorageResult<Vec<QueueItem>>;

    // ===== Batch claiming =====

    /// Atomically claims up to `limit` unclaimed items waiting for `stage`
    ///
    /// Claimed items are invisible to other claims until committed. For the
    /// fetch stage the items are moved to FETCHING in the same transaction.
    fn claim_batch(&mut self, stage: Stage, limit: usize) -> StorageResult<Vec<QueueItem>>;

    /// Persists the outcome of a claimed batch in one transaction
    ///
    /// Every transition is checked against the status state machine and the
    /// claims are released. Committing an unchanged status only releases.
    fn commit_batch(&mut self, outcomes: &[(i64, ItemStatus)]) -> StorageResult<()>;

    // ===== Records =====

    /// Gets the extracted record of a queue item
    fn get_record(&self, queue_id: i64) -> StorageResult<Option<StoredRecord>>;

    /// Inserts or replaces the record of a queue item
    ///
    /// # Returns
    ///
    /// The record ID
    fn upsert_record(&mut self, queue_id: i64, record: &ExtractedRecord) -> StorageResult<i64>;

    /// Rewrites the asset references of a record
    fn update_asset_refs(&mut self, record_id: i64, assets: &AssetSlots) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts items in a status
    fn count_by_status(&self, status: ItemStatus) -> StorageResult<u64>;

    /// Gets total item count
    fn count_items(&self) -> StorageResult<u64>;

    /// Counts extracted records
    fn count_records(&self) -> StorageResult<u64>;

    // ===== Operator actions =====

    /// Deletes all records and returns every item to NEW
    ///
    /// # Returns
    ///
    /// The number of items reset
    fn reset_all(&mut self) -> StorageResult<u64>;

    /// Returns items stuck in FETCHING to NEW and releases stale claims
    ///
    /// # Returns
    ///
    /// The number of items moved back to NEW
    fn requeue_interrupted(&mut self) -> StorageResult<u64>;
}
