//! Storage module for persisting harvest data
//!
//! This module handles all durable state of the pipeline:
//! - SQLite database initialization and schema management
//! - The status-tracked work queue with batch claiming
//! - Extracted product records and their asset references
//! - On-disk layout of raw pages and downloaded assets

pub mod layout;
mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::ItemStatus;
use crate::HarvestError;

use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the pipeline stages
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Number of asset slots each extracted record carries
pub const MAX_ASSET_SLOTS: usize = 6;

/// Asset references of a record, indexed by slot (slot 1 is index 0)
pub type AssetSlots = [Option<AssetRef>; MAX_ASSET_SLOTS];

/// Locks the shared storage
///
/// The guard must not be held across an `.await`.
pub fn lock_storage(storage: &SharedStorage) -> Result<MutexGuard<'_, SqliteStorage>, HarvestError> {
    storage
        .lock()
        .map_err(|_| HarvestError::Storage("storage mutex poisoned".to_string()))
}

/// An item in the work queue
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: i64,
    pub url: String,
    pub status: ItemStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Structured fields extracted from one item page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedRecord {
    pub brand: Option<String>,
    pub name: Option<String>,
    pub external_id: String,
    pub price: i64,
    pub assets: AssetSlots,
}

/// An extracted record as persisted, keyed by its queue item
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: i64,
    pub queue_id: i64,
    pub record: ExtractedRecord,
}

/// Reference held in one asset slot of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
    /// Asset URL found on the item page, not yet downloaded
    Remote(String),

    /// Path of the downloaded file
    Local(String),

    /// Download failed; carries the URL that was attempted
    Failed(String),
}

impl AssetRef {
    /// Prefix marking a failed download in the database
    pub const FAILED_PREFIX: &'static str = "DOWNLOAD_FAILED: ";

    /// Converts the reference to its database representation
    pub fn to_db_string(&self) -> String {
        match self {
            Self::Remote(url) => url.clone(),
            Self::Local(path) => path.clone(),
            Self::Failed(url) => format!("{}{}", Self::FAILED_PREFIX, url),
        }
    }

    /// Parses a reference from its database representation
    pub fn from_db_string(s: &str) -> Self {
        if let Some(url) = s.strip_prefix(Self::FAILED_PREFIX) {
            Self::Failed(url.to_string())
        } else if s.starts_with("http://") || s.starts_with("https://") {
            Self::Remote(s.to_string())
        } else {
            Self::Local(s.to_string())
        }
    }

    /// URL to download for this slot, if it still needs downloading
    ///
    /// Local paths are already satisfied and return None.
    pub fn pending_url(&self) -> Option<&str> {
        match self {
            Self::Remote(url) | Self::Failed(url) => Some(url),
            Self::Local(_) => None,
        }
    }
}

/// Pipeline stage a batch is claimed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Parse,
    Assets,
}

impl Stage {
    /// Status an item must have to be claimed by this stage
    pub fn input_status(&self) -> ItemStatus {
        match self {
            Self::Fetch => ItemStatus::New,
            Self::Parse => ItemStatus::Fetched,
            Self::Assets => ItemStatus::Parsed,
        }
    }

    /// Status set atomically while claiming, if the stage has one
    pub fn in_progress_status(&self) -> Option<ItemStatus> {
        match self {
            Self::Fetch => Some(ItemStatus::Fetching),
            Self::Parse | Self::Assets => None,
        }
    }
}
