//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::ItemStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{AssetRef, AssetSlots, ExtractedRecord, QueueItem, Stage, StoredRecord};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const ITEM_COLUMNS: &str = "id, url, status, created_at, updated_at";

const RECORD_COLUMNS: &str = "id, queue_id, brand, name, external_id, price,
     asset_1, asset_2, asset_3, asset_4, asset_5, asset_6";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Missing parent directories of `path` are created.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Raw connection, for tests that need to shape the schema
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        id: row.get(0)?,
        url: row.get(1)?,
        status: ItemStatus::from_db_string(&row.get::<_, String>(2)?)
            .unwrap_or(ItemStatus::Failed),
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let mut assets = AssetSlots::default();
    for (slot, asset) in assets.iter_mut().enumerate() {
        let value: Option<String> = row.get(6 + slot)?;
        *asset = value.as_deref().map(AssetRef::from_db_string);
    }

    Ok(StoredRecord {
        id: row.get(0)?,
        queue_id: row.get(1)?,
        record: ExtractedRecord {
            brand: row.get(2)?,
            name: row.get(3)?,
            external_id: row.get(4)?,
            price: row.get(5)?,
            assets,
        },
    })
}

fn asset_columns(assets: &AssetSlots) -> Vec<Option<String>> {
    assets
        .iter()
        .map(|asset| asset.as_ref().map(AssetRef::to_db_string))
        .collect()
}

impl Storage for SqliteStorage {
    // ===== Queue =====

    fn insert_new_items(&mut self, urls: &[String]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO queue_items (url, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
            )?;
            for url in urls {
                inserted += stmt.execute(params![url, ItemStatus::New.to_db_string(), now])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn all_urls(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT url FROM queue_items")?;
        let urls = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    fn get_item(&self, id: i64) -> StorageResult<QueueItem> {
        self.conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM queue_items WHERE id = ?1"),
                params![id],
                item_from_row,
            )
            .optional()?
            .ok_or(StorageError::ItemNotFound(id))
    }

    fn items_by_status(&self, status: ItemStatus) -> StorageResult<Vec<QueueItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM queue_items WHERE status = ?1 ORDER BY id"
        ))?;
        let items = stmt
            .query_map(params![status.to_db_string()], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    // ===== Batch claiming =====

    fn claim_batch(&mut self, stage: Stage, limit: usize) -> StorageResult<Vec<QueueItem>> {
        let token: i64 = rand::random();
        let now = Utc::now().to_rfc3339();
        let input = stage.input_status();
        let claimed_status = stage.in_progress_status().unwrap_or(input);

        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE queue_items SET claim_token = ?1, status = ?2, updated_at = ?3
             WHERE id IN (
                 SELECT id FROM queue_items
                 WHERE status = ?4 AND claim_token IS NULL
                 ORDER BY id LIMIT ?5
             )",
            params![
                token,
                claimed_status.to_db_string(),
                now,
                input.to_db_string(),
                limit as i64
            ],
        )?;

        let items = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM queue_items WHERE claim_token = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map(params![token], item_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        tx.commit()?;

        Ok(items)
    }

    fn commit_batch(&mut self, outcomes: &[(i64, ItemStatus)]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        for &(id, status) in outcomes {
            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM queue_items WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let current = current
                .as_deref()
                .and_then(ItemStatus::from_db_string)
                .ok_or(StorageError::ItemNotFound(id))?;

            if current != status && !current.can_transition_to(status) {
                return Err(StorageError::InvalidTransition {
                    id,
                    from: current,
                    to: status,
                });
            }

            tx.execute(
                "UPDATE queue_items SET status = ?1, claim_token = NULL, updated_at = ?2
                 WHERE id = ?3",
                params![status.to_db_string(), now, id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // ===== Records =====

    fn get_record(&self, queue_id: i64) -> StorageResult<Option<StoredRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM extracted_records WHERE queue_id = ?1"),
                params![queue_id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn upsert_record(&mut self, queue_id: i64, record: &ExtractedRecord) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let assets = asset_columns(&record.assets);

        self.conn.execute(
            "INSERT INTO extracted_records
                 (queue_id, brand, name, external_id, price,
                  asset_1, asset_2, asset_3, asset_4, asset_5, asset_6, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(queue_id) DO UPDATE SET
                 brand = excluded.brand,
                 name = excluded.name,
                 external_id = excluded.external_id,
                 price = excluded.price,
                 asset_1 = excluded.asset_1,
                 asset_2 = excluded.asset_2,
                 asset_3 = excluded.asset_3,
                 asset_4 = excluded.asset_4,
                 asset_5 = excluded.asset_5,
                 asset_6 = excluded.asset_6,
                 updated_at = excluded.updated_at",
            params![
                queue_id,
                record.brand,
                record.name,
                record.external_id,
                record.price,
                assets[0],
                assets[1],
                assets[2],
                assets[3],
                assets[4],
                assets[5],
                now
            ],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM extracted_records WHERE queue_id = ?1",
            params![queue_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn update_asset_refs(&mut self, record_id: i64, assets: &AssetSlots) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let columns = asset_columns(assets);

        let updated = self.conn.execute(
            "UPDATE extracted_records SET
                 asset_1 = ?1, asset_2 = ?2, asset_3 = ?3,
                 asset_4 = ?4, asset_5 = ?5, asset_6 = ?6,
                 updated_at = ?7
             WHERE id = ?8",
            params![
                columns[0], columns[1], columns[2], columns[3], columns[4], columns[5], now,
                record_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RecordNotFound(record_id));
        }
        Ok(())
    }

    // ===== Statistics =====

    fn count_by_status(&self, status: ItemStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM queue_items WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_items(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM queue_items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM extracted_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Operator actions =====

    fn reset_all(&mut self) -> StorageResult<u64> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM extracted_records", [])?;
        let reset = tx.execute(
            "UPDATE queue_items SET status = ?1, claim_token = NULL, updated_at = ?2",
            params![ItemStatus::New.to_db_string(), now],
        )?;
        tx.commit()?;
        Ok(reset as u64)
    }

    fn requeue_interrupted(&mut self) -> StorageResult<u64> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let requeued = tx.execute(
            "UPDATE queue_items SET status = ?1, claim_token = NULL, updated_at = ?2
             WHERE status = ?3",
            params![
                ItemStatus::New.to_db_string(),
                now,
                ItemStatus::Fetching.to_db_string()
            ],
        )?;
        tx.execute(
            "UPDATE queue_items SET claim_token = NULL WHERE claim_token IS NOT NULL",
            [],
        )?;
        tx.commit()?;
        Ok(requeued as u64)
    }
}
