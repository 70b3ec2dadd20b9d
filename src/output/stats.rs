//! Statistics generation from the harvest database
//!
//! This module extracts queue and record counts from the storage layer
//! and formats them for the `status` command.

use crate::state::ItemStatus;
use crate::storage::Storage;
use crate::HarvestError;

/// Queue and record counts at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestStatistics {
    /// Items per status, in pipeline order
    pub items_by_status: Vec<(ItemStatus, u64)>,

    /// Total number of queued items
    pub total_items: u64,

    /// Number of extracted records
    pub total_records: u64,
}

impl HarvestStatistics {
    /// Count for one status (zero when absent)
    pub fn count(&self, status: ItemStatus) -> u64 {
        self.items_by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Share of items that made it all the way through, in percent
    pub fn completion_rate(&self) -> f64 {
        percentage(self.count(ItemStatus::AssetsReady), self.total_items)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    let mut items_by_status = Vec::new();
    for status in ItemStatus::all_statuses() {
        items_by_status.push((status, storage.count_by_status(status)?));
    }

    Ok(HarvestStatistics {
        items_by_status,
        total_items: storage.count_items()?,
        total_records: storage.count_records()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Status ===\n");

    println!("Items by Status:");
    for (status, count) in &stats.items_by_status {
        println!(
            "  {:<13} {:>8} ({:.1}%)",
            status.to_string(),
            count,
            percentage(*count, stats.total_items)
        );
    }
    println!("  {:<13} {:>8}", "TOTAL", stats.total_items);
    println!();

    println!("Extracted records: {}", stats.total_records);
    println!(
        "Completion: {:.1}% ({} / {} items with assets ready)",
        stats.completion_rate(),
        stats.count(ItemStatus::AssetsReady),
        stats.total_items
    );
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}
