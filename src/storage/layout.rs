//! On-disk layout of raw pages and downloaded assets
//!
//! Items are grouped into fixed-size shard folders named after the id range
//! they cover, e.g. shard size 300 puts id 301 into `pages00301_00600`.

use crate::config::StorageConfig;
use std::path::{Path, PathBuf};

/// Maximum length of a sanitized brand folder name
const MAX_BRAND_LEN: usize = 50;

/// Returns the inclusive id range of the shard containing `id`
pub fn shard_range(id: u64, shard_size: u64) -> (u64, u64) {
    let size = shard_size.max(1);
    let start = (id.saturating_sub(1) / size) * size + 1;
    (start, start + size - 1)
}

/// Returns the shard folder name for `id`
pub fn shard_folder(prefix: &str, id: u64, shard_size: u64) -> String {
    let (start, end) = shard_range(id, shard_size);
    format!("{}{:05}_{:05}", prefix, start, end)
}

/// Path of the raw page file for a queue item
pub fn raw_page_path(config: &StorageConfig, queue_id: i64, item_key: &str) -> PathBuf {
    Path::new(&config.raw_root)
        .join(shard_folder(
            &config.raw_folder_prefix,
            queue_id.max(0) as u64,
            config.raw_shard_size,
        ))
        .join(format!("{}.html", item_key))
}

/// Directory holding the assets of one record
pub fn asset_dir(config: &StorageConfig, brand: Option<&str>, record_id: i64) -> PathBuf {
    Path::new(&config.asset_root)
        .join(sanitize_brand(brand))
        .join(shard_folder(
            &config.asset_folder_prefix,
            record_id.max(0) as u64,
            config.asset_shard_size,
        ))
}

/// File name of one asset slot (slots are 1-based)
///
/// Characters other than ASCII alphanumerics, `-` and `_` in the external
/// identifier are replaced with `_`.
pub fn asset_file_name(external_id: &str, slot: usize, extension: &str) -> String {
    let stem: String = external_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}.{}", stem, slot, extension)
}

/// Turns a brand into a folder name
///
/// Uppercases, keeps ASCII letters, digits, Hangul syllables and whitespace,
/// collapses whitespace runs into `_` and truncates to 50 characters.
/// Absent or empty brands map to `UNKNOWN`.
pub fn sanitize_brand(brand: Option<&str>) -> String {
    let upper = brand.unwrap_or_default().trim().to_uppercase();

    let kept: String = upper
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || is_hangul(*c) || c.is_whitespace())
        .collect();

    let joined = kept.split_whitespace().collect::<Vec<_>>().join("_");
    let truncated: String = joined.chars().take(MAX_BRAND_LEN).collect();

    if truncated.is_empty() {
        "UNKNOWN".to_string()
    } else {
        truncated
    }
}

fn is_hangul(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}
