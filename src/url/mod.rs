//! URL handling for item and asset addresses
//!
//! Item URLs are built from a canonical base plus the identifier found on
//! the listing; asset URLs are resolved against the page they appear on.

mod resolve;

pub use resolve::{file_extension, resolve_asset_url};

use url::Url;

/// Builds the canonical item URL for an identifier
///
/// # Examples
///
/// ```
/// use catalog_harvest::url::item_url;
///
/// let url = item_url("https://shop.example.com/item?goodsNo=", "1234");
/// assert_eq!(url, "https://shop.example.com/item?goodsNo=1234");
/// ```
pub fn item_url(base: &str, id: &str) -> String {
    format!("{}{}", base, id.trim())
}

/// Returns the key naming the raw page file of an item
///
/// The value of query parameter `param` when present and non-empty,
/// otherwise the queue id.
pub fn item_key(url: &str, param: &str, queue_id: i64) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .query_pairs()
                .find(|(key, _)| key == param)
                .map(|(_, value)| value.into_owned())
        })
        .filter(|value| is_safe_file_stem(value))
        .unwrap_or_else(|| queue_id.to_string())
}

fn is_safe_file_stem(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
