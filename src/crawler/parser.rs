//! HTML parser for extracting product records
//!
//! This module applies a [`SelectorTable`] to a raw item page:
//! - Text fields take the first selector that yields non-empty text
//! - The external identifier is mandatory
//! - Prices are reduced to their digits
//! - Asset slots read an attribute and resolve it against the page URL

use crate::config::SelectorTable;
use crate::storage::{AssetRef, AssetSlots, ExtractedRecord, MAX_ASSET_SLOTS};
use crate::url::resolve_asset_url;
use crate::{ConfigError, HarvestError, Result};
use scraper::{Html, Selector};

/// A selector table with every selector parsed once
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    brand: Vec<Selector>,
    name: Vec<Selector>,
    external_id: Vec<Selector>,
    external_id_label: String,
    price: Vec<Selector>,
    assets: Vec<Selector>,
    asset_attribute: String,
}

impl CompiledSelectors {
    pub fn compile(table: &SelectorTable) -> Result<Self> {
        Ok(Self {
            brand: compile_all(&table.brand)?,
            name: compile_all(&table.name)?,
            external_id: compile_all(&table.external_id)?,
            external_id_label: table.external_id_label.clone(),
            price: compile_all(&table.price)?,
            assets: compile_all(&table.assets)?,
            asset_attribute: table.asset_attribute.clone(),
        })
    }
}

fn compile_all(selectors: &[String]) -> Result<Vec<Selector>> {
    selectors
        .iter()
        .map(|s| {
            Selector::parse(s).map_err(|e| {
                HarvestError::Config(ConfigError::InvalidPattern(format!(
                    "selector '{}': {:?}",
                    s, e
                )))
            })
        })
        .collect()
}

/// Extracts a product record from raw page markup
///
/// # Arguments
///
/// * `html` - The raw page content
/// * `page_url` - URL the page was fetched from (base for relative asset URLs)
/// * `selectors` - Compiled extraction rules
///
/// # Returns
///
/// * `Ok(ExtractedRecord)` - The page carried an external identifier
/// * `Err(HarvestError::Extraction)` - No external identifier was found
///
/// # Example
///
/// ```
/// use catalog_harvest::config::SelectorTable;
/// use catalog_harvest::crawler::{extract_record, CompiledSelectors};
///
/// let table = SelectorTable {
///     brand: vec![".brand".to_string()],
///     name: vec!["h1".to_string()],
///     external_id: vec![".sku".to_string()],
///     external_id_label: "SKU".to_string(),
///     price: vec![".price".to_string()],
///     assets: vec!["img.main".to_string()],
///     asset_attribute: "src".to_string(),
/// };
/// let selectors = CompiledSelectors::compile(&table).unwrap();
/// let html = r#"<div class="brand">Acme</div><h1>Widget</h1>
///     <span class="sku">SKU 77</span><span class="price">$1,200</span>
///     <img class="main" src="/w.png">"#;
///
/// let record = extract_record(html, "https://shop.example/item?id=77", &selectors).unwrap();
/// assert_eq!(record.external_id, "77");
/// assert_eq!(record.price, 1200);
/// ```
pub fn extract_record(
    html: &str,
    page_url: &str,
    selectors: &CompiledSelectors,
) -> Result<ExtractedRecord> {
    let document = Html::parse_document(html);

    let external_id = first_text(&document, &selectors.external_id)
        .map(|raw| strip_label(&raw, &selectors.external_id_label))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| HarvestError::Extraction {
            url: page_url.to_string(),
            message: "external identifier not found".to_string(),
        })?;

    let price = normalize_price(first_text(&document, &selectors.price).as_deref());

    let mut assets = AssetSlots::default();
    for (slot, selector) in selectors.assets.iter().take(MAX_ASSET_SLOTS).enumerate() {
        assets[slot] = document
            .select(selector)
            .next()
            .and_then(|element| element.value().attr(&selectors.asset_attribute))
            .and_then(|reference| resolve_asset_url(page_url, reference))
            .map(AssetRef::Remote);
    }

    Ok(ExtractedRecord {
        brand: first_text(&document, &selectors.brand),
        name: first_text(&document, &selectors.name),
        external_id,
        price,
        assets,
    })
}

/// Returns the trimmed text of the first selector that yields any
fn first_text(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        document
            .select(selector)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
    })
}

fn strip_label(raw: &str, label: &str) -> String {
    if label.is_empty() {
        raw.trim().to_string()
    } else {
        raw.replace(label, "").trim().to_string()
    }
}

/// Reduces a price text to its digits
///
/// Absent text, text without digits and values that do not fit an `i64`
/// all normalize to zero.
///
/// ```
/// use catalog_harvest::crawler::normalize_price;
///
/// assert_eq!(normalize_price(Some("₩12,345")), 12345);
/// assert_eq!(normalize_price(Some("sold out")), 0);
/// assert_eq!(normalize_price(None), 0);
/// ```
pub fn normalize_price(text: Option<&str>) -> i64 {
    let digits: String = text
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}
