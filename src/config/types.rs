use serde::Deserialize;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub extraction: SelectorTable,
}

/// Frontier discovery (scroll loop) configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Listing page the rendering session starts on
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Selector matching one element per rendered item (used for counting)
    #[serde(rename = "item-selector")]
    pub item_selector: String,

    /// Selector matching the item link elements that carry the identifier
    #[serde(rename = "link-selector")]
    pub link_selector: String,

    /// Attribute of the link element holding the identifier
    #[serde(rename = "id-attribute")]
    pub id_attribute: String,

    /// Regular expression whose first capture group is the item identifier
    #[serde(rename = "id-pattern")]
    pub id_pattern: String,

    /// Canonical item URL prefix; the identifier is appended to it
    #[serde(rename = "item-url-base")]
    pub item_url_base: String,

    /// Default round cap when none is given on the command line
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Consecutive rounds without new items before giving up
    #[serde(rename = "stagnation-threshold")]
    pub stagnation_threshold: u32,

    /// Consecutive rounds with an unchanged page extent before giving up
    #[serde(rename = "unchanged-extent-threshold")]
    pub unchanged_extent_threshold: u32,

    /// Run extraction-and-enqueue every N rounds
    #[serde(rename = "flush-interval")]
    pub flush_interval: u32,

    /// Maximum number of new items written per store transaction
    #[serde(rename = "flush-batch-size")]
    pub flush_batch_size: usize,

    /// Delay between item count polls after a scroll (milliseconds)
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of polls per round
    #[serde(rename = "max-polls")]
    pub max_polls: u32,

    /// Minimum wait after each scroll before polling (milliseconds)
    #[serde(rename = "settle-ms")]
    pub settle_ms: u64,

    /// Random wait range after the initial navigation (milliseconds)
    #[serde(rename = "initial-wait-min-ms")]
    pub initial_wait_min_ms: u64,

    #[serde(rename = "initial-wait-max-ms")]
    pub initial_wait_max_ms: u64,

    /// Upper bound on any single browser call (milliseconds)
    #[serde(rename = "render-timeout-ms")]
    pub render_timeout_ms: u64,

    /// Run the browser without a window
    pub headless: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            start_url: "https://www.gugus.co.kr/goodsList/viewCategoryGoodsList?categoryNo=100&searchTerm=%EA%B0%80%EB%B0%A9".to_string(),
            item_selector: "#goods-ul > li".to_string(),
            link_selector: "#goods-ul > li > a.btn-link".to_string(),
            id_attribute: "onclick".to_string(),
            id_pattern: r"fn_prvwCheck\('(\d+)'".to_string(),
            item_url_base: "https://www.gugus.co.kr/goods/viewGoods?goodsNo=".to_string(),
            max_iterations: 5000,
            stagnation_threshold: 300,
            unchanged_extent_threshold: 300,
            flush_interval: 3,
            flush_batch_size: 100,
            poll_interval_ms: 20,
            max_polls: 20,
            settle_ms: 30,
            initial_wait_min_ms: 500,
            initial_wait_max_ms: 800,
            render_timeout_ms: 30_000,
            headless: true,
        }
    }
}

/// HTTP fetch engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Number of concurrent workers per batch
    pub concurrency: usize,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Attempts per item before it is marked failed
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Per-request timeout for asset downloads (milliseconds)
    #[serde(rename = "asset-timeout-ms")]
    pub asset_timeout_ms: u64,

    /// Random pre-request delay bounds (milliseconds)
    #[serde(rename = "jitter-min-ms")]
    pub jitter_min_ms: u64,

    #[serde(rename = "jitter-max-ms")]
    pub jitter_max_ms: u64,

    /// Base unit of the exponential retry delay (milliseconds)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Cap on the exponential part of the retry delay (milliseconds)
    #[serde(rename = "backoff-max-ms")]
    pub backoff_max_ms: u64,

    /// Upper bound of the random component added to each retry delay
    #[serde(rename = "retry-jitter-ms")]
    pub retry_jitter_ms: u64,

    /// Pool of user agent strings, one picked at random per attempt
    #[serde(rename = "user-agents")]
    pub user_agents: Vec<String>,

    /// Proxies used in round-robin order, as URLs or `host:port` (empty = direct)
    pub proxies: Vec<String>,

    /// Accept-Language header sent with page requests
    #[serde(rename = "accept-language")]
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            request_timeout_ms: 15_000,
            asset_timeout_ms: 10_000,
            max_attempts: 3,
            jitter_min_ms: 200,
            jitter_max_ms: 1200,
            backoff_base_ms: 250,
            backoff_max_ms: 5000,
            retry_jitter_ms: 250,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string(),
            ],
            proxies: Vec::new(),
            accept_language: "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Root directory for raw page content
    #[serde(rename = "raw-root")]
    pub raw_root: String,

    /// Root directory for downloaded assets
    #[serde(rename = "asset-root")]
    pub asset_root: String,

    /// Items per raw page folder
    #[serde(rename = "raw-shard-size", default = "default_raw_shard_size")]
    pub raw_shard_size: u64,

    /// Records per asset folder (inside each brand folder)
    #[serde(rename = "asset-shard-size", default = "default_asset_shard_size")]
    pub asset_shard_size: u64,

    /// Folder name prefix for raw page shards
    #[serde(rename = "raw-folder-prefix", default = "default_raw_folder_prefix")]
    pub raw_folder_prefix: String,

    /// Folder name prefix for asset shards
    #[serde(rename = "asset-folder-prefix", default = "default_asset_folder_prefix")]
    pub asset_folder_prefix: String,

    /// Query parameter of the item URL that names the raw page file
    #[serde(rename = "item-id-param", default = "default_item_id_param")]
    pub item_id_param: String,
}

fn default_raw_shard_size() -> u64 {
    300
}

fn default_asset_shard_size() -> u64 {
    1800
}

fn default_raw_folder_prefix() -> String {
    "pages".to_string()
}

fn default_asset_folder_prefix() -> String {
    "images".to_string()
}

fn default_item_id_param() -> String {
    "goodsNo".to_string()
}

/// Declarative extraction rules: field name to ordered fallback selectors
///
/// The first selector that yields non-empty text wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorTable {
    pub brand: Vec<String>,

    pub name: Vec<String>,

    #[serde(rename = "external-id")]
    pub external_id: Vec<String>,

    /// Label text removed from the external identifier before trimming
    #[serde(rename = "external-id-label")]
    pub external_id_label: String,

    pub price: Vec<String>,

    /// One selector per asset slot, in slot order (at most six)
    pub assets: Vec<String>,

    /// Attribute of the asset element holding the asset URL
    #[serde(rename = "asset-attribute")]
    pub asset_attribute: String,
}

const DETAIL_HEAD: &str = "#container > div.content-wrapper > div.prod-detail-header > div > div:nth-child(2) > div > div > div:nth-child(1)";

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            brand: vec![format!("{DETAIL_HEAD} > div.info-head > div")],
            name: vec![format!("{DETAIL_HEAD} > h1")],
            external_id: vec![format!("{DETAIL_HEAD} > div.bar-group > span:nth-child(1)")],
            external_id_label: "상품번호".to_string(),
            price: vec![
                format!("{DETAIL_HEAD} > div.prod-price > span.goods-group.size-4xl > span.val"),
                format!("{DETAIL_HEAD} > div.prod-price > span > span.val"),
            ],
            assets: (1..=6)
                .map(|slot| format!("#gallery > div:nth-child({slot}) > img"))
                .collect(),
            asset_attribute: "src".to_string(),
        }
    }
}
