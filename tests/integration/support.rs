//! Shared fixtures for the integration tests

use catalog_harvest::config::parse_config;
use catalog_harvest::storage::{lock_storage, Storage};
use catalog_harvest::Pipeline;
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::MockServer;

/// A pipeline wired to a mock catalog server and a scratch directory
pub struct Harness {
    pub server: MockServer,
    pub dir: TempDir,
    pub pipeline: Pipeline,
}

impl Harness {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path().display().to_string();

        let toml = format!(
            r##"
[discovery]
start-url = '{uri}/list'
item-url-base = '{uri}/goods?goodsNo='

[fetch]
concurrency = 4
max-attempts = 3
request-timeout-ms = 2000
asset-timeout-ms = 2000
jitter-min-ms = 0
jitter-max-ms = 0
backoff-base-ms = 0
backoff-max-ms = 0
retry-jitter-ms = 0

[storage]
database-path = '{root}/harvest.db'
raw-root = '{root}/raw'
asset-root = '{root}/assets'

[extraction]
brand = [".brand"]
name = ["h1"]
external-id = [".sku"]
external-id-label = "SKU"
price = [".sale-price", ".price"]
assets = ["#g1 img", "#g2 img", "#g3 img", "#g4 img", "#g5 img", "#g6 img"]
asset-attribute = "src"
"##,
            uri = server.uri(),
            root = root,
        );

        let config = parse_config(&toml).expect("Failed to parse test config");
        let pipeline = Pipeline::new(config).expect("Failed to create pipeline");

        Self {
            server,
            dir,
            pipeline,
        }
    }

    /// Canonical item URL for an identifier on the mock server
    pub fn item_url(&self, id: &str) -> String {
        format!("{}/goods?goodsNo={}", self.server.uri(), id)
    }

    /// Enqueues items directly, as discovery would
    pub fn enqueue(&self, ids: &[&str]) {
        let urls: Vec<String> = ids.iter().map(|id| self.item_url(id)).collect();
        lock_storage(self.pipeline.storage())
            .unwrap()
            .insert_new_items(&urls)
            .unwrap();
    }

    pub fn raw_page(&self, file_stem: &str) -> PathBuf {
        self.dir
            .path()
            .join("raw")
            .join("pages00001_00300")
            .join(format!("{}.html", file_stem))
    }

    pub fn count(&self, status: &str) -> u64 {
        self.pipeline.status_counts().unwrap()[status]
    }
}

/// Item page markup carrying the given image references
pub fn item_page(sku: &str, images: &[&str]) -> String {
    let gallery: String = images
        .iter()
        .enumerate()
        .map(|(i, src)| format!(r#"<div id="g{}"><img src="{}"></div>"#, i + 1, src))
        .collect();

    format!(
        r#"<html><body>
            <div class="brand">Acme</div>
            <h1>Trail Runner</h1>
            <span class="sku">SKU {}</span>
            <span class="price">₩89,000</span>
            <span class="sale-price">₩79,000</span>
            {}
        </body></html>"#,
        sku, gallery
    )
}
