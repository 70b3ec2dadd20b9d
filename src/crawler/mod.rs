//! Batch stages of the harvesting pipeline
//!
//! This module contains the work that runs after discovery:
//! - HTTP fetching with proxy rotation, identity rotation and retries
//! - Record extraction from raw pages
//! - Asset downloads into the sharded asset store
//! - The [`Pipeline`] that owns the shared state of all stages

mod assets;
mod coordinator;
mod extraction;
mod fetcher;
mod page_fetch;
mod parser;
mod retry;

pub use coordinator::{BatchSummary, Pipeline, MAX_BATCH_SIZE, MAX_DISCOVERY_ITERATIONS, TOTAL_KEY};
pub use fetcher::{build_http_client, proxy_url, HttpFetcher, IdentityPool, ProxyRotator};
pub use parser::{extract_record, normalize_price, CompiledSelectors};
pub use retry::RetryPolicy;
