//! Configuration module for Catalog-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Only the `[storage]` section is mandatory; discovery, fetch and extraction
//! settings fall back to defaults tuned for the catalog this crate was built for.
//!
//! # Example
//!
//! ```no_run
//! use catalog_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Fetch concurrency: {}", config.fetch.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, DiscoveryConfig, FetchConfig, SelectorTable, StorageConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, hash_config_text, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
