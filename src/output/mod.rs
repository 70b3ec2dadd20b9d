//! Output module for reporting pipeline progress
//!
//! This module handles:
//! - Loading per-status counts from the store
//! - Printing them for the operator

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};
