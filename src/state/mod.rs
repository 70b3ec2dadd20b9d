//! State module for tracking pipeline progress
//!
//! `ItemStatus` records which pipeline stage each queued item has reached.

mod item_status;

pub use item_status::ItemStatus;
