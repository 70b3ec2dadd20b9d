//! Integration tests for the harvesting pipeline
//!
//! These tests use wiremock to serve item pages and images, and run the
//! batch stages end-to-end against a SQLite file in a temporary directory.

mod asset_tests;
mod fetch_tests;
mod parse_tests;
mod support;
