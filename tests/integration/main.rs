//! Integration tests for the collector
//!
//! These tests use wiremock to stand in for the accounts service and the
//! Web API, and tempfile for the data directory, so every test runs the
//! real client, storage and checkpoint code end-to-end.

mod collect_tests;
mod common;
mod fetch_tests;
