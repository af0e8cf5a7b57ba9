//! Integration tests for flow-kit.
//!
//! These tests run against a wiremock Access node and need no network.
//!
//! Run with: `cargo test --test integration`

mod account_integration;
mod lifecycle_integration;
mod mock_node;
mod transaction_integration;
