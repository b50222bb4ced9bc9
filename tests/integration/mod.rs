//! Integration test suite for reqrender
//!
//! End-to-end tests driving the public API and the `reqrender` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cache_behavior**: sharing, bypass, eviction and failure properties of the context cache
//! - **render_service**: rendering request values against store-backed contexts
//! - **file_store**: the directory-backed document store
//! - **cli**: the `render` and `context` commands

mod cache_behavior;
mod cli;
mod file_store;
mod render_service;
