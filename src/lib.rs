//! reqrender - render contexts and template rendering for API request documents
//!
//! An API client stores requests inside folders (request groups) of a
//! workspace, next to a tree of environments holding variables. Before a request
//! is sent or shown, its fields are rendered: every `{{ placeholder }}` is
//! replaced with the value visible to that request.
//!
//! Building the variables a request can see (its *render context*) means
//! walking its ancestors and merging several environments, and a single screen
//! may ask for the same context many times at once. reqrender assembles the
//! context once, shares the in-flight build between all callers using the same
//! key, and forgets it after a short delay so edits are picked up.
//!
//! # Core Modules
//!
//! - [`core`] - documents and error types
//! - [`store`] - the [`store::DocumentStore`] contract with in-memory and on-disk stores
//! - [`templating`] - context assembly, the deduplicating context cache and the renderer
//! - [`config`] - user-wide settings (~/.reqrender/config.toml)
//! - [`cli`] - the `reqrender` command line
//!
//! # Example
//!
//! ```rust,no_run
//! use reqrender::core::{Document, DocumentKind};
//! use reqrender::store::MemoryStore;
//! use reqrender::templating::{RenderScope, RenderService};
//! use serde_json::json;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = MemoryStore::from_documents(vec![
//!     Document::new("wrk_1", None, DocumentKind::Workspace, "Demo"),
//!     Document::new("env_base", Some("wrk_1"), DocumentKind::Environment, "Base")
//!         .with_environment(json!({ "base_url": "https://api.example.com" })),
//!     Document::new("req_1", Some("wrk_1"), DocumentKind::Request, "List users"),
//! ]);
//!
//! let service = RenderService::for_store(store, true);
//! let scope = RenderScope::request("wrk_1", "req_1");
//! let url = service.render_str("{{ base_url }}/users", &scope, scope.cache_key()).await?;
//! assert_eq!(url, "https://api.example.com/users");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod store;
pub mod templating;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
