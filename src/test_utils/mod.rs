//! Test utilities for reqrender
//!
//! Available to the crate's own unit tests and, through the `test-utils`
//! feature, to the integration suite:
//!
//! - [`init_test_logging`] - one-time tracing setup honoring `RUST_LOG`
//! - [`ManualScheduler`] - eviction scheduler driven by explicit [`ManualScheduler::advance`] calls
//! - [`CountingBuilder`] - context builder that counts invocations
//! - [`WorkspaceFixture`] - a small workspace of documents for store-backed tests
//!
//! # Example
//!
//! ```rust,no_run
//! use reqrender::templating::{CacheKey, ContextCache, DEFAULT_EVICTION_DELAY, RenderScope};
//! use reqrender::test_utils::{CountingBuilder, ManualScheduler};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let builder = CountingBuilder::new();
//! let scheduler = Arc::new(ManualScheduler::new());
//! let cache = ContextCache::with_scheduler(builder.clone(), scheduler.clone(), DEFAULT_EVICTION_DELAY);
//!
//! let scope = RenderScope::request("wrk_1", "req_1");
//! cache.get_or_create(&CacheKey::from("req-1"), &scope).await.unwrap();
//! scheduler.advance(DEFAULT_EVICTION_DELAY);
//! assert!(cache.is_empty());
//! # }
//! ```

pub mod fixtures;
pub mod scheduler;

pub use fixtures::{CountingBuilder, WorkspaceFixture};
pub use scheduler::ManualScheduler;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `level` set that level is used;
/// otherwise `RUST_LOG` is honored, and without either nothing is logged.
///
/// ```bash
/// RUST_LOG=reqrender=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
