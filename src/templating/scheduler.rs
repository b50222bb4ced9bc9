//! Timer abstraction used for cache eviction.
//!
//! The cache never sleeps itself; it hands a task and a delay to an
//! [`EvictionScheduler`]. Production code uses [`TokioScheduler`]. Tests can
//! inject a scheduler with a manually driven clock to make eviction
//! deterministic.

use std::time::Duration;

/// Work to run once a delay has elapsed.
pub type EvictionTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs a task after a delay without blocking the caller.
pub trait EvictionScheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: EvictionTask);
}

/// Schedules tasks on the ambient tokio runtime.
///
/// # Panics
///
/// [`EvictionScheduler::schedule`] panics when called outside a tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl EvictionScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: EvictionTask) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}
