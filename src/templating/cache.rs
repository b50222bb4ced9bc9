//! Deduplicating cache of in-flight and completed context builds.
//!
//! Building a render context reads several documents from the store, and many
//! callers (every field of a request pane, for example) want the same context
//! at roughly the same time. [`ContextCache`] makes sure only one build runs per
//! [`CacheKey`]: the first caller starts it, later callers receive a clone of the
//! same [`ContextHandle`]. Each population schedules its own eviction after a
//! fixed delay, after which the next lookup builds a fresh context.
//!
//! # Failure semantics
//!
//! A failed build stays cached until its eviction fires, and every caller
//! sharing the key observes the same [`ContextError`]. There is no
//! error-triggered invalidation or retry.
//!
//! # Eviction
//!
//! Every population gets a new generation number, and its eviction task only
//! removes the entry if that generation is still the one stored under the key.
//! A timer left over from an entry that was already reset and repopulated can
//! therefore never evict the newer entry early.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use super::context::{ContextBuilder, RenderContext, RenderScope};
use super::scheduler::{EvictionScheduler, TokioScheduler};
use crate::core::ContextError;

/// Delay after which a populated key is evicted.
pub const DEFAULT_EVICTION_DELAY: Duration = Duration::from_millis(5000);

/// Result of a context build as shared between callers.
pub type BuildResult = Result<Arc<RenderContext>, ContextError>;

type SharedBuild = Shared<BoxFuture<'static, BuildResult>>;

/// Caller-supplied cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Share builds with every other caller using the same key
    Keyed(String),
    /// Always build a fresh context; the cache table is not consulted
    Bypass,
}

impl CacheKey {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheKey::Keyed(key) => Some(key),
            CacheKey::Bypass => None,
        }
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        if key.is_empty() {
            CacheKey::Bypass
        } else {
            CacheKey::Keyed(key)
        }
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey::from(key.to_string())
    }
}

impl From<Option<String>> for CacheKey {
    fn from(key: Option<String>) -> Self {
        key.map_or(CacheKey::Bypass, CacheKey::from)
    }
}

impl From<Option<&str>> for CacheKey {
    fn from(key: Option<&str>) -> Self {
        key.map_or(CacheKey::Bypass, CacheKey::from)
    }
}

/// Handle to one context build.
///
/// Cloning the handle does not start another build; awaiting any clone yields
/// the same result. The build itself runs as a spawned task, so dropping every
/// handle does not cancel it.
#[derive(Clone)]
pub struct ContextHandle {
    id: u64,
    inner: SharedBuild,
}

impl ContextHandle {
    /// Unique id of the build behind this handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether two handles refer to the same build.
    pub fn same_computation(&self, other: &ContextHandle) -> bool {
        self.id == other.id
    }

    /// The result, if the build has already been awaited to completion.
    pub fn peek(&self) -> Option<&BuildResult> {
        self.inner.peek()
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle")
            .field("id", &self.id)
            .field("completed", &self.inner.peek().is_some())
            .finish()
    }
}

impl Future for ContextHandle {
    type Output = BuildResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

struct CacheEntry {
    generation: u64,
    handle: ContextHandle,
}

/// Hit and miss counters for keyed lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

impl CacheStats {
    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Keyed deduplication cache for render contexts.
///
/// The check-then-insert in [`get_or_create`](Self::get_or_create) happens
/// under the table's entry lock, so concurrent callers on different threads
/// still trigger at most one build per population.
pub struct ContextCache<B> {
    builder: B,
    scheduler: Arc<dyn EvictionScheduler>,
    eviction_delay: Duration,
    entries: Arc<DashMap<String, CacheEntry>>,
    next_id: AtomicU64,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<B> fmt::Debug for ContextCache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCache")
            .field("entries", &self.entries.len())
            .field("eviction_delay", &self.eviction_delay)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<B: ContextBuilder> ContextCache<B> {
    /// Cache evicting on the tokio runtime after [`DEFAULT_EVICTION_DELAY`].
    pub fn new(builder: B) -> Self {
        Self::with_scheduler(builder, Arc::new(TokioScheduler), DEFAULT_EVICTION_DELAY)
    }

    pub fn with_scheduler(
        builder: B,
        scheduler: Arc<dyn EvictionScheduler>,
        eviction_delay: Duration,
    ) -> Self {
        Self {
            builder,
            scheduler,
            eviction_delay,
            entries: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Return the build for `key`, starting one if there is none.
    ///
    /// - [`CacheKey::Bypass`] always starts a new build and leaves the table alone.
    /// - A cached key returns a clone of the stored handle.
    /// - A missing key starts a build, stores it, and schedules its eviction.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime, since builds are spawned.
    pub fn get_or_create(&self, key: &CacheKey, scope: &RenderScope) -> ContextHandle {
        let key = match key {
            CacheKey::Keyed(key) => key,
            CacheKey::Bypass => {
                let handle = self.start_build(scope);
                tracing::debug!("Started uncached context build #{}", handle.id);
                return handle;
            }
        };

        let handle = match self.entries.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let handle = occupied.get().handle.clone();
                tracing::debug!("Render context cache hit for '{}' (build #{})", key, handle.id);
                return handle;
            }
            Entry::Vacant(vacant) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let handle = self.start_build(scope);
                vacant.insert(CacheEntry {
                    generation: handle.id,
                    handle: handle.clone(),
                });
                handle
            }
        };

        tracing::debug!(
            "Render context cache miss for '{}', started build #{} (evicting in {:?})",
            key,
            handle.id,
            self.eviction_delay
        );
        self.schedule_eviction(key.clone(), handle.id);
        handle
    }

    fn start_build(&self, scope: &RenderScope) -> ContextHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(self.builder.build(scope.clone()));

        let inner = async move {
            match task.await {
                Ok(Ok(context)) => Ok(Arc::new(context)),
                Ok(Err(e)) => {
                    tracing::warn!("Render context build #{} failed: {}", id, e);
                    Err(e)
                }
                Err(e) => Err(ContextError::Internal {
                    message: e.to_string(),
                }),
            }
        }
        .boxed()
        .shared();

        ContextHandle {
            id,
            inner,
        }
    }

    fn schedule_eviction(&self, key: String, generation: u64) {
        let entries: Weak<DashMap<String, CacheEntry>> = Arc::downgrade(&self.entries);
        self.scheduler.schedule(
            self.eviction_delay,
            Box::new(move || {
                let Some(entries) = entries.upgrade() else {
                    return;
                };
                if entries.remove_if(&key, |_, entry| entry.generation == generation).is_some() {
                    tracing::debug!("Evicted render context '{}' (build #{})", key, generation);
                } else {
                    tracing::trace!("Eviction of '{}' build #{} skipped, entry replaced", key, generation);
                }
            }),
        );
    }
}

impl<B> ContextCache<B> {
    /// Drop every cached entry. Pending evictions fire later without effect.
    pub fn reset(&self) {
        let count = self.entries.len();
        self.entries.clear();
        tracing::debug!("Reset render context cache ({} entries dropped)", count);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn eviction_delay(&self) -> Duration {
        self.eviction_delay
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
