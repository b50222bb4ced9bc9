//! Deduplication and eviction behavior of the render context cache.

use reqrender::core::BuildError;
use reqrender::templating::{
    CacheKey, ContextCache, DEFAULT_EVICTION_DELAY, RenderContext, RenderScope, TemplateRenderer,
};
use reqrender::test_utils::{CountingBuilder, ManualScheduler, init_test_logging};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn scope() -> RenderScope {
    RenderScope::request("wrk_1", "req_1")
}

/// Many callers on a multi-threaded runtime asking for one key share one build.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_across_threads() {
    init_test_logging(None);

    let builder = CountingBuilder::with_latency(Duration::from_millis(50));
    let cache = Arc::new(ContextCache::with_scheduler(
        builder.clone(),
        Arc::new(ManualScheduler::new()),
        DEFAULT_EVICTION_DELAY,
    ));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_or_create(&CacheKey::from("req-1"), &scope()).await })
        })
        .collect();

    let mut contexts = Vec::new();
    for task in tasks {
        contexts.push(task.await.unwrap().unwrap());
    }

    assert_eq!(builder.calls(), 1);
    assert!(contexts.iter().all(|c| Arc::ptr_eq(c, &contexts[0])));
    assert_eq!(cache.stats().misses, 1);
    assert_eq!(cache.stats().hits, 31);
}

#[tokio::test]
async fn test_bypass_builds_per_request() {
    let builder = CountingBuilder::new();
    let cache = ContextCache::with_scheduler(
        builder.clone(),
        Arc::new(ManualScheduler::new()),
        DEFAULT_EVICTION_DELAY,
    );

    let mut builds = Vec::new();
    for _ in 0..3 {
        let context = cache.get_or_create(&CacheKey::from(None::<&str>), &scope()).await.unwrap();
        builds.push(context.bindings["build"].clone());
    }

    assert_eq!(builder.calls(), 3);
    assert_eq!(builds, vec![json!(1), json!(2), json!(3)]);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_distinct_keys_build_independently() {
    let builder = CountingBuilder::new();
    let cache = ContextCache::with_scheduler(
        builder.clone(),
        Arc::new(ManualScheduler::new()),
        DEFAULT_EVICTION_DELAY,
    );

    let a = cache.get_or_create(&CacheKey::from("a"), &scope());
    let b = cache.get_or_create(&CacheKey::from("b"), &scope());
    assert!(!a.same_computation(&b));
    assert_eq!(builder.calls(), 2);
    assert_eq!(cache.len(), 2);
}

/// A rejected build is shared with a caller that arrives while it is in flight.
#[tokio::test(start_paused = true)]
async fn test_concurrent_failure_is_shared() {
    let builder = CountingBuilder::with_options(
        Some(Duration::from_millis(200)),
        Some(BuildError::MissingParent {
            id: "req_1".to_string(),
            parent_id: "fld_gone".to_string(),
        }),
    );
    let cache = ContextCache::new(builder.clone());
    let key = CacheKey::from("req-1");

    let first = cache.get_or_create(&key, &scope());
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = cache.get_or_create(&key, &scope());

    let (first, second) = futures::join!(first, second);
    let (first, second) = (first.unwrap_err(), second.unwrap_err());

    assert_eq!(builder.calls(), 1);
    assert_eq!(first.to_string(), second.to_string());
    assert!(first.to_string().contains("fld_gone"));
}

/// Two lookups 10ms apart share a 200ms build; one 5000ms later rebuilds.
#[tokio::test(start_paused = true)]
async fn test_request_rebuilds_after_eviction_delay() {
    let builder = CountingBuilder::with_latency(Duration::from_millis(200));
    let cache = ContextCache::new(builder.clone());
    assert_eq!(cache.eviction_delay(), Duration::from_millis(5000));
    let key = CacheKey::from("req-1");

    let first = cache.get_or_create(&key, &scope());
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = cache.get_or_create(&key, &scope());
    assert!(first.same_computation(&second));

    let (first, second) = futures::join!(first, second);
    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    assert_eq!(builder.calls(), 1);

    // 10ms + 200ms have passed; wait out the rest of the eviction delay.
    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert!(!cache.contains_key("req-1"));

    let third = cache.get_or_create(&key, &scope()).await.unwrap();
    assert_eq!(builder.calls(), 2);
    assert_eq!(third.bindings["build"], json!(2));
}

#[tokio::test(start_paused = true)]
async fn test_entry_survives_until_delay() {
    let builder = CountingBuilder::new();
    let cache = ContextCache::new(builder.clone());
    let key = CacheKey::from("req-1");

    cache.get_or_create(&key, &scope()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(4990)).await;
    cache.get_or_create(&key, &scope()).await.unwrap();

    assert_eq!(builder.calls(), 1);
    assert_eq!(cache.stats().hits, 1);
}

/// Rendering reads the shared context without changing it.
#[tokio::test]
async fn test_render_is_idempotent_on_shared_context() {
    let builder = CountingBuilder::new();
    let cache = ContextCache::with_scheduler(
        builder,
        Arc::new(ManualScheduler::new()),
        DEFAULT_EVICTION_DELAY,
    );
    let renderer = TemplateRenderer::default();

    let context = cache.get_or_create(&CacheKey::from("req-1"), &scope()).await.unwrap();
    let snapshot: RenderContext = (*context).clone();
    let value = json!({ "url": "/ws/{{ workspace_id }}/req/{{ request_id }}", "_raw": "{{ nope }}" });

    let first = renderer.render(&value, &context).unwrap();
    let second = renderer.render(&value, &context).unwrap();

    assert_eq!(first, second);
    assert_eq!(first["url"], json!("/ws/wrk_1/req/req_1"));
    assert_eq!(first["_raw"], json!("{{ nope }}"));
    assert_eq!(*context, snapshot);
}
