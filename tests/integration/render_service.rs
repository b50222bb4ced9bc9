//! Rendering request values through the render service.

use anyhow::Result;
use reqrender::core::{BuildError, ContextError, Document, DocumentKind, ServiceError};
use reqrender::store::MemoryStore;
use reqrender::templating::{CacheKey, RenderScope, RenderService};
use reqrender::test_utils::{WorkspaceFixture, init_test_logging};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WebSocketRequest {
    url: String,
    headers: Vec<Header>,
    #[serde(default)]
    authentication: Option<Authentication>,
    /// Internal bookkeeping, never rendered
    _id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Header {
    name: String,
    value: String,
    disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Authentication {
    username: String,
    password: String,
}

fn sample_request() -> WebSocketRequest {
    WebSocketRequest {
        url: "{{ base_url | replace(from=\"https\", to=\"wss\") }}/{{ resource }}/live".to_string(),
        headers: vec![
            Header {
                name: "X-Page".to_string(),
                value: "{{ page }}".to_string(),
                disabled: false,
            },
            Header {
                name: "Authorization".to_string(),
                value: "Bearer {{ auth.token }}".to_string(),
                disabled: true,
            },
        ],
        authentication: Some(Authentication {
            username: "{{ auth.user }}".to_string(),
            password: "{{ _.auth.token }}".to_string(),
        }),
        _id: "req_1 {{ not rendered }}".to_string(),
    }
}

#[tokio::test]
async fn test_render_websocket_request() -> Result<()> {
    init_test_logging(None);

    let service = RenderService::for_store(WorkspaceFixture::standard().memory_store(), true);
    let scope = WorkspaceFixture::request_scope();

    let rendered = service.render(&sample_request(), &scope, scope.cache_key()).await?;

    assert_eq!(rendered.url, "wss://staging.example.com/users/live");
    assert_eq!(rendered.headers[0].value, "2");
    assert_eq!(rendered.headers[1].value, "Bearer stage");
    assert!(rendered.headers[1].disabled);
    let auth = rendered.authentication.as_ref().unwrap();
    assert_eq!(auth.username, "alice");
    assert_eq!(auth.password, "stage");
    assert_eq!(rendered._id, "req_1 {{ not rendered }}");
    Ok(())
}

#[tokio::test]
async fn test_environment_references_resolve_after_merge() -> Result<()> {
    let service = RenderService::for_store(WorkspaceFixture::standard().memory_store(), true);

    // `api` is defined in the base environment as "{{ base_url }}/v1" and must
    // pick up the sub-environment's base_url.
    let staging = WorkspaceFixture::request_scope();
    let url = service.render_str("{{ api }}/users", &staging, CacheKey::Bypass).await?;
    assert_eq!(url, "https://staging.example.com/v1/users");

    let base = RenderScope::request("wrk_1", "req_1");
    let url = service.render_str("{{ api }}/users", &base, CacheKey::Bypass).await?;
    assert_eq!(url, "https://api.example.com/v1/users");
    Ok(())
}

#[tokio::test]
async fn test_workspace_scope_without_request() -> Result<()> {
    let service = RenderService::for_store(WorkspaceFixture::standard().memory_store(), true);
    let scope = RenderScope::workspace("wrk_1").with_environment("env_stage");

    let context = service.context(&scope, scope.cache_key()).await?;
    assert_eq!(context.ancestors.len(), 1);
    assert_eq!(context.bindings["base_url"], json!("https://staging.example.com"));
    assert!(context.bindings.get("resource").is_none());
    Ok(())
}

#[tokio::test]
async fn test_cached_context_ignores_store_edits_until_reset() -> Result<()> {
    let store = Arc::new(WorkspaceFixture::standard().memory_store());
    let service = RenderService::for_store(Arc::clone(&store), true);
    let scope = WorkspaceFixture::request_scope();
    let key = scope.cache_key();

    assert_eq!(service.render_str("{{ resource }}", &scope, key.clone()).await?, "users");

    store.insert(
        Document::new("fld_outer", Some("wrk_1"), DocumentKind::RequestGroup, "Users")
            .with_environment(json!({ "resource": "accounts" })),
    );
    assert_eq!(service.render_str("{{ resource }}", &scope, key.clone()).await?, "users");

    service.reset();
    assert_eq!(service.render_str("{{ resource }}", &scope, key).await?, "accounts");
    Ok(())
}

#[tokio::test]
async fn test_keys_for_autocomplete() -> Result<()> {
    let fixture = WorkspaceFixture::standard().with_document(
        Document::new("fld_inner", Some("fld_outer"), DocumentKind::RequestGroup, "Admin")
            .with_environment(json!({ "page": 2, "X-Trace": "on", "ids": [7, 8] })),
    );
    let service = RenderService::for_store(fixture.memory_store(), true);

    let keys = service.keys(&WorkspaceFixture::request_scope(), "req_1").await?;
    let names: Vec<&str> = keys.iter().map(|k| k.name.as_str()).collect();

    assert!(names.contains(&"base_url"));
    assert!(names.contains(&"auth.user"));
    assert!(names.contains(&"ids[1]"));
    assert!(names.contains(&"_[\"X-Trace\"]"));
    assert!(!names.iter().any(|name| name.starts_with("_.")));
    Ok(())
}

#[tokio::test]
async fn test_context_failures_are_not_template_errors() {
    let store = MemoryStore::from_documents(vec![
        Document::new("wrk_1", None, DocumentKind::Workspace, "Demo"),
        Document::new("req_1", Some("fld_gone"), DocumentKind::Request, "Orphan"),
    ]);
    let service = RenderService::for_store(store, true);

    let err = service
        .render_str("{{ anything }}", &RenderScope::request("wrk_1", "req_1"), "req_1")
        .await
        .unwrap_err();

    assert!(!err.is_template_error());
    assert!(matches!(
        err,
        ServiceError::Context(ContextError::Build(BuildError::MissingParent { .. }))
    ));
}

#[tokio::test]
async fn test_unknown_variable_is_template_error() {
    let service = RenderService::for_store(WorkspaceFixture::standard().memory_store(), true);
    let scope = WorkspaceFixture::request_scope();

    let err = service.render_str("line one\n{{ resourse }}", &scope, "k").await.unwrap_err();

    assert!(err.is_template_error());
    let ServiceError::Render(render) = err else {
        panic!("expected a render error");
    };
    let report = render.format_with_context("line one\n{{ resourse }}");
    assert!(report.contains("resourse"));
    assert!(report.contains("resource"));
}
