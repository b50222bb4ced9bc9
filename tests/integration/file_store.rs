//! Directory-backed document store.

use anyhow::Result;
use reqrender::core::{ContextError, DocumentKind, ServiceError, StoreError};
use reqrender::store::{DocumentStore, FileStore};
use reqrender::templating::{CacheKey, RenderService};
use reqrender::test_utils::WorkspaceFixture;
use tempfile::TempDir;

#[tokio::test]
async fn test_fixture_round_trips_through_files() -> Result<()> {
    let temp = TempDir::new()?;
    let fixture = WorkspaceFixture::standard();
    let store = fixture.file_store(temp.path()).await?;

    for document in &fixture.documents {
        assert_eq!(store.get(&document.id).await?.as_ref(), Some(document));
    }
    assert!(store.get("req_missing").await?.is_none());

    let folders = store.children("wrk_1", DocumentKind::RequestGroup).await?;
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].id, "fld_outer");
    Ok(())
}

#[tokio::test]
async fn test_render_from_directory() -> Result<()> {
    let temp = TempDir::new()?;
    WorkspaceFixture::standard().write_to(temp.path())?;

    let service = RenderService::for_store(FileStore::new(temp.path()), true);
    let scope = WorkspaceFixture::request_scope();
    let url = service.render_str("{{ base_url }}/{{ resource }}?page={{ page }}", &scope, CacheKey::Bypass).await?;

    assert_eq!(url, "https://staging.example.com/users?page=2");
    Ok(())
}

#[tokio::test]
async fn test_corrupt_document_is_store_error() -> Result<()> {
    let temp = TempDir::new()?;
    WorkspaceFixture::standard().write_to(temp.path())?;
    std::fs::write(temp.path().join("fld_inner.json"), "{ not json")?;

    let service = RenderService::for_store(FileStore::new(temp.path()), true);
    let err = service
        .context(&WorkspaceFixture::request_scope(), CacheKey::Bypass)
        .await
        .unwrap_err();

    match err {
        ServiceError::Context(ContextError::Store(StoreError::Parse { path, .. })) => {
            assert!(path.ends_with("fld_inner.json"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}
