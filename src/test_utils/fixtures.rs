//! Test fixtures: fake context builders and sample workspaces.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::{BuildError, ContextError, Document, DocumentKind, StoreError};
use crate::store::{FileStore, MemoryStore};
use crate::templating::{ContextBuilder, RenderContext, RenderScope};

struct CountingState {
    calls: AtomicUsize,
    completed: AtomicUsize,
    latency: Option<Duration>,
    failure: Option<BuildError>,
}

/// Context builder that records how often it is invoked.
///
/// Each build produces bindings describing the scope plus a `build` number
/// (1 for the first invocation), so tests can tell builds apart. Clones share
/// their counters.
#[derive(Clone)]
pub struct CountingBuilder {
    state: Arc<CountingState>,
}

impl Default for CountingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CountingBuilder {
    pub fn new() -> Self {
        Self::with_options(None, None)
    }

    /// Builder whose builds take `latency` (tokio time) to complete.
    pub fn with_latency(latency: Duration) -> Self {
        Self::with_options(Some(latency), None)
    }

    /// Builder whose builds always fail with `error`.
    pub fn failing(error: BuildError) -> Self {
        Self::with_options(None, Some(error))
    }

    pub fn with_options(latency: Option<Duration>, failure: Option<BuildError>) -> Self {
        Self {
            state: Arc::new(CountingState {
                calls: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                latency,
                failure,
            }),
        }
    }

    /// Number of builds started.
    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Number of builds that ran to completion.
    pub fn completed(&self) -> usize {
        self.state.completed.load(Ordering::SeqCst)
    }
}

impl ContextBuilder for CountingBuilder {
    fn build(&self, scope: RenderScope) -> BoxFuture<'static, Result<RenderContext, ContextError>> {
        let build = self.state.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let state = Arc::clone(&self.state);

        async move {
            if let Some(latency) = state.latency {
                tokio::time::sleep(latency).await;
            }
            state.completed.fetch_add(1, Ordering::SeqCst);

            if let Some(error) = &state.failure {
                return Err(error.clone().into());
            }
            Ok(RenderContext::from_bindings(json!({
                "workspace_id": scope.workspace_id,
                "request_id": scope.request_id,
                "environment_id": scope.environment_id,
                "build": build,
            })))
        }
        .boxed()
    }
}

/// A workspace with a base and a staging environment and one request nested
/// two folders deep.
///
/// ```text
/// wrk_1 (workspace)
/// ├── env_base (base environment)
/// │   └── env_stage (sub-environment)
/// └── fld_outer (folder: resource = "users", page = 1)
///     └── fld_inner (folder: page = 2)
///         └── req_1 (request)
/// ```
#[derive(Debug, Clone)]
pub struct WorkspaceFixture {
    pub documents: Vec<Document>,
}

impl WorkspaceFixture {
    pub fn standard() -> Self {
        Self {
            documents: vec![
                Document::new("wrk_1", None, DocumentKind::Workspace, "Demo"),
                Document::new("env_base", Some("wrk_1"), DocumentKind::Environment, "Base")
                    .with_environment(json!({
                        "base_url": "https://api.example.com",
                        "api": "{{ base_url }}/v1",
                        "auth": { "user": "alice", "token": "base" }
                    })),
                Document::new("env_stage", Some("env_base"), DocumentKind::Environment, "Staging")
                    .with_environment(json!({
                        "base_url": "https://staging.example.com",
                        "auth": { "token": "stage" }
                    })),
                Document::new("fld_outer", Some("wrk_1"), DocumentKind::RequestGroup, "Users")
                    .with_environment(json!({ "resource": "users", "page": 1 })),
                Document::new("fld_inner", Some("fld_outer"), DocumentKind::RequestGroup, "Admin")
                    .with_environment(json!({ "page": 2 })),
                Document::new("req_1", Some("fld_inner"), DocumentKind::Request, "List admins"),
            ],
        }
    }

    /// Add or replace a document.
    #[must_use]
    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.retain(|doc| doc.id != document.id);
        self.documents.push(document);
        self
    }

    /// Scope of `req_1` with the staging environment selected.
    pub fn request_scope() -> RenderScope {
        RenderScope::request("wrk_1", "req_1").with_environment("env_stage")
    }

    pub fn memory_store(&self) -> MemoryStore {
        MemoryStore::from_documents(self.documents.clone())
    }

    /// Write every document into `dir` and return a store reading from it.
    pub async fn file_store(&self, dir: &Path) -> Result<FileStore, StoreError> {
        let store = FileStore::new(dir);
        for document in &self.documents {
            store.write(document).await?;
        }
        Ok(store)
    }

    /// Blocking variant of [`file_store`](Self::file_store) for tests without a runtime.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        for document in &self.documents {
            let json = serde_json::to_string_pretty(document)?;
            std::fs::write(dir.join(format!("{}.json", document.id)), json)?;
        }
        Ok(())
    }
}
