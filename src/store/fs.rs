//! Directory-backed document store.
//!
//! Each document lives in `<root>/<id>.json`. Files are read on every lookup so
//! edits made by other processes are picked up by the next context build.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use super::{DocumentStore, sort_siblings};
use crate::core::{Document, DocumentKind, StoreError};

/// Document store reading JSON files from a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a document as `<root>/<id>.json`, creating the directory if needed.
    pub async fn write(&self, document: &Document) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await.map_err(|e| io_error(&self.root, e))?;

        let path = self.document_path(&document.id).ok_or_else(|| StoreError::Parse {
            path: self.root.clone(),
            message: format!("'{}' is not a valid document id", document.id),
        })?;
        let json = serde_json::to_string_pretty(document).map_err(|e| StoreError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&path, json).await.map_err(|e| io_error(&path, e))
    }

    /// Ids are used as file names, so anything that could escape the root is rejected.
    fn document_path(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\'])
            && !id.contains('\0');
        valid.then(|| self.root.join(format!("{id}.json")))
    }

    async fn read_document(path: &Path) -> Result<Option<Document>, StoreError> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path, e)),
        };

        serde_json::from_str(&content).map(Some).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    async fn load_children(
        &self,
        parent_id: &str,
        kind: DocumentKind,
    ) -> Result<Vec<Document>, StoreError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.root, e)),
        };

        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&self.root, e))? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(doc) = Self::read_document(&path).await? {
                if doc.kind == kind && doc.parent_id.as_deref() == Some(parent_id) {
                    children.push(doc);
                }
            }
        }

        sort_siblings(&mut children);
        Ok(children)
    }
}

fn io_error(path: &Path, error: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source: Arc::new(error),
    }
}

impl DocumentStore for FileStore {
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Document>, StoreError>> {
        async move {
            let Some(path) = self.document_path(id) else {
                tracing::debug!("Rejected document id {:?}", id);
                return Ok(None);
            };

            let doc = Self::read_document(&path).await?;
            match doc {
                Some(doc) if doc.id != id => Err(StoreError::Parse {
                    path,
                    message: format!("file holds document '{}' instead of '{}'", doc.id, id),
                }),
                doc => Ok(doc),
            }
        }
        .boxed()
    }

    fn children<'a>(
        &'a self,
        parent_id: &'a str,
        kind: DocumentKind,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>> {
        self.load_children(parent_id, kind).boxed()
    }
}
