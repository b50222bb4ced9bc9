//! In-memory document store.

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;

use super::{DocumentStore, sort_siblings};
use crate::core::{Document, DocumentKind, StoreError};

/// Document store held entirely in memory.
///
/// Uses `DashMap` so documents can be inserted or removed while builds are
/// reading from the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: DashMap<String, Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a list of documents. Later duplicates replace earlier ones.
    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let store = Self::new();
        for doc in documents {
            store.insert(doc);
        }
        store
    }

    /// Insert or replace a document, returning the previous version.
    pub fn insert(&self, document: Document) -> Option<Document> {
        self.documents.insert(document.id.clone(), document)
    }

    pub fn remove(&self, id: &str) -> Option<Document> {
        self.documents.remove(id).map(|(_, doc)| doc)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Document>, StoreError>> {
        let doc = self.documents.get(id).map(|entry| entry.value().clone());
        futures::future::ready(Ok(doc)).boxed()
    }

    fn children<'a>(
        &'a self,
        parent_id: &'a str,
        kind: DocumentKind,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>> {
        let mut children: Vec<Document> = self
            .documents
            .iter()
            .filter(|entry| entry.kind == kind && entry.parent_id.as_deref() == Some(parent_id))
            .map(|entry| entry.value().clone())
            .collect();
        sort_siblings(&mut children);
        futures::future::ready(Ok(children)).boxed()
    }
}
