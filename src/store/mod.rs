//! Read-only document store contract
//!
//! The context builder only ever reads documents: one lookup by id, and one
//! listing of a parent's children of a given kind. A store returns whole
//! documents or `None`; it never hands out a partially read document.
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`] - `DashMap` backed, used by tests and embedders
//! - [`FileStore`] - one `<id>.json` file per document under a directory

mod fs;
mod memory;

pub use fs::FileStore;
pub use memory::MemoryStore;

use futures::future::BoxFuture;
use std::sync::Arc;

use crate::core::{Document, DocumentKind, StoreError};

/// Lookup interface consumed by [`crate::templating::StoreContextBuilder`].
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetch a document by id. `Ok(None)` means it does not exist.
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Document>, StoreError>>;

    /// List the children of `parent_id` with the given kind, ordered by
    /// `sort_key` then `id`.
    fn children<'a>(
        &'a self,
        parent_id: &'a str,
        kind: DocumentKind,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Document>, StoreError>> {
        (**self).get(id)
    }

    fn children<'a>(
        &'a self,
        parent_id: &'a str,
        kind: DocumentKind,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>> {
        (**self).children(parent_id, kind)
    }
}

/// Sort siblings the way every store must return them.
pub(crate) fn sort_siblings(documents: &mut [Document]) {
    documents.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.id.cmp(&b.id)));
}
