//! Core types shared across reqrender
//!
//! - [`error`] - the error taxonomy ([`BuildError`], [`RenderError`], [`StoreError`],
//!   [`ContextError`]) and CLI-facing [`ErrorContext`] reporting
//! - [`document`] - persisted documents (workspaces, folders, requests, environments)

pub mod document;
pub mod error;

pub use document::{Document, DocumentKind};
pub use error::{
    BuildError, ContextError, ErrorContext, RenderError, ServiceError, StoreError, TemplateFailure,
    user_friendly_error,
};
