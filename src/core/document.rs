//! Persisted documents that a render context is assembled from
//!
//! A workspace owns a tree of request groups (folders) and requests, plus one
//! base environment whose children are the selectable sub-environments:
//!
//! ```text
//! workspace
//! ├── environment (base)
//! │   ├── environment (staging)
//! │   └── environment (production)
//! └── request_group
//!     └── request
//! ```
//!
//! Documents serialize with lowercase snake_case kinds, matching the JSON files
//! read by [`crate::store::FileStore`]:
//!
//! ```rust
//! use reqrender::core::{Document, DocumentKind};
//!
//! let json = r#"{ "id": "req_1", "parent_id": "wrk_1", "kind": "request", "name": "Get user" }"#;
//! let doc: Document = serde_json::from_str(json).unwrap();
//! assert_eq!(doc.kind, DocumentKind::Request);
//! assert!(doc.environment.is_empty());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of a persisted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Workspace,
    RequestGroup,
    Request,
    WebsocketRequest,
    GrpcRequest,
    Environment,
}

impl DocumentKind {
    /// Kinds that can be the target of a render (anything a user can send).
    pub fn is_request(self) -> bool {
        matches!(
            self,
            DocumentKind::Request | DocumentKind::WebsocketRequest | DocumentKind::GrpcRequest
        )
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Workspace => write!(f, "workspace"),
            DocumentKind::RequestGroup => write!(f, "request_group"),
            DocumentKind::Request => write!(f, "request"),
            DocumentKind::WebsocketRequest => write!(f, "websocket_request"),
            DocumentKind::GrpcRequest => write!(f, "grpc_request"),
            DocumentKind::Environment => write!(f, "environment"),
        }
    }
}

/// A document from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// `None` only for workspaces
    #[serde(default)]
    pub parent_id: Option<String>,
    pub kind: DocumentKind,
    #[serde(default)]
    pub name: String,
    /// Variables contributed by environments and request groups
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub environment: Map<String, Value>,
    /// Ordering among siblings; the lowest-sorted environment child of a
    /// workspace is its base environment
    #[serde(default)]
    pub sort_key: i64,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        parent_id: Option<&str>,
        kind: DocumentKind,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.map(str::to_string),
            kind,
            name: name.into(),
            environment: Map::new(),
            sort_key: 0,
        }
    }

    /// Replace the document's variables. Non-object values are ignored.
    #[must_use]
    pub fn with_environment(mut self, environment: Value) -> Self {
        if let Value::Object(map) = environment {
            self.environment = map;
        }
        self
    }

    #[must_use]
    pub fn with_sort_key(mut self, sort_key: i64) -> Self {
        self.sort_key = sort_key;
        self
    }
}
