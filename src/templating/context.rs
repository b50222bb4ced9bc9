//! Render context assembly.
//!
//! A [`RenderContext`] is what a template is rendered against: the chain of
//! documents from the rendered entity up to its workspace, and the variables
//! visible at that point. [`StoreContextBuilder`] produces it from a
//! [`DocumentStore`].
//!
//! # Variable precedence
//!
//! Layers are merged lowest precedence first:
//!
//! 1. the workspace's base environment
//! 2. the selected sub-environment
//! 3. folder (request group) environments, outermost to innermost
//!
//! String values may reference other variables (`"api": "{{ base_url }}/v2"`).
//! After merging, the environment is rendered against itself a few times so such
//! references resolve against the final, merged values; `_` is available during
//! these passes too, so `{{ _["my-var"] }}` works for names that are not
//! identifiers. A value that still holds template syntax after the last pass
//! fails the build. The merged variables are available both at the top level
//! and under `_`.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::cache::CacheKey;
use super::renderer::TemplateRenderer;
use super::utils::{contains_template_syntax, deep_merge_json, flatten_keys};
use crate::core::{BuildError, ContextError, Document, DocumentKind, RenderError};
use crate::store::DocumentStore;

/// Maximum number of parent links followed before the chain is treated as cyclic.
const MAX_ANCESTOR_DEPTH: usize = 50;

/// Number of self-rendering passes used to resolve variables that reference
/// other variables.
const MAX_ENVIRONMENT_PASSES: usize = 3;

/// Identity of what is being rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderScope {
    pub workspace_id: String,
    /// Active request; when `None` the workspace itself is the render target
    pub request_id: Option<String>,
    /// Selected sub-environment
    pub environment_id: Option<String>,
}

impl RenderScope {
    pub fn workspace(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            request_id: None,
            environment_id: None,
        }
    }

    pub fn request(workspace_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..Self::workspace(workspace_id)
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment_id: impl Into<String>) -> Self {
        self.environment_id = Some(environment_id.into());
        self
    }

    /// A cache key identifying this exact scope.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::Keyed(format!(
            "{}:{}:{}",
            self.workspace_id,
            self.request_id.as_deref().unwrap_or_default(),
            self.environment_id.as_deref().unwrap_or_default()
        ))
    }
}

/// One renderable variable and its value, as offered to autocomplete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderKey {
    /// Template expression reaching the value, e.g. `auth.token`
    pub name: String,
    pub value: Value,
}

/// Ancestors plus variable bindings for one scope.
///
/// Produced once per build and then shared read-only behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderContext {
    /// The rendered entity first, its workspace last
    pub ancestors: Vec<Document>,
    pub bindings: Map<String, Value>,
}

impl RenderContext {
    pub fn new(ancestors: Vec<Document>, bindings: Map<String, Value>) -> Self {
        Self {
            ancestors,
            bindings,
        }
    }

    /// Context with bindings only. Non-object values produce empty bindings.
    pub fn from_bindings(bindings: Value) -> Self {
        let bindings = match bindings {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(Vec::new(), bindings)
    }

    /// All variables reachable from templates, flattened to leaf values.
    pub fn keys(&self) -> Vec<RenderKey> {
        flatten_keys(&self.bindings)
    }

    /// The workspace at the root of the ancestor chain, if it was reached.
    pub fn workspace(&self) -> Option<&Document> {
        self.ancestors.last().filter(|doc| doc.kind == DocumentKind::Workspace)
    }
}

/// Asynchronous producer of render contexts.
///
/// Implementations must tolerate concurrent calls for different scopes. The
/// returned future is `'static` so the cache can spawn it and keep it running
/// independently of any caller.
pub trait ContextBuilder: Send + Sync + 'static {
    fn build(&self, scope: RenderScope) -> BoxFuture<'static, Result<RenderContext, ContextError>>;
}

impl<B: ContextBuilder + ?Sized> ContextBuilder for Arc<B> {
    fn build(&self, scope: RenderScope) -> BoxFuture<'static, Result<RenderContext, ContextError>> {
        (**self).build(scope)
    }
}

/// Builds render contexts by reading documents from a [`DocumentStore`].
pub struct StoreContextBuilder<S> {
    store: Arc<S>,
    renderer: TemplateRenderer,
}

impl<S> Clone for StoreContextBuilder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            renderer: self.renderer.clone(),
        }
    }
}

impl<S> fmt::Debug for StoreContextBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContextBuilder").field("renderer", &self.renderer).finish_non_exhaustive()
    }
}

impl<S: DocumentStore> StoreContextBuilder<S> {
    pub fn new(store: S, renderer: TemplateRenderer) -> Self {
        Self::from_shared(Arc::new(store), renderer)
    }

    pub fn from_shared(store: Arc<S>, renderer: TemplateRenderer) -> Self {
        Self {
            store,
            renderer,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Assemble the context for `scope`.
    pub async fn assemble(&self, scope: &RenderScope) -> Result<RenderContext, ContextError> {
        let start_id = scope.request_id.as_deref().unwrap_or(&scope.workspace_id);
        let start = self.store.get(start_id).await?.ok_or_else(|| BuildError::DocumentNotFound {
            id: start_id.to_string(),
        })?;

        let ancestors = self.collect_ancestors(start).await?;
        let workspace_id = match ancestors.last() {
            Some(doc) if doc.kind == DocumentKind::Workspace => doc.id.clone(),
            _ => scope.workspace_id.clone(),
        };

        let layers = self.environment_layers(&workspace_id, scope, &ancestors).await?;
        let merged = layers.iter().fold(Value::Object(Map::new()), |merged, layer| {
            deep_merge_json(merged, &Value::Object(layer.environment.clone()))
        });
        let mut bindings = match merged {
            Value::Object(map) => self.resolve_references(map)?,
            _ => Map::new(),
        };
        bindings.insert("_".to_string(), Value::Object(bindings.clone()));

        tracing::debug!(
            "Assembled render context for {} ({} ancestors, {} layers, {} variables)",
            start_id,
            ancestors.len(),
            layers.len(),
            bindings.len() - 1
        );

        Ok(RenderContext::new(ancestors, bindings))
    }

    /// Walk parent links from `start` up to the first workspace.
    async fn collect_ancestors(&self, start: Document) -> Result<Vec<Document>, ContextError> {
        let start_id = start.id.clone();
        let mut seen = HashSet::from([start.id.clone()]);
        let mut current_id = start.id.clone();
        let mut next_parent = match start.kind {
            DocumentKind::Workspace => None,
            _ => start.parent_id.clone(),
        };
        let mut chain = vec![start];

        while let Some(parent_id) = next_parent.take() {
            if !seen.insert(parent_id.clone()) || chain.len() > MAX_ANCESTOR_DEPTH {
                return Err(BuildError::AncestorCycle {
                    id: start_id,
                    max_depth: MAX_ANCESTOR_DEPTH,
                }
                .into());
            }

            let parent = self.store.get(&parent_id).await?.ok_or_else(|| BuildError::MissingParent {
                id: current_id.clone(),
                parent_id: parent_id.clone(),
            })?;

            if parent.kind != DocumentKind::Workspace {
                next_parent = parent.parent_id.clone();
            }
            current_id = parent_id;
            chain.push(parent);
        }

        Ok(chain)
    }

    /// Environment documents contributing variables, lowest precedence first.
    async fn environment_layers(
        &self,
        workspace_id: &str,
        scope: &RenderScope,
        ancestors: &[Document],
    ) -> Result<Vec<Document>, ContextError> {
        let mut layers = Vec::new();

        let base = self
            .store
            .children(workspace_id, DocumentKind::Environment)
            .await?
            .into_iter()
            .next();

        if let Some(environment_id) = &scope.environment_id {
            let selected = self.store.get(environment_id).await?.ok_or_else(|| {
                BuildError::DocumentNotFound {
                    id: environment_id.clone(),
                }
            })?;

            if selected.kind != DocumentKind::Environment {
                return Err(BuildError::NotAnEnvironment {
                    id: selected.id,
                    kind: selected.kind.to_string(),
                }
                .into());
            }

            match &base {
                Some(base) if base.id == selected.id => layers.push(selected),
                Some(base) if selected.parent_id.as_deref() == Some(base.id.as_str()) => {
                    layers.push(base.clone());
                    layers.push(selected);
                }
                _ => {
                    return Err(BuildError::EnvironmentMismatch {
                        id: selected.id,
                        workspace_id: workspace_id.to_string(),
                    }
                    .into());
                }
            }
        } else if let Some(base) = base {
            layers.push(base);
        }

        layers.extend(
            ancestors.iter().rev().filter(|doc| doc.kind == DocumentKind::RequestGroup).cloned(),
        );
        Ok(layers)
    }

    /// Render the merged environment against itself until it stops changing.
    ///
    /// Values may reach each other directly (`{{ base_url }}`) or through `_`
    /// (`{{ _["my-var"] }}`). Anything still holding template syntax after the
    /// last pass is a reference cycle or too deep a chain, and fails the build.
    fn resolve_references(
        &self,
        mut bindings: Map<String, Value>,
    ) -> Result<Map<String, Value>, ContextError> {
        for _ in 0..MAX_ENVIRONMENT_PASSES {
            if !bindings.values().any(has_template_strings) {
                break;
            }

            let mut snapshot = bindings.clone();
            snapshot.insert("_".to_string(), Value::Object(bindings.clone()));
            let snapshot = RenderContext::new(Vec::new(), snapshot);

            let mut next = Map::with_capacity(bindings.len());
            for (variable, value) in &bindings {
                let rendered = self.renderer.render(value, &snapshot).map_err(|source| {
                    BuildError::EnvironmentRender {
                        variable: variable.clone(),
                        source,
                    }
                })?;
                next.insert(variable.clone(), rendered);
            }

            if next == bindings {
                break;
            }
            bindings = next;
        }

        if self.renderer.is_enabled() {
            if let Some((variable, _)) = bindings.iter().find(|(_, value)| has_template_strings(value)) {
                return Err(BuildError::EnvironmentRender {
                    variable: variable.clone(),
                    source: RenderError::InvalidValue {
                        message: format!(
                            "still contains template syntax after {MAX_ENVIRONMENT_PASSES} passes; \
                             check for variables that reference each other"
                        ),
                    },
                }
                .into());
            }
        }
        Ok(bindings)
    }
}

fn has_template_strings(value: &Value) -> bool {
    match value {
        Value::String(s) => contains_template_syntax(s),
        Value::Array(items) => items.iter().any(has_template_strings),
        // Private fields are never rendered, so they cannot be left unresolved.
        Value::Object(map) => {
            map.iter().any(|(key, value)| !key.starts_with('_') && has_template_strings(value))
        }
        _ => false,
    }
}

impl<S: DocumentStore> ContextBuilder for StoreContextBuilder<S> {
    fn build(&self, scope: RenderScope) -> BoxFuture<'static, Result<RenderContext, ContextError>> {
        let builder = self.clone();
        async move { builder.assemble(&scope).await }.boxed()
    }
}
