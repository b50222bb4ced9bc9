//! Context lookup and rendering behind one entry point.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::cache::{CacheKey, ContextCache, DEFAULT_EVICTION_DELAY};
use super::context::{ContextBuilder, RenderContext, RenderKey, RenderScope, StoreContextBuilder};
use super::renderer::TemplateRenderer;
use super::scheduler::TokioScheduler;
use crate::config::GlobalConfig;
use crate::core::ServiceError;
use crate::store::DocumentStore;

/// Renders values against cached, deduplicated render contexts.
///
/// # Examples
///
/// ```rust,no_run
/// use reqrender::store::MemoryStore;
/// use reqrender::templating::{RenderScope, RenderService};
///
/// # async fn example() -> Result<(), reqrender::core::ServiceError> {
/// let service = RenderService::for_store(MemoryStore::new(), true);
/// let scope = RenderScope::request("wrk_1", "req_1");
/// let url = service.render_str("{{ base_url }}/users", &scope, scope.cache_key()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RenderService<B> {
    cache: ContextCache<B>,
    renderer: TemplateRenderer,
}

impl<B: ContextBuilder> RenderService<B> {
    pub fn new(cache: ContextCache<B>, renderer: TemplateRenderer) -> Self {
        Self {
            cache,
            renderer,
        }
    }

    /// The context for `scope`, shared with concurrent callers using the same key.
    pub async fn context(
        &self,
        scope: &RenderScope,
        key: impl Into<CacheKey>,
    ) -> Result<Arc<RenderContext>, ServiceError> {
        let handle = self.cache.get_or_create(&key.into(), scope);
        Ok(handle.await?)
    }

    /// Render every template string inside `value`.
    pub async fn render<T>(
        &self,
        value: &T,
        scope: &RenderScope,
        key: impl Into<CacheKey>,
    ) -> Result<T, ServiceError>
    where
        T: Serialize + DeserializeOwned,
    {
        let context = self.context(scope, key).await?;
        Ok(self.renderer.render(value, &context)?)
    }

    pub async fn render_str(
        &self,
        template: &str,
        scope: &RenderScope,
        key: impl Into<CacheKey>,
    ) -> Result<String, ServiceError> {
        let context = self.context(scope, key).await?;
        Ok(self.renderer.render_str(template, &context)?)
    }

    /// Variables available to templates in `scope`, for autocomplete.
    pub async fn keys(
        &self,
        scope: &RenderScope,
        key: impl Into<CacheKey>,
    ) -> Result<Vec<RenderKey>, ServiceError> {
        Ok(self.context(scope, key).await?.keys())
    }

    /// Forget every cached context.
    pub fn reset(&self) {
        self.cache.reset();
    }

    pub fn cache(&self) -> &ContextCache<B> {
        &self.cache
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }
}

impl<S: DocumentStore> RenderService<StoreContextBuilder<S>> {
    /// Service reading from `store` with the default eviction delay.
    pub fn for_store(store: S, templating_enabled: bool) -> Self {
        let renderer = TemplateRenderer::new(templating_enabled);
        let builder = StoreContextBuilder::new(store, renderer.clone());
        let cache =
            ContextCache::with_scheduler(builder, Arc::new(TokioScheduler), DEFAULT_EVICTION_DELAY);
        Self::new(cache, renderer)
    }

    /// Service reading from `store`, tuned by the user's configuration.
    pub fn from_config(store: S, config: &GlobalConfig) -> Self {
        let renderer = TemplateRenderer::new(config.templating_enabled);
        let builder = StoreContextBuilder::new(store, renderer.clone());
        let cache =
            ContextCache::with_scheduler(builder, Arc::new(TokioScheduler), config.eviction_delay());
        Self::new(cache, renderer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildError, ContextError, RenderError};
    use crate::test_utils::{ManualScheduler, WorkspaceFixture};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct HttpRequest {
        url: String,
        headers: Vec<(String, String)>,
        _id: String,
    }

    #[tokio::test]
    async fn test_render_request_value() {
        let service = RenderService::for_store(WorkspaceFixture::standard().memory_store(), true);
        let scope = WorkspaceFixture::request_scope();

        let request = HttpRequest {
            url: "{{ base_url }}/{{ resource }}".to_string(),
            headers: vec![("Authorization".to_string(), "Bearer {{ auth.token }}".to_string())],
            _id: "{{ untouched }}".to_string(),
        };

        let rendered = service.render(&request, &scope, scope.cache_key()).await.unwrap();
        assert_eq!(rendered.url, "https://staging.example.com/users");
        assert_eq!(rendered.headers[0].1, "Bearer stage");
        assert_eq!(rendered._id, "{{ untouched }}");
    }

    #[tokio::test]
    async fn test_template_error_is_distinguished() {
        let service = RenderService::for_store(WorkspaceFixture::standard().memory_store(), true);
        let scope = WorkspaceFixture::request_scope();

        let err = service.render_str("{{ base_ur }}", &scope, "k").await.unwrap_err();
        assert!(err.is_template_error());
        match err {
            ServiceError::Render(RenderError::UndefinedVariable {
                variable,
                suggestions,
                ..
            }) => {
                assert_eq!(variable, "base_ur");
                assert!(suggestions.contains(&"base_url".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_request_is_context_error() {
        let service = RenderService::for_store(WorkspaceFixture::standard().memory_store(), true);
        let scope = RenderScope::request("wrk_1", "req_missing");

        let err = service.render_str("plain", &scope, CacheKey::Bypass).await.unwrap_err();
        assert!(!err.is_template_error());
        assert!(matches!(
            err,
            ServiceError::Context(ContextError::Build(BuildError::DocumentNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_keys_and_reset() {
        let store = WorkspaceFixture::standard().memory_store();
        let scheduler = Arc::new(ManualScheduler::new());
        let renderer = TemplateRenderer::default();
        let builder = StoreContextBuilder::new(store, renderer.clone());
        let service = RenderService::new(
            ContextCache::with_scheduler(builder, scheduler, DEFAULT_EVICTION_DELAY),
            renderer,
        );
        let scope = WorkspaceFixture::request_scope();

        let keys = service.keys(&scope, "req_1").await.unwrap();
        assert!(keys.iter().any(|k| k.name == "auth.token" && k.value == json!("stage")));
        assert!(keys.iter().all(|k| !k.name.starts_with("_.")));
        assert_eq!(service.cache().len(), 1);

        service.reset();
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_templating_passes_values_through() {
        let config = GlobalConfig {
            templating_enabled: false,
            ..GlobalConfig::default()
        };
        let service =
            RenderService::from_config(WorkspaceFixture::standard().memory_store(), &config);
        let scope = WorkspaceFixture::request_scope();

        let rendered = service.render_str("{{ base_url }}", &scope, "k").await.unwrap();
        assert_eq!(rendered, "{{ base_url }}");
    }
}
