//! Render contexts, their deduplicating cache, and template rendering.
//!
//! Rendering a request means interpolating `{{ ... }}` placeholders in its
//! fields with variables from the environments that apply to it. This module
//! splits that into three parts:
//!
//! - [`context`]: assembles a [`RenderContext`] (ancestor chain plus merged
//!   variables) for a [`RenderScope`] through a [`ContextBuilder`]
//! - [`cache`]: [`ContextCache`] shares one in-flight build between every
//!   caller using the same [`CacheKey`] and evicts it after a fixed delay
//! - [`renderer`]: [`TemplateRenderer`] renders strings or whole serde values
//!   against a context with Tera
//!
//! [`RenderService`] ties them together for callers.
//!
//! # Template syntax
//!
//! Templates use Tera syntax:
//!
//! - Variable substitution: `{{ base_url }}/users/{{ user.id }}`
//! - Keys that are not identifiers: `{{ _["api-key"] }}`
//! - Conditionals and loops: `{% if token %}Bearer {{ token }}{% endif %}`
//! - Filters: `{{ name | upper }}`
//!
//! Object fields whose name starts with `_` are treated as internal and are
//! never rendered.
//!
//! # Example
//!
//! ```rust,no_run
//! use reqrender::templating::{RenderContext, TemplateRenderer};
//! use serde_json::json;
//!
//! let context = RenderContext::from_bindings(json!({ "host": "localhost", "port": 8080 }));
//! let renderer = TemplateRenderer::default();
//! let url = renderer.render_str("http://{{ host }}:{{ port }}/", &context).unwrap();
//! assert_eq!(url, "http://localhost:8080/");
//! ```

pub mod cache;
pub mod context;
pub mod renderer;
pub mod scheduler;
pub mod service;
pub mod utils;

pub use cache::{BuildResult, CacheKey, CacheStats, ContextCache, ContextHandle, DEFAULT_EVICTION_DELAY};
pub use context::{ContextBuilder, RenderContext, RenderKey, RenderScope, StoreContextBuilder};
pub use renderer::TemplateRenderer;
pub use scheduler::{EvictionScheduler, EvictionTask, TokioScheduler};
pub use service::RenderService;
pub use utils::{contains_template_syntax, deep_merge_json, flatten_keys};
