//! Template rendering with Tera.
//!
//! [`TemplateRenderer`] applies a [`RenderContext`] to a template string or to
//! any serializable value. Values are rendered structurally: the value is turned
//! into JSON, every string holding template syntax is rendered, and the result is
//! converted back to the original type. Object fields whose key starts with `_`
//! are treated as private and left untouched.

use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use strsim::levenshtein;
use tera::{Context as TeraContext, Tera};

use super::context::RenderContext;
use super::utils::{contains_template_syntax, flatten_keys};
use crate::core::RenderError;

/// Maximum allowed Levenshtein distance as a percentage of target length for suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Maximum number of "did you mean" suggestions attached to an undefined variable.
const MAX_SUGGESTIONS: usize = 3;

/// Renders templates against a [`RenderContext`].
///
/// Rendering is a pure function of the template and the context: the context is
/// only borrowed, and a fresh Tera instance is created per call so no state
/// leaks between renders.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    /// Whether templating is enabled; when disabled values pass through unchanged
    enabled: bool,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TemplateRenderer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Render a single template string.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UndefinedVariable`] when the template references a
    /// binding the context does not define, and [`RenderError::Syntax`] for
    /// malformed templates.
    pub fn render_str(&self, template: &str, context: &RenderContext) -> Result<String, RenderError> {
        if !self.enabled || !contains_template_syntax(template) {
            return Ok(template.to_string());
        }

        let tera_context = Self::tera_context(context)?;
        Self::render_one(&mut Tera::default(), template, &tera_context, context)
    }

    /// Render every template-bearing string inside `value`.
    ///
    /// The value keeps its shape: only string leaves containing template
    /// syntax change. Fields whose key starts with `_` are not rendered.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reqrender::templating::{RenderContext, TemplateRenderer};
    /// use serde::{Deserialize, Serialize};
    /// use serde_json::json;
    ///
    /// #[derive(Serialize, Deserialize)]
    /// struct Request {
    ///     url: String,
    ///     headers: Vec<(String, String)>,
    /// }
    ///
    /// let context = RenderContext::from_bindings(json!({ "host": "localhost", "token": "t0k" }));
    /// let request = Request {
    ///     url: "http://{{ host }}/users".to_string(),
    ///     headers: vec![("Authorization".to_string(), "Bearer {{ token }}".to_string())],
    /// };
    ///
    /// let rendered = TemplateRenderer::default().render(&request, &context).unwrap();
    /// assert_eq!(rendered.url, "http://localhost/users");
    /// assert_eq!(rendered.headers[0].1, "Bearer t0k");
    /// ```
    pub fn render<T>(&self, value: &T, context: &RenderContext) -> Result<T, RenderError>
    where
        T: Serialize + DeserializeOwned,
    {
        let json = serde_json::to_value(value).map_err(|e| RenderError::InvalidValue {
            message: e.to_string(),
        })?;

        let rendered = if self.enabled {
            let tera_context = Self::tera_context(context)?;
            let mut tera = Tera::default();
            Self::render_value(json, &mut tera, &tera_context, context)?
        } else {
            json
        };

        serde_json::from_value(rendered).map_err(|e| RenderError::InvalidValue {
            message: e.to_string(),
        })
    }

    fn tera_context(context: &RenderContext) -> Result<TeraContext, RenderError> {
        TeraContext::from_serialize(&context.bindings).map_err(|e| RenderError::InvalidValue {
            message: format!("bindings cannot be used as a template context: {e}"),
        })
    }

    fn render_value(
        value: Value,
        tera: &mut Tera,
        tera_context: &TeraContext,
        context: &RenderContext,
    ) -> Result<Value, RenderError> {
        match value {
            Value::String(s) if contains_template_syntax(&s) => {
                Self::render_one(tera, &s, tera_context, context).map(Value::String)
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| Self::render_value(item, tera, tera_context, context))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut rendered = Map::with_capacity(map.len());
                for (key, item) in map {
                    let item = if key.starts_with('_') {
                        item
                    } else {
                        Self::render_value(item, tera, tera_context, context)?
                    };
                    rendered.insert(key, item);
                }
                Ok(Value::Object(rendered))
            }
            other => Ok(other),
        }
    }

    fn render_one(
        tera: &mut Tera,
        template: &str,
        tera_context: &TeraContext,
        context: &RenderContext,
    ) -> Result<String, RenderError> {
        tracing::trace!("Rendering template ({} bytes)", template.len());
        tera.render_str(template, tera_context)
            .map_err(|e| Self::parse_tera_error(&e, template, context))
    }

    /// Classify a Tera error as an undefined variable or a syntax problem.
    fn parse_tera_error(error: &tera::Error, template: &str, context: &RenderContext) -> RenderError {
        let messages = Self::error_chain(error);

        if let Some(variable) = messages.iter().find_map(|msg| Self::extract_variable_name(msg)) {
            let available: Vec<String> =
                flatten_keys(&context.bindings).into_iter().map(|key| key.name).collect();
            let suggestions = Self::find_similar_variables(&variable, &available);
            let line = Self::find_variable_line(template, &variable);
            return RenderError::UndefinedVariable {
                variable,
                suggestions,
                line,
            };
        }

        RenderError::Syntax {
            message: Self::format_tera_error(&messages),
            line: Self::extract_line_from_tera_error(error),
        }
    }

    fn error_chain(error: &tera::Error) -> Vec<String> {
        use std::error::Error;

        let mut messages = vec![error.to_string()];
        let mut current: Option<&dyn Error> = error.source();
        while let Some(err) = current {
            messages.push(err.to_string());
            current = err.source();
        }
        messages
    }

    /// Extract variable name from "Variable `foo` not found" message
    fn extract_variable_name(error_msg: &str) -> Option<String> {
        let re = Regex::new(r"Variable `([^`]+)` not found").ok()?;
        re.captures(error_msg).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
    }

    /// Find similar variable names using Levenshtein distance
    fn find_similar_variables(target: &str, available: &[String]) -> Vec<String> {
        let mut scored: Vec<_> =
            available.iter().map(|var| (var.clone(), levenshtein(target, var))).collect();

        scored.sort_by(|(a, da), (b, db)| da.cmp(db).then_with(|| a.cmp(b)));

        scored
            .into_iter()
            .filter(|(_, dist)| *dist <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
            .take(MAX_SUGGESTIONS)
            .map(|(var, _)| var)
            .collect()
    }

    /// First 1-indexed line where the variable appears inside a tag.
    fn find_variable_line(template: &str, variable: &str) -> Option<usize> {
        template
            .lines()
            .position(|line| line.contains(variable) && contains_template_syntax(line))
            .map(|idx| idx + 1)
    }

    /// Tera parse errors carry a `line:column` position.
    fn extract_line_from_tera_error(error: &tera::Error) -> Option<usize> {
        let error_msg = format!("{:?}", error);

        let re = Regex::new(r"(\d+):(\d+)").ok()?;
        re.captures(&error_msg)
            .and_then(|caps| caps.get(1))
            .and_then(|line| line.as_str().parse::<usize>().ok())
    }

    /// Join the error chain, dropping Tera's internal one-off template name.
    fn format_tera_error(messages: &[String]) -> String {
        let cleaned: Vec<String> = messages
            .iter()
            .map(|msg| {
                msg.replace("while rendering '__tera_one_off'", "")
                    .replace("Failed to render '__tera_one_off'", "Template rendering failed")
                    .replace("Failed to parse '__tera_one_off'", "Template syntax error")
                    .replace("'__tera_one_off'", "template")
                    .trim()
                    .to_string()
            })
            .filter(|msg| {
                !msg.is_empty() && msg != "Template rendering failed" && msg != "Template syntax error"
            })
            .collect();

        if cleaned.is_empty() {
            "invalid template".to_string()
        } else {
            cleaned.join("\n  -> ")
        }
    }
}
