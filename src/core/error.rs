//! Error handling for reqrender
//!
//! Errors fall into three families that callers must be able to tell apart:
//! - [`BuildError`] - the render context could not be assembled (missing parent,
//!   cycle, bad environment). Cached under its key like a successful build.
//! - [`RenderError`] - a template referenced an unknown binding or had invalid
//!   syntax. Tied to one template value and never cached.
//! - [`StoreError`] / [`ContextError::Internal`] - unexpected failures such as an
//!   unreadable document store or a crashed build task.
//!
//! [`ServiceError`] joins the context and template sides for render requests.
//!
//! Every error here is `Clone` because a single failed build is handed to every
//! caller sharing its cache key.
//!
//! For the CLI, [`user_friendly_error`] turns any [`anyhow::Error`] into an
//! [`ErrorContext`] with details and a suggestion.
//!
//! # Examples
//!
//! ```rust,no_run
//! use reqrender::core::{BuildError, ContextError, user_friendly_error};
//!
//! let error = ContextError::from(BuildError::DocumentNotFound {
//!     id: "req_1".to_string(),
//! });
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Failure to assemble a render context from the document store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// The request or workspace named by the scope does not exist.
    #[error("Document '{id}' not found")]
    DocumentNotFound {
        /// Id that was looked up
        id: String,
    },

    /// A document points at a parent that does not exist.
    #[error("Parent '{parent_id}' of document '{id}' not found")]
    MissingParent {
        /// Child document
        id: String,
        /// Dangling parent id
        parent_id: String,
    },

    /// Following parent links revisited a document or went too deep.
    #[error("Ancestor chain of '{id}' contains a cycle or exceeds {max_depth} levels")]
    AncestorCycle {
        /// Document where the walk started
        id: String,
        /// Depth limit in effect
        max_depth: usize,
    },

    /// The selected environment id names a document of another kind.
    #[error("Document '{id}' is a {kind}, not an environment")]
    NotAnEnvironment {
        id: String,
        kind: String,
    },

    /// The selected environment is not a sub-environment of the workspace's base environment.
    #[error("Environment '{id}' does not belong to workspace '{workspace_id}'")]
    EnvironmentMismatch {
        id: String,
        workspace_id: String,
    },

    /// An environment variable references an unknown variable or is malformed.
    #[error("Failed to render environment variable '{variable}': {source}")]
    EnvironmentRender {
        /// Top-level variable whose value failed to render
        variable: String,
        #[source]
        source: RenderError,
    },
}

/// Failure of the document store itself.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Failed to read document store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("Invalid document in {path}: {message}")]
    Parse {
        path: PathBuf,
        message: String,
    },
}

/// Any failure that can come out of a context build.
///
/// This is the error type stored in the cache and observed by every sharer of a key.
#[derive(Error, Debug, Clone)]
pub enum ContextError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The build task did not finish normally (panicked or was aborted).
    #[error("Unexpected failure while building render context: {message}")]
    Internal {
        message: String,
    },
}

impl ContextError {
    /// Whether this is a classified context-assembly failure rather than an
    /// unexpected one.
    pub fn is_build_error(&self) -> bool {
        matches!(self, ContextError::Build(_))
    }
}

/// Failure of a render request: either the shared context or the template.
///
/// Callers match on this to show a template diagnostic for
/// [`ServiceError::Render`] and a generic failure for [`ServiceError::Context`].
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ServiceError {
    /// Whether the failure is a property of the template rather than of the context.
    pub fn is_template_error(&self) -> bool {
        matches!(self, ServiceError::Render(_))
    }
}

/// A render failure paired with the template text that produced it, so the
/// report can quote the failing line.
#[derive(Error, Debug, Clone)]
#[error("{source}")]
pub struct TemplateFailure {
    pub template: String,
    #[source]
    pub source: RenderError,
}

/// Template evaluation failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Template variable not found: '{variable}'")]
    UndefinedVariable {
        variable: String,
        /// Closest known binding names
        suggestions: Vec<String>,
        line: Option<usize>,
    },

    #[error("Template syntax error: {message}")]
    Syntax {
        message: String,
        line: Option<usize>,
    },

    /// The value could not be converted to or from its JSON form.
    #[error("Value cannot be rendered: {message}")]
    InvalidValue {
        message: String,
    },
}

impl RenderError {
    /// Generate a multi-line diagnostic for presenting a bad template.
    pub fn format_with_context(&self, template: &str) -> String {
        match self {
            RenderError::UndefinedVariable {
                variable,
                suggestions,
                line,
            } => format_variable_not_found_error(variable, suggestions, *line, template),
            RenderError::Syntax {
                message,
                line,
            } => format_syntax_error(message, *line, template),
            RenderError::InvalidValue {
                message,
            } => format!("ERROR: Value Cannot Be Rendered\n\n{message}\n"),
        }
    }

    /// The failing line with one line of context either side, if the line is known.
    pub fn excerpt(&self, template: &str) -> Option<String> {
        let mut excerpt = String::new();
        push_excerpt(&mut excerpt, template, self.line());
        let excerpt = excerpt.trim_matches('\n');
        (!excerpt.is_empty()).then(|| excerpt.to_string())
    }

    fn line(&self) -> Option<usize> {
        match self {
            RenderError::UndefinedVariable {
                line,
                ..
            }
            | RenderError::Syntax {
                line,
                ..
            } => *line,
            RenderError::InvalidValue {
                ..
            } => None,
        }
    }
}

fn format_variable_not_found_error(
    variable: &str,
    suggestions: &[String],
    line: Option<usize>,
    template: &str,
) -> String {
    let mut msg = String::new();

    msg.push_str("ERROR: Template Variable Not Found\n\n");
    msg.push_str(&format!("Variable: {}\n", variable));
    if let Some(line) = line {
        msg.push_str(&format!("Line: {}\n", line));
    }
    push_excerpt(&mut msg, template, line);

    if !suggestions.is_empty() {
        msg.push_str("Did you mean one of these?\n");
        for suggestion in suggestions {
            msg.push_str(&format!("  - {}\n", suggestion));
        }
        msg.push('\n');
    }

    msg.push_str(
        "SUGGESTION: Define the variable in the base environment, the selected \
         sub-environment, or a folder environment.\n",
    );
    msg
}

fn format_syntax_error(message: &str, line: Option<usize>, template: &str) -> String {
    let mut msg = String::new();

    msg.push_str("ERROR: Template Syntax Error\n\n");
    msg.push_str(&format!("Error: {}\n", message));
    if let Some(line) = line {
        msg.push_str(&format!("Line: {}\n", line));
    }
    push_excerpt(&mut msg, template, line);

    msg.push_str("SUGGESTION: Check template syntax for unclosed tags or invalid expressions.\n");
    msg.push_str("Common issues:\n");
    msg.push_str("  - Unclosed {{ }} or {% %} delimiters\n");
    msg.push_str("  - Invalid filter names\n");
    msg.push_str("  - Missing quotes around string values\n");
    msg
}

/// Append the offending template line (with one line either side) if known.
fn push_excerpt(msg: &mut String, template: &str, line: Option<usize>) {
    let Some(line) = line else {
        return;
    };
    let lines: Vec<&str> = template.lines().collect();
    if line == 0 || line > lines.len() {
        return;
    }

    let start = line.saturating_sub(2);
    let end = (line + 1).min(lines.len());
    msg.push('\n');
    for (idx, text) in lines[start..end].iter().enumerate() {
        let number = start + idx + 1;
        let marker = if number == line {
            ">"
        } else {
            " "
        };
        msg.push_str(&format!("{} {:>4} | {}\n", marker, number, text));
    }
    msg.push('\n');
}

/// User-facing error with optional details and suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// The error message
    pub error: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with suggestions tailored to the
/// error kind.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(failure) = find_cause::<TemplateFailure>(&error) {
        let ctx = render_error_context(&failure.source);
        return match failure.source.excerpt(&failure.template) {
            Some(excerpt) => ctx.with_details(excerpt),
            None => ctx,
        };
    }

    if let Some(service_error) = find_cause::<ServiceError>(&error) {
        return match service_error {
            ServiceError::Render(render_error) => render_error_context(render_error),
            ServiceError::Context(context_error) => context_error_context(context_error),
        };
    }

    if let Some(context_error) = find_cause::<ContextError>(&error) {
        return context_error_context(context_error);
    }

    if let Some(build_error) = find_cause::<BuildError>(&error) {
        return context_error_context(&ContextError::Build(build_error.clone()));
    }

    if let Some(render_error) = find_cause::<RenderError>(&error) {
        return render_error_context(render_error);
    }

    if let Some(toml_error) = find_cause::<toml::de::Error>(&error) {
        return ErrorContext::new(format!("Invalid configuration file: {toml_error}"))
            .with_suggestion("Check the TOML syntax of your reqrender config file")
            .with_details("Configuration is read from --config, $REQRENDER_CONFIG or ~/.reqrender/config.toml");
    }

    ErrorContext::new(chain_message(&error))
}

fn render_error_context(render_error: &RenderError) -> ErrorContext {
    let ctx = ErrorContext::new(render_error.to_string());
    let ctx = match render_error {
        RenderError::UndefinedVariable {
            suggestions,
            ..
        } if !suggestions.is_empty() => {
            ctx.with_suggestion(format!("Did you mean: {}", suggestions.join(", ")))
        }
        RenderError::UndefinedVariable {
            ..
        } => ctx.with_suggestion(
            "Define the variable in an environment, or run `reqrender context --keys` to list available variables",
        ),
        RenderError::Syntax {
            ..
        } => ctx.with_suggestion(
            "Check template syntax: variables use {{ var }}, comments use {# #}, control flow uses {% %}",
        ),
        RenderError::InvalidValue {
            ..
        } => ctx,
    };
    match render_error.line() {
        Some(line) => ctx.with_details(format!("The template failed at line {line}")),
        None => ctx,
    }
}

fn context_error_context(error: &ContextError) -> ErrorContext {
    let ctx = ErrorContext::new(error.to_string());
    match error {
        ContextError::Build(BuildError::DocumentNotFound {
            ..
        }) => ctx.with_suggestion("Check the --request / --workspace id against the document store"),
        ContextError::Build(BuildError::MissingParent {
            ..
        }) => ctx
            .with_details("A request or folder references a parent that is not in the store")
            .with_suggestion("Restore the missing folder or re-parent the document"),
        ContextError::Build(BuildError::AncestorCycle {
            ..
        }) => ctx.with_details("Parent links form a loop, so the ancestor chain never reaches a workspace"),
        ContextError::Build(BuildError::NotAnEnvironment {
            ..
        })
        | ContextError::Build(BuildError::EnvironmentMismatch {
            ..
        }) => ctx.with_suggestion("Pass the id of a sub-environment of this workspace to --environment"),
        ContextError::Build(BuildError::EnvironmentRender {
            ..
        }) => ctx.with_details(
            "Environment variables may reference other variables, but every referenced name must be defined",
        ),
        ContextError::Store(_) => ctx.with_suggestion("Check that the --store directory exists and is readable"),
        ContextError::Internal {
            ..
        } => ctx.with_details("This is a bug; re-run with --verbose for more information"),
    }
}

fn find_cause<'a, E>(error: &'a anyhow::Error) -> Option<&'a E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    error.chain().find_map(|cause| cause.downcast_ref::<E>())
}

fn chain_message(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }
    message
}
