//! Render a template against the context of a request.

use anyhow::{Context, Result};
use clap::Args;
use std::io::Read;

use super::ScopeArgs;
use crate::config::GlobalConfig;
use crate::core::{ServiceError, TemplateFailure};

/// Render a template string, or every string inside a JSON document.
#[derive(Args, Debug)]
pub struct RenderCommand {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Treat the template as a JSON document and render each string in it
    #[arg(short, long)]
    json: bool,

    /// Template text, or `-` to read it from stdin
    template: String,
}

impl RenderCommand {
    pub async fn execute(self, config: &GlobalConfig) -> Result<()> {
        let template = self.read_template()?;
        let service = self.scope.service(config)?;
        let scope = self.scope.scope();
        let key = scope.cache_key();

        let output = if self.json {
            let value: serde_json::Value =
                serde_json::from_str(&template).context("Template is not valid JSON")?;
            let rendered = service.render(&value, &scope, key).await?;
            serde_json::to_string_pretty(&rendered)?
        } else {
            service
                .render_str(&template, &scope, key)
                .await
                .map_err(|e| attach_template(e, &template))?
        };

        println!("{output}");
        Ok(())
    }

    fn read_template(&self) -> Result<String> {
        if self.template != "-" {
            return Ok(self.template.clone());
        }
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read template from stdin")?;
        Ok(buffer)
    }
}

/// Keep the template with a render failure so the report can quote the failing line.
fn attach_template(error: ServiceError, template: &str) -> anyhow::Error {
    match error {
        ServiceError::Render(source) => TemplateFailure {
            template: template.to_string(),
            source,
        }
        .into(),
        error => error.into(),
    }
}
