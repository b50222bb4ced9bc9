//! Show the render context of a request.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::ScopeArgs;
use crate::config::GlobalConfig;

/// Print the ancestors and variables a request renders against.
#[derive(Args, Debug)]
pub struct ContextCommand {
    #[command(flatten)]
    scope: ScopeArgs,

    /// List flattened variable names with their values instead of JSON
    #[arg(short, long)]
    keys: bool,
}

impl ContextCommand {
    pub async fn execute(self, config: &GlobalConfig) -> Result<()> {
        let service = self.scope.service(config)?;
        let scope = self.scope.scope();
        let context = service.context(&scope, scope.cache_key()).await?;

        if self.keys {
            for key in context.keys() {
                println!("{} = {}", key.name.cyan(), key.value);
            }
        } else {
            println!("{}", serde_json::to_string_pretty(&*context)?);
        }
        Ok(())
    }
}
