//! Command-line interface for reqrender.
//!
//! # Available Commands
//!
//! - `render` - render a template (or a JSON document) against a request's context
//! - `context` - print the render context assembled for a request
//!
//! # Global Options
//!
//! - `--verbose` - enable debug logging
//! - `--quiet` - only log errors
//! - `--config` - path to a custom config file
//!
//! # Example
//!
//! ```bash
//! # Render a URL for a request with the staging environment selected
//! reqrender render --store ./workspace --workspace wrk_1 --request req_1 \
//!     --environment env_stage '{{ base_url }}/users'
//!
//! # List the variables available to that request
//! reqrender context --store ./workspace --workspace wrk_1 --request req_1 --keys
//! ```

mod context;
mod render;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;
use crate::store::FileStore;
use crate::templating::{RenderScope, RenderService, StoreContextBuilder};

/// Runtime settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter directive; `None` defers to `RUST_LOG`
    pub log_level: Option<String>,
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the tracing subscriber. Later calls are ignored.
    pub fn init_logging(&self) {
        let filter = match &self.log_level {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

#[derive(Parser)]
#[command(
    name = "reqrender",
    about = "Render API request templates against workspace environments",
    version,
    long_about = "reqrender assembles the variables visible to a request from its workspace, \
                  environments and folders, and renders templates against them."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a custom config file
    #[arg(short, long, global = true, env = "REQRENDER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template against a request's context
    Render(render::RenderCommand),

    /// Show the render context for a request
    Context(context::ContextCommand),
}

/// Which documents to render against.
#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Document store directory (defaults to `store_dir` from the config)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Workspace id
    #[arg(short, long)]
    workspace: String,

    /// Request id; the workspace itself is used when omitted
    #[arg(short, long)]
    request: Option<String>,

    /// Selected sub-environment id
    #[arg(short, long)]
    environment: Option<String>,
}

impl ScopeArgs {
    pub fn scope(&self) -> RenderScope {
        RenderScope {
            workspace_id: self.workspace.clone(),
            request_id: self.request.clone(),
            environment_id: self.environment.clone(),
        }
    }

    /// Build a render service over the chosen store.
    pub fn service(&self, config: &GlobalConfig) -> Result<RenderService<StoreContextBuilder<FileStore>>> {
        let Some(store_dir) = self.store.clone().or_else(|| config.store_dir.clone()) else {
            bail!("No document store given. Pass --store or set store_dir in the config file");
        };
        if !store_dir.is_dir() {
            bail!("Document store directory not found: {}", store_dir.display());
        }

        tracing::debug!("Using document store at {}", store_dir.display());
        Ok(RenderService::from_config(FileStore::new(store_dir), config))
    }
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();
        let global = GlobalConfig::load_with_optional(config.config_path.clone()).await?;

        match self.command {
            Commands::Render(cmd) => cmd.execute(&global).await,
            Commands::Context(cmd) => cmd.execute(&global).await,
        }
    }
}
