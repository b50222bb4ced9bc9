//! Configuration management for reqrender
//!
//! - [`global`] - user-wide settings loaded from TOML ([`GlobalConfig`])

pub mod global;

pub use global::{CONFIG_ENV_VAR, GlobalConfig};
