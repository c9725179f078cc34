//! Dump and get subcommands for the conftree CLI
//!
//! Renders the resolved configuration, or a subtree of it, with secret
//! values redacted.

use crate::config::Config;
use crate::error::ConfigError;
use crate::format::Format;
use crate::tree::TreeNode;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

/// Output format for rendered trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DumpFormat {
    /// YAML (default)
    #[default]
    Yaml,
    /// Pretty-printed JSON
    Json,
}

impl From<DumpFormat> for Format {
    fn from(format: DumpFormat) -> Self {
        match format {
            DumpFormat::Yaml => Format::Yaml,
            DumpFormat::Json => Format::Json,
        }
    }
}

/// Arguments for the dump subcommand
#[derive(Args, Debug, Clone)]
pub struct DumpArgs {
    /// Only this subtree (dotted path)
    pub path: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = DumpFormat::Yaml)]
    pub format: DumpFormat,
}

/// Render the configuration, or the subtree at `args.path`.
pub fn dump(config: &Config, args: &DumpArgs) -> Result<String> {
    let tree = config.tree().context("Failed to resolve configuration")?;
    let node = match args.path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) => tree
            .get(path)?
            .ok_or_else(|| ConfigError::not_found(path))?,
        None => tree.as_ref(),
    };
    Ok(Format::from(args.format).render(node)?)
}

/// The raw value at `path`. Subtrees are rendered as redacted YAML.
pub fn get(config: &Config, path: &str) -> Result<String> {
    let node = config
        .node(path)?
        .ok_or_else(|| ConfigError::not_found(path))?;
    match node {
        TreeNode::Value(value) => Ok(value.value().to_string()),
        subtree => Ok(Format::Yaml.render(&subtree)?),
    }
}
