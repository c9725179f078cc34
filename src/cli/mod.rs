//! CLI command definitions for conftree
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod dump;
pub mod encrypt;

use crate::config::{Config, ConfigBuilder};
use crate::error::ConfigResult;
use crate::logging::LogTarget;
use crate::properties::SystemProperties;
use clap::{Parser, Subcommand};
use dump::DumpArgs;
use encrypt::EncryptArgs;
use std::path::PathBuf;

/// Inspect hierarchical configuration assembled from resource roots
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Resource root (repeatable, lowest priority first)
    #[arg(long = "root", value_name = "DIR", global = true)]
    pub roots: Vec<PathBuf>,

    /// System property, e.g. -D conftree.config.server.port=9090
    #[arg(short = 'D', value_name = "KEY=VALUE", global = true)]
    pub properties: Vec<String>,

    /// Comma-separated active profiles
    #[arg(long, value_name = "LIST", value_delimiter = ',', global = true)]
    pub profiles: Option<Vec<String>>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: LogTarget,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved configuration (secrets redacted)
    Dump(DumpArgs),

    /// Print a single value; fails if it is absent
    Get {
        /// Dotted path of the value
        path: String,
    },

    /// Encrypt a value for use with ${decrypt(...)}
    Encrypt(EncryptArgs),

    /// Print diagnostic information as JSON
    Diagnostics,

    /// Print the configuration again whenever a resource changes
    Watch(DumpArgs),
}

impl Cli {
    /// Builder seeded from the global flags.
    pub fn config_builder(&self) -> ConfigBuilder {
        let mut builder = Config::builder()
            .properties(SystemProperties::from_definitions(&self.properties));
        if !self.roots.is_empty() {
            builder = builder.roots(self.roots.clone());
        }
        if let Some(profiles) = &self.profiles {
            builder = builder.profiles(profiles.iter().cloned());
        }
        builder
    }

    pub fn load_config(&self) -> ConfigResult<Config> {
        self.config_builder().build()
    }
}
