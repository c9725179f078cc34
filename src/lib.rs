//! Hierarchical configuration engine.
//!
//! Configuration is assembled from prioritized providers (resource files,
//! environment, system properties, programmatic values), transformed by a
//! pipeline of directive processors, and read back as typed values through
//! [`config::Config`].

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod function;
pub mod logging;
pub mod mapping;
pub mod processor;
pub mod properties;
pub mod provider;
pub mod tree;

pub use config::{Config, ConfigBuilder};
pub use error::{ConfigError, ConfigResult};
pub use tree::TreeNode;
