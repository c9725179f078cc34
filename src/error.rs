//! Error types for configuration loading, processing and retrieval.

use std::io;
use thiserror::Error;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source could not be read.
    #[error("Failed to read configuration source {source_id}: {message}")]
    Source {
        /// Identity of the source (resource path, provider name).
        source_id: String,
        /// Error description.
        message: String,
    },

    /// Serialized content could not be parsed.
    #[error("Failed to parse {format} content from {origin}: {message}")]
    Parse {
        /// Format name (`yaml`, `json`).
        format: &'static str,
        /// Where the content came from.
        origin: String,
        /// Underlying parser message.
        message: String,
    },

    /// A path expression is malformed.
    #[error("Invalid configuration path '{path}': {message}")]
    Path {
        /// The offending path expression.
        path: String,
        /// What is wrong with it.
        message: String,
    },

    /// A path traverses a node of the wrong kind.
    #[error("Type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Path of the offending node.
        path: String,
        /// Node kind required by the operation.
        expected: &'static str,
        /// Node kind actually present.
        found: &'static str,
    },

    /// A mandatory path is absent.
    #[error("Configuration value '{path}' is required but was not found")]
    NotFound {
        /// The missing path.
        path: String,
    },

    /// A node could not be converted to the requested type.
    #[error("Cannot map '{path}' to {target}: {message}")]
    Mapping {
        /// Path of the failing node.
        path: String,
        /// Target type name.
        target: String,
        /// Mapping failure description.
        message: String,
    },

    /// A `${...}` expression could not be evaluated.
    #[error("Failed to evaluate '{expression}': {message}")]
    Evaluation {
        /// The expression text.
        expression: String,
        /// Evaluation failure description.
        message: String,
    },

    /// A function depends on something that is not available.
    #[error("Missing {dependency}: set {}", .env_vars.join(" or "))]
    MissingDependency {
        /// The missing dependency.
        dependency: String,
        /// Environment variables that can supply it.
        env_vars: Vec<&'static str>,
    },

    /// A provider name is already registered.
    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),

    /// A provider name is not registered.
    #[error("Provider '{0}' is not registered")]
    UnknownProvider(String),

    /// Filesystem access failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    pub fn source_failure(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn evaluation(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Evaluation {
            expression: expression.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error reports an absent mandatory value.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. })
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_names_env_vars() {
        let err = ConfigError::MissingDependency {
            dependency: "master key".to_string(),
            env_vars: vec!["CONFTREE_MASTER_KEY", "CONFTREE_MASTER_KEY_PATH"],
        };
        assert_eq!(
            err.to_string(),
            "Missing master key: set CONFTREE_MASTER_KEY or CONFTREE_MASTER_KEY_PATH"
        );
    }

    #[test]
    fn test_not_found_predicate() {
        assert!(ConfigError::not_found("a.b").is_not_found());
        assert!(!ConfigError::path("a..b", "empty segment").is_not_found());
    }
}
