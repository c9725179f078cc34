//! Discovery of the resource roots.

use crate::provider::RESOURCE_DIR;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// Platform path list of resource roots, in ascending priority.
pub const RESOURCE_PATH_ENV: &str = "CONFTREE_RESOURCE_PATH";

/// Resource roots, lowest priority first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub roots: Vec<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover roots from the process environment.
    pub fn discover() -> Self {
        let env: BTreeMap<String, String> = std::env::var(RESOURCE_PATH_ENV)
            .ok()
            .map(|v| (RESOURCE_PATH_ENV.to_string(), v))
            .into_iter()
            .collect();
        Self::from_env(&env)
    }

    /// Discover roots from an environment snapshot.
    ///
    /// `CONFTREE_RESOURCE_PATH` wins when set. Otherwise the user config
    /// directory is used if it has a `conftree/` subdirectory, followed by
    /// the current directory.
    pub fn from_env(env: &BTreeMap<String, String>) -> Self {
        if let Some(list) = env.get(RESOURCE_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            let roots: Vec<PathBuf> = std::env::split_paths(list)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            debug!(roots = ?roots, "Resource roots from {}", RESOURCE_PATH_ENV);
            return Self { roots };
        }

        let user = dirs::config_dir().filter(|dir| dir.join(RESOURCE_DIR).is_dir());
        let roots: Vec<PathBuf> = user.into_iter().chain([PathBuf::from(".")]).collect();
        debug!(roots = ?roots, "Default resource roots");
        Self { roots }
    }

    /// Use explicit roots.
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_list_wins() {
        let list = std::env::join_paths(["/a", "/b"]).unwrap();
        let env = BTreeMap::from([(
            RESOURCE_PATH_ENV.to_string(),
            list.to_string_lossy().into_owned(),
        )]);
        let paths = ConfigPaths::from_env(&env);
        assert_eq!(paths.roots, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_default_ends_with_current_dir() {
        let paths = ConfigPaths::from_env(&BTreeMap::new());
        assert_eq!(paths.roots.last(), Some(&PathBuf::from(".")));
    }
}
