//! Environment variables exposed under `env.*`.

use super::ConfigProvider;
use crate::error::ConfigResult;
use crate::tree::{MapNode, TreeNode};
use std::collections::BTreeMap;

/// Root key of the environment subtree.
pub const ENV_ROOT: &str = "env";

/// Exposes a snapshot of environment variables as `env.<NAME>`.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentProvider {
    vars: BTreeMap<String, String>,
}

impl EnvironmentProvider {
    /// Snapshot the current process environment. Non-UTF-8 entries are skipped.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Use an explicit set of variables.
    pub fn with_vars(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

impl ConfigProvider for EnvironmentProvider {
    fn provide(&self) -> ConfigResult<MapNode> {
        let env: MapNode = self
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), TreeNode::value(v.as_str())))
            .collect();
        let mut root = MapNode::new();
        root.insert(ENV_ROOT, TreeNode::Map(env));
        Ok(root)
    }

    fn fork(&self) -> Box<dyn ConfigProvider> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provides_env_subtree() {
        let provider = EnvironmentProvider::with_vars(BTreeMap::from([
            ("HOME".to_string(), "/home/app".to_string()),
            ("APP_PORT".to_string(), "8080".to_string()),
        ]));
        let tree = TreeNode::Map(provider.provide().unwrap());
        assert_eq!(tree.get("env.HOME").unwrap().and_then(TreeNode::as_str), Some("/home/app"));
        assert_eq!(tree.get("env.APP_PORT").unwrap().and_then(TreeNode::as_str), Some("8080"));
    }

    #[test]
    fn test_from_process_is_not_dirty() {
        let provider = EnvironmentProvider::from_process();
        assert!(!provider.is_dirty());
        assert!(provider.provide().is_ok());
    }
}
