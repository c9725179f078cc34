//! Per-component properties inherited along a dotted name.

use crate::tree::TreeNode;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Root of the per-component configuration section.
pub const CLASSES_ROOT: &str = "classes";

/// Scalar properties for a dotted component name such as `app.web.Handler`.
///
/// Properties are collected from `classes.app`, `classes.app.web` and
/// `classes.app.web.Handler` in that order, so the most specific level wins.
/// Nested maps are the next levels down and are not properties themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassConfiguration {
    name: String,
    properties: BTreeMap<String, String>,
}

impl ClassConfiguration {
    pub fn resolve(tree: &TreeNode, name: &str) -> Self {
        let mut properties = BTreeMap::new();
        let mut level = tree.as_map().and_then(|root| root.get(CLASSES_ROOT));

        for segment in name.split('.').filter(|s| !s.is_empty()) {
            let Some(map) = level.and_then(|node| node.as_map()).and_then(|m| m.get(segment)) else {
                break;
            };
            if let Some(entries) = map.as_map() {
                for (key, node) in entries.iter() {
                    if let Some(value) = node.as_str() {
                        properties.insert(key.to_string(), value.to_string());
                    }
                }
            }
            level = Some(map);
        }

        Self {
            name: name.to_string(),
            properties,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Parse a property, `Ok(None)` when absent.
    pub fn get_as<T: FromStr>(&self, key: &str) -> Result<Option<T>, T::Err> {
        self.get(key).map(str::parse).transpose()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
