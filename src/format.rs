//! Serialized formats for configuration content.

use crate::error::{ConfigError, ConfigResult};
use crate::tree::{ArrayNode, MapNode, TreeNode};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use std::path::Path;
use tracing::warn;

/// Format of serialized configuration content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
        }
    }

    /// Parse content into a tree. `origin` identifies the content in errors.
    ///
    /// Null map values are dropped; null array items become empty values so
    /// later indexes do not shift. An empty document yields an empty map.
    pub fn parse(&self, content: &str, origin: &str) -> ConfigResult<TreeNode> {
        let parse_error = |message: String| ConfigError::Parse {
            format: self.name(),
            origin: origin.to_string(),
            message,
        };
        let node = match self {
            Format::Yaml => {
                let value: YamlValue =
                    serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;
                from_yaml(value)
            }
            Format::Json => {
                let value: JsonValue =
                    serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?;
                from_json(value)
            }
        };
        Ok(node.unwrap_or_default())
    }

    /// Render a tree, redacting hidden values.
    pub fn render(&self, node: &TreeNode) -> ConfigResult<String> {
        let value = node.to_display_value();
        let rendered = match self {
            Format::Yaml => serde_yaml::to_string(&value).map_err(|e| e.to_string()),
            Format::Json => serde_json::to_string_pretty(&value).map_err(|e| e.to_string()),
        };
        rendered.map_err(|message| ConfigError::Parse {
            format: self.name(),
            origin: "rendered tree".to_string(),
            message,
        })
    }
}

/// Convert a JSON value into a tree. Returns `None` for null.
///
/// Null array items are kept as empty values.
pub fn from_json(value: JsonValue) -> Option<TreeNode> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(b) => Some(TreeNode::value(b.to_string())),
        JsonValue::Number(n) => Some(TreeNode::value(n.to_string())),
        JsonValue::String(s) => Some(TreeNode::value(s)),
        JsonValue::Array(items) => Some(TreeNode::Array(
            items
                .into_iter()
                .map(|item| from_json(item).unwrap_or_else(|| TreeNode::value("")))
                .collect::<ArrayNode>(),
        )),
        JsonValue::Object(object) => Some(TreeNode::Map(
            object
                .into_iter()
                .filter_map(|(k, v)| from_json(v).map(|node| (k, node)))
                .collect::<MapNode>(),
        )),
    }
}

/// Convert a YAML value into a tree. Returns `None` for null.
pub fn from_yaml(value: YamlValue) -> Option<TreeNode> {
    match value {
        YamlValue::Null => None,
        YamlValue::Bool(b) => Some(TreeNode::value(b.to_string())),
        YamlValue::Number(n) => Some(TreeNode::value(n.to_string())),
        YamlValue::String(s) => Some(TreeNode::value(s)),
        YamlValue::Sequence(items) => Some(TreeNode::Array(
            items
                .into_iter()
                .map(|item| from_yaml(item).unwrap_or_else(|| TreeNode::value("")))
                .collect::<ArrayNode>(),
        )),
        YamlValue::Mapping(mapping) => Some(TreeNode::Map(
            mapping
                .into_iter()
                .filter_map(|(k, v)| {
                    let key = yaml_key(k)?;
                    from_yaml(v).map(|node| (key, node))
                })
                .collect::<MapNode>(),
        )),
        YamlValue::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn yaml_key(key: YamlValue) -> Option<String> {
    match key {
        YamlValue::String(s) => Some(s),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Tagged(tagged) => yaml_key(tagged.value),
        other => {
            warn!(key = ?other, "Skipping YAML mapping entry with a non-scalar key");
            None
        }
    }
}
