//! Overlay of `conftree.config.*` system properties.

use super::ConfigProcessor;
use crate::error::ConfigResult;
use crate::properties::{CONFIG_PREFIX, split_list};
use crate::provider::SYS_ROOT;
use crate::tree::{ArrayNode, MapNode, TreePath, TreeNode};
use tracing::{debug, warn};

/// Copies every `conftree.config.<path>` system property to `<path>`.
///
/// Values containing a comma become arrays. Properties whose remaining path
/// is malformed or collides with a scalar are skipped with a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPropertiesProcessor;

impl ConfigProcessor for SystemPropertiesProcessor {
    fn name(&self) -> &'static str {
        "system-properties"
    }

    fn process(&self, root: &mut MapNode) -> ConfigResult<()> {
        let overlays: Vec<(String, String)> = match root.get(SYS_ROOT).and_then(TreeNode::as_map) {
            Some(sys) => sys
                .iter()
                .filter_map(|(key, node)| {
                    let path = key.strip_prefix(CONFIG_PREFIX).filter(|p| !p.is_empty())?;
                    Some((path.to_string(), node.as_str()?.to_string()))
                })
                .collect(),
            None => return Ok(()),
        };

        let mut tree = TreeNode::Map(std::mem::take(root));
        for (path, value) in overlays {
            let node = if value.contains(',') {
                TreeNode::Array(split_list(&value).into_iter().map(TreeNode::value).collect::<ArrayNode>())
            } else {
                TreeNode::value(value)
            };
            let applied = TreePath::parse(&path).and_then(|parsed| tree.set_path(&parsed, node));
            match applied {
                Ok(()) => debug!(path = %path, "Applied system property override"),
                Err(e) => warn!(path = %path, error = %e, "Ignoring system property override"),
            }
        }
        if let TreeNode::Map(map) = tree {
            *root = map;
        }
        Ok(())
    }
}
