//! `-key` tombstones.

use super::{ConfigProcessor, visit_maps};
use crate::error::ConfigResult;
use crate::tree::MapNode;
use tracing::debug;

/// Removes every `-key` entry together with the `key` entry it names.
///
/// Because providers are merged before processing, a higher-priority source
/// can delete a value defined by a lower-priority one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemovalProcessor;

impl ConfigProcessor for RemovalProcessor {
    fn name(&self) -> &'static str {
        "removal"
    }

    fn process(&self, root: &mut MapNode) -> ConfigResult<()> {
        visit_maps(root, &mut |map| {
            let tombstones: Vec<String> = map
                .keys()
                .filter(|k| k.len() > 1 && k.starts_with('-'))
                .map(str::to_string)
                .collect();
            for tombstone in tombstones {
                let target = &tombstone[1..];
                map.remove(&tombstone);
                if map.remove(target).is_some() {
                    debug!(key = target, "Removed configuration key");
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::tree::TreeNode;

    fn process(yaml: &str) -> TreeNode {
        let TreeNode::Map(mut root) = Format::Yaml.parse(yaml, "test").unwrap() else {
            unreachable!()
        };
        RemovalProcessor.process(&mut root).unwrap();
        TreeNode::Map(root)
    }

    #[test]
    fn test_tombstone_removes_both_keys() {
        let tree = process("foo: 1\n-foo: true\nbar: 2");
        assert_eq!(tree.get("foo").unwrap(), None);
        assert_eq!(tree.get("-foo").unwrap(), None);
        assert_eq!(tree.get("bar").unwrap().and_then(TreeNode::as_str), Some("2"));
    }

    #[test]
    fn test_tombstone_without_target() {
        let tree = process("-ghost: true\nkept: 1");
        assert_eq!(tree.as_map().unwrap().len(), 1);
    }

    #[test]
    fn test_nested_tombstones() {
        let tree = process("server:\n  port: 80\n  -port: x\nlist:\n  - a: 1\n    -a: x");
        assert_eq!(tree.get("server.port").unwrap(), None);
        assert_eq!(tree.get("list.0.a").unwrap(), None);
    }

    #[test]
    fn test_tombstone_across_merged_sources() {
        let low = Format::Yaml.parse("foo: 1", "low").unwrap();
        let high = Format::Yaml.parse("-foo: ''", "high").unwrap();
        let TreeNode::Map(mut root) = low.merge(high) else {
            unreachable!()
        };
        RemovalProcessor.process(&mut root).unwrap();
        assert!(root.is_empty());
    }

    #[test]
    fn test_lone_dash_key_is_kept() {
        let tree = process("'-': dash");
        assert_eq!(tree.get("-").unwrap().and_then(TreeNode::as_str), Some("dash"));
    }
}
