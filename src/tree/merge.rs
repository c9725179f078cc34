//! Deep merge of configuration trees.
//!
//! Maps are merged key by key; arrays and scalars are replaced entirely by
//! the overlay, never concatenated.

use super::node::TreeNode;

impl TreeNode {
    /// Deep merge `overlay` onto `self`, with `overlay` taking precedence.
    ///
    /// - Maps are merged recursively: keys in overlay override keys in base
    /// - Arrays and values are replaced by the overlay
    /// - A kind conflict (map vs value) is resolved in favor of the overlay
    pub fn merge(self, overlay: TreeNode) -> TreeNode {
        match (self, overlay) {
            (TreeNode::Map(mut base_map), TreeNode::Map(overlay_map)) => {
                for (key, overlay_value) in overlay_map {
                    base_map.merge_entry(key, overlay_value);
                }
                TreeNode::Map(base_map)
            }
            (_, overlay) => overlay,
        }
    }
}

/// Merge multiple trees in order, with later trees taking precedence.
pub fn merge_all(trees: impl IntoIterator<Item = TreeNode>) -> TreeNode {
    trees.into_iter().fold(TreeNode::default(), TreeNode::merge)
}
