//! In-memory configuration tree.
//!
//! A tree is made of [`MapNode`]s, [`ArrayNode`]s and string [`ValueNode`]s.
//! Nodes are owned by exactly one parent, so the structure is always a tree
//! and can be merged and walked without cycle checks. Scalars are untyped
//! strings; conversion happens in [`crate::mapping`].

mod merge;
mod node;
mod path;
mod walk;

pub use merge::merge_all;
pub use node::{ArrayNode, MapNode, REDACTED, TreeNode, ValueNode};
pub use path::{TreePath, escape_segment, join};
pub use walk::Walk;
