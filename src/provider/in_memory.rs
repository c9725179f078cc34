//! Programmatic in-memory provider.

use super::ConfigProvider;
use crate::error::ConfigResult;
use crate::tree::{MapNode, TreeNode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Mutable tree set from code, typically for overrides in tests.
///
/// Clones share the same tree, so a handle kept by the caller sees and
/// drives the registered provider. [`ConfigProvider::fork`] detaches.
#[derive(Debug, Default, Clone)]
pub struct MapProvider {
    tree: Arc<RwLock<TreeNode>>,
    dirty: Arc<AtomicBool>,
}

impl MapProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tree.
    pub fn with_tree(tree: MapNode) -> Self {
        Self {
            tree: Arc::new(RwLock::new(TreeNode::Map(tree))),
            dirty: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Set a node at `path`.
    pub fn set(&self, path: &str, node: impl Into<TreeNode>) -> ConfigResult<()> {
        let mut tree = self.tree.write().unwrap_or_else(|p| p.into_inner());
        tree.set(path, node.into())?;
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    /// Remove the node at `path`.
    pub fn remove(&self, path: &str) -> ConfigResult<Option<TreeNode>> {
        let mut tree = self.tree.write().unwrap_or_else(|p| p.into_inner());
        let removed = tree.remove(path)?;
        if removed.is_some() {
            self.dirty.store(true, Ordering::Release);
        }
        Ok(removed)
    }

    /// Independent copy of the current tree.
    pub fn detached(&self) -> Self {
        Self::with_tree(self.snapshot())
    }

    fn snapshot(&self) -> MapNode {
        let tree = self.tree.read().unwrap_or_else(|p| p.into_inner());
        tree.as_map().cloned().unwrap_or_default()
    }
}

impl ConfigProvider for MapProvider {
    fn provide(&self) -> ConfigResult<MapNode> {
        self.dirty.store(false, Ordering::Release);
        Ok(self.snapshot())
    }

    fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn fork(&self) -> Box<dyn ConfigProvider> {
        Box::new(self.detached())
    }
}
