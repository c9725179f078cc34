//! System properties exposed under `sys.*`.

use super::ConfigProvider;
use crate::error::ConfigResult;
use crate::properties::SystemProperties;
use crate::tree::{MapNode, TreeNode};
use std::sync::atomic::{AtomicU64, Ordering};

/// Root key of the system properties subtree.
pub const SYS_ROOT: &str = "sys";

/// Exposes system properties as flat children of `sys`.
///
/// Property names keep their dots, so `user.name` is addressed as
/// `sys.user\.name`.
#[derive(Debug)]
pub struct SystemPropertiesProvider {
    properties: SystemProperties,
    seen_revision: AtomicU64,
}

impl SystemPropertiesProvider {
    pub fn new(properties: SystemProperties) -> Self {
        Self {
            properties,
            // Dirty until the first provide().
            seen_revision: AtomicU64::new(u64::MAX),
        }
    }

    pub fn properties(&self) -> &SystemProperties {
        &self.properties
    }
}

impl ConfigProvider for SystemPropertiesProvider {
    fn provide(&self) -> ConfigResult<MapNode> {
        let revision = self.properties.revision();
        let sys: MapNode = self
            .properties
            .snapshot()
            .into_iter()
            .map(|(k, v)| (k, TreeNode::value(v)))
            .collect();
        self.seen_revision.store(revision, Ordering::Release);

        let mut root = MapNode::new();
        root.insert(SYS_ROOT, TreeNode::Map(sys));
        Ok(root)
    }

    fn is_dirty(&self) -> bool {
        self.seen_revision.load(Ordering::Acquire) != self.properties.revision()
    }

    fn fork(&self) -> Box<dyn ConfigProvider> {
        Box::new(Self::new(self.properties.fork()))
    }
}
