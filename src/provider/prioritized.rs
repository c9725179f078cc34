//! Named providers merged by priority.

use super::ConfigProvider;
use crate::error::{ConfigError, ConfigResult};
use crate::tree::{MapNode, TreeNode};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

#[derive(Debug)]
struct ProviderEntry {
    name: String,
    priority: i32,
    provider: Box<dyn ConfigProvider>,
}

/// Name and priority of a registered provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub name: String,
    pub priority: i32,
}

/// Composite provider merging its children in ascending priority order.
///
/// Higher priorities overlay lower ones; equal priorities merge in
/// registration order. Registration changes and dirty children both make
/// the composite dirty.
#[derive(Debug)]
pub struct PrioritizedProvider {
    entries: RwLock<Vec<ProviderEntry>>,
    dirty: AtomicBool,
}

impl Default for PrioritizedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PrioritizedProvider {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            dirty: AtomicBool::new(true),
        }
    }

    /// Register a provider under a unique name.
    pub fn register(
        &self,
        name: impl Into<String>,
        provider: Box<dyn ConfigProvider>,
        priority: i32,
    ) -> ConfigResult<()> {
        let name = name.into();
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        if entries.iter().any(|e| e.name == name) {
            return Err(ConfigError::DuplicateProvider(name));
        }
        info!(provider = %name, priority, "Registered configuration provider");
        // Stable insertion keeps registration order among equal priorities.
        let at = entries.partition_point(|e| e.priority <= priority);
        entries.insert(
            at,
            ProviderEntry {
                name,
                priority,
                provider,
            },
        );
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    /// Unregister a provider, returning it.
    pub fn unregister(&self, name: &str) -> ConfigResult<Box<dyn ConfigProvider>> {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        let index = entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| ConfigError::UnknownProvider(name.to_string()))?;
        let entry = entries.remove(index);
        info!(provider = %name, "Unregistered configuration provider");
        self.dirty.store(true, Ordering::Release);
        Ok(entry.provider)
    }

    /// Swap the provider registered under `name`, keeping its priority.
    pub fn replace(
        &self,
        name: &str,
        provider: Box<dyn ConfigProvider>,
    ) -> ConfigResult<Box<dyn ConfigProvider>> {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        let entry = entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| ConfigError::UnknownProvider(name.to_string()))?;
        debug!(provider = %name, "Replaced configuration provider");
        self.dirty.store(true, Ordering::Release);
        Ok(std::mem::replace(&mut entry.provider, provider))
    }

    /// Force the next `is_dirty()` to report a change.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries.iter().any(|e| e.name == name)
    }

    /// Registered providers in merge order.
    pub fn providers(&self) -> Vec<ProviderInfo> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries
            .iter()
            .map(|e| ProviderInfo {
                name: e.name.clone(),
                priority: e.priority,
            })
            .collect()
    }
}

impl ConfigProvider for PrioritizedProvider {
    fn provide(&self) -> ConfigResult<MapNode> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        self.dirty.store(false, Ordering::Release);

        let mut merged = TreeNode::Map(MapNode::new());
        for entry in entries.iter() {
            let tree = entry.provider.provide()?;
            debug!(provider = %entry.name, priority = entry.priority, keys = tree.len(), "Merging provider");
            merged = merged.merge(TreeNode::Map(tree));
        }
        Ok(merged.as_map().cloned().unwrap_or_default())
    }

    fn is_dirty(&self) -> bool {
        if self.dirty.load(Ordering::Acquire) {
            return true;
        }
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries.iter().any(|e| e.provider.is_dirty())
    }

    fn fork(&self) -> Box<dyn ConfigProvider> {
        Box::new(self.fork_prioritized())
    }
}

impl PrioritizedProvider {
    /// Deep copy with every child provider forked.
    pub fn fork_prioritized(&self) -> PrioritizedProvider {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        let forked = entries
            .iter()
            .map(|e| ProviderEntry {
                name: e.name.clone(),
                priority: e.priority,
                provider: e.provider.fork(),
            })
            .collect();
        PrioritizedProvider {
            entries: RwLock::new(forked),
            dirty: AtomicBool::new(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::SystemProperties;
    use crate::provider::{MapProvider, SystemPropertiesProvider};

    fn map_provider(pairs: &[(&str, &str)]) -> Box<dyn ConfigProvider> {
        let provider = MapProvider::new();
        for (path, value) in pairs {
            provider.set(path, *value).unwrap();
        }
        Box::new(provider)
    }

    fn value(composite: &PrioritizedProvider, path: &str) -> Option<String> {
        TreeNode::Map(composite.provide().unwrap())
            .get(path)
            .unwrap()
            .and_then(TreeNode::as_str)
            .map(str::to_string)
    }

    #[test]
    fn test_higher_priority_wins_regardless_of_registration_order() {
        let composite = PrioritizedProvider::new();
        composite.register("high", map_provider(&[("k", "high")]), 10).unwrap();
        composite.register("low", map_provider(&[("k", "low"), ("only_low", "x")]), 1).unwrap();

        assert_eq!(value(&composite, "k").as_deref(), Some("high"));
        assert_eq!(value(&composite, "only_low").as_deref(), Some("x"));
        let names: Vec<_> = composite.providers().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["low", "high"]);
    }

    #[test]
    fn test_equal_priorities_merge_in_registration_order() {
        let composite = PrioritizedProvider::new();
        composite.register("first", map_provider(&[("k", "first")]), 0).unwrap();
        composite.register("second", map_provider(&[("k", "second")]), 0).unwrap();
        assert_eq!(value(&composite, "k").as_deref(), Some("second"));
    }

    #[test]
    fn test_merge_equals_ordered_fold() {
        let trees = [("a", "1"), ("b", "2"), ("c", "3")];
        let composite = PrioritizedProvider::new();
        let mut expected = TreeNode::Map(MapNode::new());
        for (i, (name, v)) in trees.iter().enumerate() {
            let provider = MapProvider::new();
            provider.set("shared", *v).unwrap();
            provider.set(name, *v).unwrap();
            expected = expected.merge(TreeNode::Map(provider.provide().unwrap()));
            composite.register(*name, Box::new(provider), i as i32).unwrap();
        }
        assert_eq!(TreeNode::Map(composite.provide().unwrap()), expected);
    }

    #[test]
    fn test_duplicate_registration_is_error() {
        let composite = PrioritizedProvider::new();
        composite.register("a", map_provider(&[]), 0).unwrap();
        let err = composite.register("a", map_provider(&[]), 5).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProvider(name) if name == "a"));
    }

    #[test]
    fn test_unregister_unknown_is_error() {
        let composite = PrioritizedProvider::new();
        assert!(matches!(
            composite.unregister("nope"),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_dirty_tracking() {
        let composite = PrioritizedProvider::new();
        assert!(composite.is_dirty());
        composite.provide().unwrap();
        assert!(!composite.is_dirty());

        composite.register("a", map_provider(&[("k", "v")]), 0).unwrap();
        assert!(composite.is_dirty());
        composite.provide().unwrap();
        assert!(!composite.is_dirty());

        composite.unregister("a").unwrap();
        assert!(composite.is_dirty());
    }

    #[test]
    fn test_dirty_child_makes_composite_dirty() {
        let properties = SystemProperties::new();
        let composite = PrioritizedProvider::new();
        composite
            .register("system", Box::new(SystemPropertiesProvider::new(properties.clone())), 0)
            .unwrap();
        composite.provide().unwrap();
        assert!(!composite.is_dirty());

        properties.set("a", "1");
        assert!(composite.is_dirty());
        assert_eq!(value(&composite, "sys.a").as_deref(), Some("1"));
        assert!(!composite.is_dirty());
    }

    #[test]
    fn test_fork_is_deep() {
        let composite = PrioritizedProvider::new();
        composite.register("base", map_provider(&[("k", "base")]), 0).unwrap();
        let forked = composite.fork_prioritized();

        forked.register("test", map_provider(&[("k", "test")]), 1).unwrap();
        assert_eq!(value(&forked, "k").as_deref(), Some("test"));
        assert_eq!(value(&composite, "k").as_deref(), Some("base"));
        assert!(!composite.is_registered("test"));
    }

    #[test]
    fn test_replace_keeps_priority() {
        let composite = PrioritizedProvider::new();
        composite.register("low", map_provider(&[("k", "low")]), 0).unwrap();
        composite.register("high", map_provider(&[("k", "high")]), 5).unwrap();
        composite.provide().unwrap();

        composite.replace("low", map_provider(&[("k", "replaced"), ("extra", "x")])).unwrap();
        assert!(composite.is_dirty());
        assert_eq!(value(&composite, "k").as_deref(), Some("high"));
        assert_eq!(value(&composite, "extra").as_deref(), Some("x"));
        assert!(composite.replace("nope", map_provider(&[])).is_err());
    }
}
