//! Configuration resources discovered under resource roots.
//!
//! Each root contributes every `*.yaml`, `*.yml` and `*.json` file found
//! (recursively) under its `conftree/` directory. Several roots may contain
//! the same relative file; all of them are loaded. Files named
//! `*.override.<ext>` are loaded by a separate, higher-priority provider.

use super::ConfigProvider;
use crate::error::{ConfigError, ConfigResult};
use crate::format::Format;
use crate::tree::{MapNode, TreeNode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Directory scanned inside every resource root.
pub const RESOURCE_DIR: &str = "conftree";

/// Which resources a provider loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Regular resources (`app.yaml`).
    Regular,
    /// Override resources (`app.override.yaml`).
    Override,
}

impl ResourceKind {
    fn matches(&self, path: &Path) -> bool {
        let is_override = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| stem.ends_with(".override"));
        match self {
            ResourceKind::Regular => !is_override,
            ResourceKind::Override => is_override,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Regular => write!(f, "resources"),
            ResourceKind::Override => write!(f, "override resources"),
        }
    }
}

/// Loads and merges resource files from an ordered list of roots.
#[derive(Debug)]
pub struct ResourceProvider {
    roots: Vec<PathBuf>,
    kind: ResourceKind,
    fail_fast: bool,
    dirty: Arc<AtomicBool>,
}

impl ResourceProvider {
    /// Roots are merged in order: later roots override earlier ones.
    pub fn new(roots: Vec<PathBuf>, kind: ResourceKind) -> Self {
        Self {
            roots,
            kind,
            fail_fast: false,
            dirty: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Fail on the first unreadable or unparsable resource instead of
    /// skipping it.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Flag shared with file watchers; setting it marks the provider dirty.
    pub fn dirty_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.dirty)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// All matching resources in discovery order.
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut resources = Vec::new();
        for root in &self.roots {
            let dir = root.join(RESOURCE_DIR);
            if !dir.is_dir() {
                debug!(root = %root.display(), "No {} directory in resource root", RESOURCE_DIR);
                continue;
            }
            let mut found = Vec::new();
            collect_files(&dir, &mut found);
            found.retain(|path| Format::from_path(path).is_some() && self.kind.matches(path));
            found.sort();
            resources.extend(found);
        }
        resources
    }

    fn load(path: &Path) -> ConfigResult<MapNode> {
        let origin = path.display().to_string();
        let format = Format::from_path(path)
            .ok_or_else(|| ConfigError::source_failure(&origin, "unsupported extension"))?;
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io(&origin, e))?;
        match format.parse(&content, &origin)? {
            TreeNode::Map(map) => Ok(map),
            other => Err(ConfigError::source_failure(
                origin,
                format!("top-level {} is not a map", other.kind()),
            )),
        }
    }
}

/// Symlinked files are followed; symlinked directories are not, so a link
/// cycle cannot make discovery recurse forever.
fn collect_files(dir: &Path, found: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot list resource directory");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            collect_files(&path, found);
        } else if file_type.is_symlink() && path.is_dir() {
            debug!(path = %path.display(), "Skipping symlinked resource directory");
        } else {
            found.push(path);
        }
    }
}

impl ConfigProvider for ResourceProvider {
    fn provide(&self) -> ConfigResult<MapNode> {
        self.dirty.store(false, Ordering::Release);

        let mut merged = TreeNode::Map(MapNode::new());
        for path in self.discover() {
            match Self::load(&path) {
                Ok(tree) => {
                    debug!(resource = %path.display(), kind = %self.kind, "Loaded configuration resource");
                    merged = merged.merge(TreeNode::Map(tree));
                }
                Err(e) if self.fail_fast => return Err(e),
                Err(e) => warn!(resource = %path.display(), error = %e, "Skipping configuration resource"),
            }
        }
        Ok(merged.as_map().cloned().unwrap_or_default())
    }

    fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn fork(&self) -> Box<dyn ConfigProvider> {
        Box::new(ResourceProvider::new(self.roots.clone(), self.kind).fail_fast(self.fail_fast))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(RESOURCE_DIR).join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn value(tree: &MapNode, path: &str) -> Option<String> {
        TreeNode::Map(tree.clone())
            .get(path)
            .unwrap()
            .and_then(TreeNode::as_str)
            .map(str::to_string)
    }

    #[test]
    fn test_merges_files_in_sorted_order() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.yaml", "app:\n  name: a\n  only_a: 1");
        write(temp.path(), "b.json", r#"{"app": {"name": "b"}}"#);

        let provider = ResourceProvider::new(vec![temp.path().to_path_buf()], ResourceKind::Regular);
        let tree = provider.provide().unwrap();
        assert_eq!(value(&tree, "app.name").as_deref(), Some("b"));
        assert_eq!(value(&tree, "app.only_a").as_deref(), Some("1"));
    }

    #[test]
    fn test_same_path_in_several_roots_is_merged() {
        let low = TempDir::new().unwrap();
        let high = TempDir::new().unwrap();
        write(low.path(), "app.yaml", "name: low\nport: 1");
        write(high.path(), "app.yaml", "name: high");

        let provider = ResourceProvider::new(
            vec![low.path().to_path_buf(), high.path().to_path_buf()],
            ResourceKind::Regular,
        );
        let tree = provider.provide().unwrap();
        assert_eq!(value(&tree, "name").as_deref(), Some("high"));
        assert_eq!(value(&tree, "port").as_deref(), Some("1"));
    }

    #[test]
    fn test_override_files_are_split_out() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "base.yaml", "app:\n  name: base");
        write(temp.path(), "base.override.yaml", "app:\n  name: override");
        let roots = vec![temp.path().to_path_buf()];

        let regular = ResourceProvider::new(roots.clone(), ResourceKind::Regular);
        let overrides = ResourceProvider::new(roots, ResourceKind::Override);
        assert_eq!(regular.discover().len(), 1);
        assert_eq!(value(&regular.provide().unwrap(), "app.name").as_deref(), Some("base"));
        assert_eq!(value(&overrides.provide().unwrap(), "app.name").as_deref(), Some("override"));
    }

    #[test]
    fn test_nested_directories_and_unknown_extensions() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "nested/deep/x.yml", "x: 1");
        write(temp.path(), "notes.txt", "ignored");
        let provider = ResourceProvider::new(vec![temp.path().to_path_buf()], ResourceKind::Regular);
        assert_eq!(provider.discover().len(), 1);
        assert_eq!(value(&provider.provide().unwrap(), "x").as_deref(), Some("1"));
    }

    #[test]
    fn test_bad_resource_is_skipped() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "bad.json", "{not json");
        write(temp.path(), "good.yaml", "ok: yes");
        let provider = ResourceProvider::new(vec![temp.path().to_path_buf()], ResourceKind::Regular);
        let tree = provider.provide().unwrap();
        assert_eq!(value(&tree, "ok").as_deref(), Some("yes"));
    }

    #[test]
    fn test_bad_resource_fails_fast_when_requested() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "bad.json", "{not json");
        let provider = ResourceProvider::new(vec![temp.path().to_path_buf()], ResourceKind::Regular)
            .fail_fast(true);
        let err = provider.provide().unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_scalar_document_is_rejected() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "scalar.yaml", "just a string");
        let provider = ResourceProvider::new(vec![temp.path().to_path_buf()], ResourceKind::Regular)
            .fail_fast(true);
        assert!(matches!(provider.provide(), Err(ConfigError::Source { .. })));
    }

    #[test]
    fn test_dirty_flag_lifecycle() {
        let temp = TempDir::new().unwrap();
        let provider = ResourceProvider::new(vec![temp.path().to_path_buf()], ResourceKind::Regular);
        assert!(provider.is_dirty());
        provider.provide().unwrap();
        assert!(!provider.is_dirty());
        provider.dirty_flag().store(true, Ordering::Release);
        assert!(provider.is_dirty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_cycle_is_not_followed() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "nested/app.yaml", "name: real");
        let dir = temp.path().join(RESOURCE_DIR);
        std::os::unix::fs::symlink(&dir, dir.join("nested").join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.join("nested/app.yaml"), dir.join("linked.yaml")).unwrap();

        let provider = ResourceProvider::new(vec![temp.path().to_path_buf()], ResourceKind::Regular);
        let found = provider.discover();
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.ends_with("linked.yaml")));
        assert_eq!(value(&provider.provide().unwrap(), "name").as_deref(), Some("real"));
    }
}
