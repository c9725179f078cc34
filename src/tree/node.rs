//! Configuration tree nodes.

use super::path::TreePath;
use crate::error::{ConfigError, ConfigResult};

/// Placeholder rendered in place of hidden values.
pub const REDACTED: &str = "******";

/// A node of the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Map(MapNode),
    Array(ArrayNode),
    Value(ValueNode),
}

/// Ordered mapping from key to child node. Keys are unique.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MapNode {
    entries: Vec<(String, TreeNode)>,
}

/// Ordered sequence of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArrayNode {
    items: Vec<TreeNode>,
}

/// Scalar string value, optionally hidden from diagnostic output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueNode {
    value: String,
    hidden: bool,
}

impl ValueNode {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            hidden: false,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Mark this value as secret. Reads are unaffected; display output is redacted.
    pub fn hide(&mut self) {
        self.hidden = true;
    }

    /// The value as it should appear in diagnostics.
    pub fn display_value(&self) -> &str {
        if self.hidden { REDACTED } else { &self.value }
    }
}

impl MapNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&TreeNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut TreeNode> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Insert or replace a child. A replaced child keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, node: TreeNode) -> Option<TreeNode> {
        let key = key.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, node)),
            None => {
                self.entries.push((key, node));
                None
            }
        }
    }

    /// Remove a child. Removing an absent key is a no-op.
    pub fn remove(&mut self, key: &str) -> Option<TreeNode> {
        let i = self.position(key)?;
        Some(self.entries.remove(i).1)
    }

    /// Rename a child in place. An existing child named `to` is replaced.
    ///
    /// Returns false if `from` is absent.
    pub fn move_key(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.contains_key(from);
        }
        if !self.contains_key(from) {
            return false;
        }
        if let Some(j) = self.position(to) {
            self.entries.remove(j);
        }
        if let Some(i) = self.position(from) {
            self.entries[i].0 = to.to_string();
        }
        true
    }

    /// Merge `node` into the child named `key`, or insert it if absent.
    pub fn merge_entry(&mut self, key: impl Into<String>, node: TreeNode) {
        let key = key.into();
        match self.position(&key) {
            Some(i) => {
                let existing = std::mem::replace(
                    &mut self.entries[i].1,
                    TreeNode::Map(MapNode::new()),
                );
                self.entries[i].1 = existing.merge(node);
            }
            None => self.entries.push((key, node)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut TreeNode)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), &mut *v))
    }

    /// Keep only the entries for which `f` returns true.
    pub fn retain(&mut self, mut f: impl FnMut(&str, &mut TreeNode) -> bool) {
        self.entries.retain_mut(|(k, v)| f(k, v));
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

impl FromIterator<(String, TreeNode)> for MapNode {
    fn from_iter<I: IntoIterator<Item = (String, TreeNode)>>(iter: I) -> Self {
        let mut map = MapNode::new();
        for (key, node) in iter {
            map.insert(key, node);
        }
        map
    }
}

impl IntoIterator for MapNode {
    type Item = (String, TreeNode);
    type IntoIter = std::vec::IntoIter<(String, TreeNode)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl ArrayNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TreeNode> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TreeNode> {
        self.items.get_mut(index)
    }

    pub fn push(&mut self, node: TreeNode) {
        self.items.push(node);
    }

    pub fn remove(&mut self, index: usize) -> Option<TreeNode> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TreeNode> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, TreeNode> {
        self.items.iter_mut()
    }
}

impl FromIterator<TreeNode> for ArrayNode {
    fn from_iter<I: IntoIterator<Item = TreeNode>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ArrayNode {
    type Item = TreeNode;
    type IntoIter = std::vec::IntoIter<TreeNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl From<MapNode> for TreeNode {
    fn from(map: MapNode) -> Self {
        TreeNode::Map(map)
    }
}

impl From<ArrayNode> for TreeNode {
    fn from(array: ArrayNode) -> Self {
        TreeNode::Array(array)
    }
}

impl From<&str> for TreeNode {
    fn from(value: &str) -> Self {
        TreeNode::Value(ValueNode::new(value))
    }
}

impl From<String> for TreeNode {
    fn from(value: String) -> Self {
        TreeNode::Value(ValueNode::new(value))
    }
}

impl Default for TreeNode {
    fn default() -> Self {
        TreeNode::Map(MapNode::new())
    }
}

impl TreeNode {
    /// Create a scalar node.
    pub fn value(value: impl Into<String>) -> Self {
        TreeNode::Value(ValueNode::new(value))
    }

    /// Human-readable node kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            TreeNode::Map(_) => "map",
            TreeNode::Array(_) => "array",
            TreeNode::Value(_) => "value",
        }
    }

    pub fn as_map(&self) -> Option<&MapNode> {
        match self {
            TreeNode::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut MapNode> {
        match self {
            TreeNode::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayNode> {
        match self {
            TreeNode::Array(array) => Some(array),
            _ => None,
        }
    }

    /// The scalar content, if this is a value node.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TreeNode::Value(value) => Some(value.value()),
            _ => None,
        }
    }

    /// Look up a node by path expression.
    ///
    /// Returns `Ok(None)` if any segment is absent, and an error if the path
    /// is malformed or tries to descend into a scalar.
    pub fn get(&self, path: &str) -> ConfigResult<Option<&TreeNode>> {
        self.get_path(&TreePath::parse(path)?)
    }

    pub fn get_path(&self, path: &TreePath) -> ConfigResult<Option<&TreeNode>> {
        let mut current = self;
        for (depth, segment) in path.segments().iter().enumerate() {
            let next = match current {
                TreeNode::Map(map) => map.get(segment),
                TreeNode::Array(array) => array.get(parse_index(path, depth, segment)?),
                TreeNode::Value(_) => {
                    return Err(mismatch(path, depth, "map or array", current.kind()));
                }
            };
            match next {
                Some(node) => current = node,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn get_mut(&mut self, path: &str) -> ConfigResult<Option<&mut TreeNode>> {
        self.get_path_mut(&TreePath::parse(path)?)
    }

    pub fn get_path_mut(&mut self, path: &TreePath) -> ConfigResult<Option<&mut TreeNode>> {
        let mut current = self;
        for (depth, segment) in path.segments().iter().enumerate() {
            let next = match current {
                TreeNode::Map(map) => map.get_mut(segment),
                TreeNode::Array(array) => array.get_mut(parse_index(path, depth, segment)?),
                TreeNode::Value(_) => {
                    return Err(mismatch(path, depth, "map or array", "value"));
                }
            };
            match next {
                Some(node) => current = node,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Set the node at `path`, creating intermediate maps as needed.
    pub fn set(&mut self, path: &str, node: TreeNode) -> ConfigResult<()> {
        self.set_path(&TreePath::parse(path)?, node)
    }

    pub fn set_path(&mut self, path: &TreePath, node: TreeNode) -> ConfigResult<()> {
        let Some((last, parents)) = path.segments().split_last() else {
            *self = node;
            return Ok(());
        };

        let mut current = self;
        for (depth, segment) in parents.iter().enumerate() {
            current = match current {
                TreeNode::Map(map) => {
                    if !map.contains_key(segment) {
                        map.insert(segment.clone(), TreeNode::Map(MapNode::new()));
                    }
                    match map.get_mut(segment) {
                        Some(child) => child,
                        None => return Err(mismatch(path, depth, "map", "nothing")),
                    }
                }
                TreeNode::Array(array) => {
                    let index = parse_index(path, depth, segment)?;
                    if index == array.len() {
                        array.push(TreeNode::Map(MapNode::new()));
                    }
                    match array.get_mut(index) {
                        Some(child) => child,
                        None => return Err(out_of_bounds(path, depth)),
                    }
                }
                TreeNode::Value(_) => return Err(mismatch(path, depth, "map or array", "value")),
            };
        }

        let depth = parents.len();
        match current {
            TreeNode::Map(map) => {
                map.insert(last.clone(), node);
                Ok(())
            }
            TreeNode::Array(array) => {
                let index = parse_index(path, depth, last)?;
                if index == array.len() {
                    array.push(node);
                } else if let Some(slot) = array.get_mut(index) {
                    *slot = node;
                } else {
                    return Err(out_of_bounds(path, depth));
                }
                Ok(())
            }
            TreeNode::Value(_) => Err(mismatch(path, depth, "map or array", "value")),
        }
    }

    /// Remove the node at `path`. Absent paths are a no-op.
    pub fn remove(&mut self, path: &str) -> ConfigResult<Option<TreeNode>> {
        let path = TreePath::parse(path)?;
        let Some((parent_path, last)) = path.split_last() else {
            return Ok(Some(std::mem::take(self)));
        };
        let depth = parent_path.segments().len();
        match self.get_path_mut(&parent_path)? {
            Some(TreeNode::Map(map)) => Ok(map.remove(last)),
            Some(TreeNode::Array(array)) => Ok(array.remove(parse_index(&path, depth, last)?)),
            Some(TreeNode::Value(_)) => Err(mismatch(&path, depth, "map or array", "value")),
            None => Ok(None),
        }
    }

    /// Hide this node: a scalar is marked secret, containers hide every
    /// scalar below them.
    pub fn hide(&mut self) {
        match self {
            TreeNode::Value(value) => value.hide(),
            TreeNode::Map(map) => map.iter_mut().for_each(|(_, child)| child.hide()),
            TreeNode::Array(array) => array.iter_mut().for_each(TreeNode::hide),
        }
    }

    /// Apply `f` to every scalar in the tree.
    pub fn for_each_value_mut(&mut self, f: &mut impl FnMut(&mut ValueNode)) {
        match self {
            TreeNode::Value(value) => f(value),
            TreeNode::Map(map) => {
                for (_, child) in map.iter_mut() {
                    child.for_each_value_mut(f);
                }
            }
            TreeNode::Array(array) => {
                for child in array.iter_mut() {
                    child.for_each_value_mut(f);
                }
            }
        }
    }
}

fn parse_index(path: &TreePath, depth: usize, segment: &str) -> ConfigResult<usize> {
    segment
        .parse::<usize>()
        .map_err(|_| mismatch(path, depth, "array index", "key"))
}

fn prefix(path: &TreePath, depth: usize) -> String {
    TreePath::from(path.segments()[..=depth].to_vec()).to_string()
}

fn mismatch(path: &TreePath, depth: usize, expected: &'static str, found: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        path: prefix(path, depth),
        expected,
        found,
    }
}

fn out_of_bounds(path: &TreePath, depth: usize) -> ConfigError {
    ConfigError::path(prefix(path, depth), "array index out of bounds")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeNode {
        let mut root = TreeNode::default();
        root.set("app.name", TreeNode::value("demo")).unwrap();
        root.set(
            "app.servers",
            TreeNode::Array(
                ["a", "b"]
                    .into_iter()
                    .map(TreeNode::value)
                    .collect::<ArrayNode>(),
            ),
        )
        .unwrap();
        root
    }

    #[test]
    fn test_set_then_get() {
        let mut root = TreeNode::default();
        let mut inner = MapNode::new();
        inner.insert("port", TreeNode::value("8080"));
        root.set("server.http", TreeNode::Map(inner.clone())).unwrap();

        assert_eq!(
            root.get("server.http").unwrap(),
            Some(&TreeNode::Map(inner))
        );
        assert_eq!(
            root.get("server.http.port").unwrap().and_then(TreeNode::as_str),
            Some("8080")
        );
    }

    #[test]
    fn test_get_absent_is_none() {
        let root = sample();
        assert_eq!(root.get("app.missing.deeper").unwrap(), None);
        assert_eq!(root.get("app.servers.5").unwrap(), None);
    }

    #[test]
    fn test_get_array_index() {
        let root = sample();
        assert_eq!(root.get("app.servers[1]").unwrap().and_then(TreeNode::as_str), Some("b"));
        assert_eq!(root.get("app.servers.0").unwrap().and_then(TreeNode::as_str), Some("a"));
    }

    #[test]
    fn test_indexing_a_value_is_type_mismatch() {
        let root = sample();
        let err = root.get("app.name.first").unwrap_err();
        match err {
            ConfigError::TypeMismatch { path, found, .. } => {
                assert_eq!(path, "app.name.first");
                assert_eq!(found, "value");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_array_segment_is_error() {
        let root = sample();
        assert!(root.get("app.servers.first").is_err());
    }

    #[test]
    fn test_set_through_value_fails() {
        let mut root = sample();
        assert!(root.set("app.name.x", TreeNode::value("1")).is_err());
    }

    #[test]
    fn test_set_array_append_and_out_of_bounds() {
        let mut root = sample();
        root.set("app.servers.2", TreeNode::value("c")).unwrap();
        assert_eq!(root.get("app.servers.2").unwrap().and_then(TreeNode::as_str), Some("c"));
        assert!(root.set("app.servers.9", TreeNode::value("z")).is_err());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut root = sample();
        assert!(root.remove("app.name").unwrap().is_some());
        assert!(root.remove("app.name").unwrap().is_none());
        assert!(root.remove("nothing.here").unwrap().is_none());
    }

    #[test]
    fn test_move_key_keeps_position_and_replaces_target() {
        let mut map = MapNode::new();
        map.insert("a", TreeNode::value("1"));
        map.insert("b<dev>", TreeNode::value("2"));
        map.insert("b", TreeNode::value("3"));

        assert!(map.move_key("b<dev>", "b"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("b").and_then(TreeNode::as_str), Some("2"));
        assert!(!map.move_key("missing", "x"));
    }

    #[test]
    fn test_hide_keeps_value() {
        let mut node = TreeNode::value("s3cret");
        node.hide();
        match &node {
            TreeNode::Value(v) => {
                assert_eq!(v.value(), "s3cret");
                assert_eq!(v.display_value(), REDACTED);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_hide_container_hides_descendants() {
        let mut root = sample();
        root.get_mut("app").unwrap().unwrap().hide();
        let mut hidden = 0;
        root.for_each_value_mut(&mut |v| {
            if v.is_hidden() {
                hidden += 1;
            }
        });
        assert_eq!(hidden, 3);
    }
}
