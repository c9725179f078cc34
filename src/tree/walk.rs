//! Depth-first traversal and value rendering.

use super::node::TreeNode;
use super::path::join;
use serde_json::{Map, Value};
use std::fmt;

/// Lazy pre-order walk over all descendants of a node.
///
/// Each item is the rendered path of the node (relative to the walk root)
/// and the node itself. Every call to [`TreeNode::walk`] starts a fresh walk.
pub struct Walk<'a> {
    stack: Vec<(String, &'a TreeNode)>,
}

impl<'a> Walk<'a> {
    fn push_children(&mut self, path: &str, node: &'a TreeNode) {
        // Pushed in reverse so children pop in declaration order.
        match node {
            TreeNode::Map(map) => {
                let children: Vec<_> = map.iter().collect();
                for (key, child) in children.into_iter().rev() {
                    self.stack.push((join(path, key), child));
                }
            }
            TreeNode::Array(array) => {
                for (index, child) in array.iter().enumerate().rev() {
                    self.stack.push((join(path, &index.to_string()), child));
                }
            }
            TreeNode::Value(_) => {}
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = (String, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, node) = self.stack.pop()?;
        self.push_children(&path, node);
        Some((path, node))
    }
}

impl TreeNode {
    /// Walk all descendant nodes depth-first.
    pub fn walk(&self) -> Walk<'_> {
        let mut walk = Walk { stack: Vec::new() };
        walk.push_children("", self);
        walk
    }

    /// Render as a JSON value with real (unredacted) scalars.
    pub fn to_value(&self) -> Value {
        self.render(false)
    }

    /// Render as a JSON value with hidden scalars redacted.
    pub fn to_display_value(&self) -> Value {
        self.render(true)
    }

    fn render(&self, redact: bool) -> Value {
        match self {
            TreeNode::Map(map) => {
                let mut object = Map::new();
                for (key, child) in map.iter() {
                    object.insert(key.to_string(), child.render(redact));
                }
                Value::Object(object)
            }
            TreeNode::Array(array) => {
                Value::Array(array.iter().map(|child| child.render(redact)).collect())
            }
            TreeNode::Value(value) if redact => Value::String(value.display_value().to_string()),
            TreeNode::Value(value) => Value::String(value.value().to_string()),
        }
    }
}

/// Displays the redacted tree as YAML.
impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_yaml::to_string(&self.to_display_value()).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::tree::REDACTED;

    #[test]
    fn test_walk_pre_order_with_paths() {
        let tree = Format::Yaml
            .parse("a:\n  b: 1\n  c: [x, y]\nd: 2", "test")
            .unwrap();
        let paths: Vec<String> = tree.walk().map(|(path, _)| path).collect();
        assert_eq!(paths, vec!["a", "a.b", "a.c", "a.c.0", "a.c.1", "d"]);
    }

    #[test]
    fn test_walk_is_restartable() {
        let tree = Format::Yaml.parse("a: 1\nb: 2", "test").unwrap();
        assert_eq!(tree.walk().count(), 2);
        assert_eq!(tree.walk().count(), 2);
    }

    #[test]
    fn test_walk_escapes_dotted_keys() {
        let tree = Format::Json.parse(r#"{"sys": {"user.name": "bob"}}"#, "test").unwrap();
        let paths: Vec<String> = tree.walk().map(|(path, _)| path).collect();
        assert_eq!(paths, vec!["sys", "sys.user\\.name"]);
        assert_eq!(
            tree.get(&paths[1]).unwrap().and_then(TreeNode::as_str),
            Some("bob")
        );
    }

    #[test]
    fn test_display_redacts_hidden_values() {
        let mut tree = Format::Yaml.parse("db:\n  password: hunter2\n  user: app", "test").unwrap();
        tree.get_mut("db.password").unwrap().unwrap().hide();

        let shown = tree.to_string();
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains(REDACTED));
        assert!(shown.contains("app"));
        assert_eq!(tree.to_value()["db"]["password"], "hunter2");
    }
}
