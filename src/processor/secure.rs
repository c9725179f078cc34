//! Hiding of secret-looking values.

use super::{ConfigProcessor, visit_maps};
use crate::error::{ConfigError, ConfigResult};
use crate::tree::MapNode;
use regex_lite::Regex;

/// Key fragments that mark a value as secret (matched case-insensitively).
pub const SECRET_KEY_FRAGMENTS: &[&str] = &["password", "passwd", "pwd", "secret"];

/// Hides every value whose key looks like it holds a secret.
///
/// Hidden values read normally through typed access; only diagnostic
/// rendering is redacted.
#[derive(Debug, Clone)]
pub struct SecureProcessor {
    fragments: Vec<String>,
    patterns: Vec<Regex>,
}

impl Default for SecureProcessor {
    fn default() -> Self {
        Self {
            fragments: SECRET_KEY_FRAGMENTS.iter().map(|s| s.to_string()).collect(),
            patterns: Vec::new(),
        }
    }
}

impl SecureProcessor {
    /// Also hide keys matching a regular expression.
    pub fn with_pattern(mut self, pattern: &str) -> ConfigResult<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| ConfigError::evaluation(pattern, format!("invalid secret key pattern: {}", e)))?;
        self.patterns.push(regex);
        Ok(self)
    }

    /// Whether a key names a secret.
    pub fn is_secret_key(&self, key: &str) -> bool {
        let lower = key.to_lowercase();
        self.fragments.iter().any(|f| lower.contains(f.as_str()))
            || self.patterns.iter().any(|p| p.is_match(key))
    }

    /// Hide secret-keyed entries of `root` and of every map below it.
    pub fn hide_secrets(&self, root: &mut MapNode) -> ConfigResult<()> {
        visit_maps(root, &mut |map| {
            for (key, child) in map.iter_mut() {
                if self.is_secret_key(key) {
                    child.hide();
                }
            }
            Ok(())
        })
    }
}

impl ConfigProcessor for SecureProcessor {
    fn name(&self) -> &'static str {
        "secure"
    }

    fn process(&self, root: &mut MapNode) -> ConfigResult<()> {
        self.hide_secrets(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::tree::{REDACTED, TreeNode};

    fn process(processor: &SecureProcessor, yaml: &str) -> TreeNode {
        let TreeNode::Map(mut root) = Format::Yaml.parse(yaml, "test").unwrap() else {
            unreachable!()
        };
        processor.process(&mut root).unwrap();
        TreeNode::Map(root)
    }

    #[test]
    fn test_secret_keys_are_case_insensitive() {
        let processor = SecureProcessor::default();
        for key in ["password", "DB_PASSWORD", "userPwd", "passwdFile", "clientSecret"] {
            assert!(processor.is_secret_key(key), "{key}");
        }
        assert!(!processor.is_secret_key("username"));
    }

    #[test]
    fn test_hidden_values_stay_readable() {
        let tree = process(
            &SecureProcessor::default(),
            "db:\n  user: app\n  password: hunter2\n",
        );
        assert_eq!(tree.get("db.password").unwrap().and_then(TreeNode::as_str), Some("hunter2"));
        let display = tree.to_display_value();
        assert_eq!(display["db"]["password"], REDACTED);
        assert_eq!(display["db"]["user"], "app");
    }

    #[test]
    fn test_secret_subtree_fully_hidden() {
        let tree = process(&SecureProcessor::default(), "secrets:\n  a: 1\n  b: [x, y]");
        assert!(!tree.to_string().contains(": 1"));
        assert!(!tree.to_string().contains("x"));
    }

    #[test]
    fn test_custom_pattern() {
        let processor = SecureProcessor::default().with_pattern("(?i)token$").unwrap();
        let tree = process(&processor, "apiToken: abc\ntokenizer: plain");
        let display = tree.to_display_value();
        assert_eq!(display["apiToken"], REDACTED);
        assert_eq!(display["tokenizer"], "plain");
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        assert!(SecureProcessor::default().with_pattern("(unclosed").is_err());
    }
}
