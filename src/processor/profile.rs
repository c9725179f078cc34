//! Profile-qualified keys (`key<dev,prod>`).

use super::{ConfigProcessor, visit_maps};
use crate::error::ConfigResult;
use crate::properties::{PROFILES_ENV, PROFILES_PROPERTY, split_list};
use crate::provider::{ENV_ROOT, SYS_ROOT};
use crate::tree::{MapNode, TreeNode};
use tracing::debug;

/// Where the active profiles come from.
#[derive(Debug, Clone)]
enum ProfileSource {
    /// `sys.conftree.profiles`, falling back to `env.CONFTREE_PROFILES`.
    Tree,
    /// A fixed list.
    Fixed(Vec<String>),
}

/// Keeps profile-qualified keys whose profiles are active.
///
/// A key `name<p1,p2>` is dropped when none of its profiles are active.
/// Otherwise it is merged onto `name`, overriding the unqualified value.
/// Several active variants of the same key apply in declaration order, so
/// the last one wins on conflicts.
#[derive(Debug, Clone)]
pub struct ProfileProcessor {
    source: ProfileSource,
}

impl ProfileProcessor {
    /// Read the active profiles from the merged tree.
    pub fn from_tree() -> Self {
        Self {
            source: ProfileSource::Tree,
        }
    }

    /// Use a fixed set of active profiles.
    pub fn with_profiles<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: ProfileSource::Fixed(profiles.into_iter().map(Into::into).collect()),
        }
    }

    /// Active profiles for this tree.
    pub fn active_profiles(&self, root: &MapNode) -> Vec<String> {
        match &self.source {
            ProfileSource::Fixed(profiles) => profiles.clone(),
            ProfileSource::Tree => {
                let lookup = |subtree: &str, key: &str| {
                    root.get(subtree)
                        .and_then(TreeNode::as_map)
                        .and_then(|m| m.get(key))
                        .and_then(TreeNode::as_str)
                        .map(str::to_string)
                };
                lookup(SYS_ROOT, PROFILES_PROPERTY)
                    .or_else(|| lookup(ENV_ROOT, PROFILES_ENV))
                    .map(|raw| split_list(&raw))
                    .unwrap_or_default()
            }
        }
    }
}

/// Split `name<p1,p2>` into `("name", ["p1", "p2"])`.
pub(crate) fn parse_qualified_key(key: &str) -> Option<(&str, Vec<String>)> {
    let inner = key.strip_suffix('>')?;
    let open = inner.rfind('<')?;
    let base = &inner[..open];
    if base.is_empty() {
        return None;
    }
    Some((base, split_list(&inner[open + 1..])))
}

impl ConfigProcessor for ProfileProcessor {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn process(&self, root: &mut MapNode) -> ConfigResult<()> {
        let active = self.active_profiles(root);
        debug!(profiles = ?active, "Applying configuration profiles");

        visit_maps(root, &mut |map| {
            let qualified: Vec<String> = map
                .keys()
                .filter(|k| parse_qualified_key(k).is_some())
                .map(str::to_string)
                .collect();

            for key in qualified {
                let Some(node) = map.remove(&key) else {
                    continue;
                };
                let Some((base, profiles)) = parse_qualified_key(&key) else {
                    continue;
                };
                if profiles.iter().any(|p| active.contains(p)) {
                    map.merge_entry(base, node);
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

    fn process(processor: &ProfileProcessor, yaml: &str) -> TreeNode {
        let TreeNode::Map(mut root) = Format::Yaml.parse(yaml, "test").unwrap() else {
            unreachable!()
        };
        processor.process(&mut root).unwrap();
        TreeNode::Map(root)
    }

    fn text(tree: &TreeNode, path: &str) -> Option<String> {
        tree.get(path).unwrap().and_then(TreeNode::as_str).map(str::to_string)
    }

    #[test]
    fn test_parse_qualified_key() {
        assert_eq!(
            parse_qualified_key("mode<dev, prod>"),
            Some(("mode", vec!["dev".to_string(), "prod".to_string()]))
        );
        assert_eq!(parse_qualified_key("mode"), None);
        assert_eq!(parse_qualified_key("<dev>"), None);
    }

    #[test]
    fn test_active_profile_selected() {
        let processor = ProfileProcessor::with_profiles(["dev", "debug"]);
        let tree = process(&processor, "mode<dev>: debug-on\nmode<prod>: debug-off");
        assert_eq!(text(&tree, "mode").as_deref(), Some("debug-on"));
        assert_eq!(tree.as_map().unwrap().len(), 1);
    }

    #[test]
    fn test_any_listed_profile_is_enough() {
        let processor = ProfileProcessor::with_profiles(["prod"]);
        let tree = process(&processor, "name<dev,prod>: shared");
        assert_eq!(text(&tree, "name").as_deref(), Some("shared"));
    }

    #[test]
    fn test_no_active_profiles_removes_all_qualified_keys() {
        let processor = ProfileProcessor::with_profiles(Vec::<String>::new());
        let tree = process(&processor, "a<dev>: 1\nb<prod>: 2\nc: 3");
        assert_eq!(tree.as_map().unwrap().keys().collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn test_qualified_overrides_unqualified_and_last_wins() {
        let processor = ProfileProcessor::with_profiles(["dev", "local"]);
        let tree = process(&processor, "url<local>: l\nurl: base\nurl<dev>: d");
        assert_eq!(text(&tree, "url").as_deref(), Some("d"));
    }

    #[test]
    fn test_qualified_map_merges_onto_base() {
        let processor = ProfileProcessor::with_profiles(["dev"]);
        let tree = process(
            &processor,
            "server:\n  host: prod.example\n  port: 443\nserver<dev>:\n  host: localhost",
        );
        assert_eq!(text(&tree, "server.host").as_deref(), Some("localhost"));
        assert_eq!(text(&tree, "server.port").as_deref(), Some("443"));
    }

    #[test]
    fn test_nested_qualified_keys() {
        let processor = ProfileProcessor::with_profiles(["dev"]);
        let tree = process(&processor, "db:\n  pool<dev>: 2\n  pool<prod>: 50");
        assert_eq!(text(&tree, "db.pool").as_deref(), Some("2"));
    }

    #[test]
    fn test_profiles_read_from_tree() {
        let processor = ProfileProcessor::from_tree();
        let tree = process(
            &processor,
            "sys:\n  conftree.profiles: 'qa'\nenv:\n  CONFTREE_PROFILES: dev\nx<qa>: from-sys\ny<dev>: from-env",
        );
        assert_eq!(text(&tree, "x").as_deref(), Some("from-sys"));
        assert_eq!(text(&tree, "y"), None);

        let tree = process(&processor, "env:\n  CONFTREE_PROFILES: dev\ny<dev>: from-env");
        assert_eq!(text(&tree, "y").as_deref(), Some("from-env"));
    }
}
