//! `key|json` and `key|yaml` entries holding serialized content.

use super::{ConfigProcessor, SecureProcessor, visit_maps};
use crate::error::ConfigResult;
use crate::format::Format;
use crate::tree::{MapNode, TreeNode};
use tracing::{debug, warn};

/// Prefix of the inline marker left in place of unparsable content.
pub const EMBEDDED_ERROR_PREFIX: &str = "<invalid embedded content: ";

/// Parses string values of `|json`/`|yaml` keys into subtrees stored under
/// the key without its suffix.
///
/// Unparsable content becomes an inline error marker string instead of
/// failing the whole pipeline.
///
/// Secret detection already ran on the outer tree, so the parsed subtree is
/// checked again with the same rules before it is stored.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedProcessor {
    secure: SecureProcessor,
}

impl EmbeddedProcessor {
    /// Use `secure` to hide secrets found inside embedded content.
    pub fn new(secure: SecureProcessor) -> Self {
        Self { secure }
    }

    fn hide_secrets(&self, node: &mut TreeNode) -> ConfigResult<()> {
        match node {
            TreeNode::Map(map) => self.secure.hide_secrets(map),
            TreeNode::Array(items) => items.iter_mut().try_for_each(|item| self.hide_secrets(item)),
            TreeNode::Value(_) => Ok(()),
        }
    }
}

fn split_embedded_key(key: &str) -> Option<(&str, Format)> {
    let (base, suffix) = key.rsplit_once('|')?;
    if base.is_empty() {
        return None;
    }
    Some((base, Format::from_str(suffix)?))
}

impl ConfigProcessor for EmbeddedProcessor {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn process(&self, root: &mut MapNode) -> ConfigResult<()> {
        visit_maps(root, &mut |map| {
            let embedded: Vec<String> = map
                .keys()
                .filter(|k| split_embedded_key(k).is_some())
                .map(str::to_string)
                .collect();

            for key in embedded {
                let (Some(node), Some((base, format))) = (map.remove(&key), split_embedded_key(&key))
                else {
                    continue;
                };
                let replacement = match node {
                    TreeNode::Value(value) => {
                        let mut parsed = match format.parse(value.value(), &key) {
                            Ok(parsed) => parsed,
                            Err(e) => {
                                warn!(key = %key, error = %e, "Invalid embedded configuration");
                                TreeNode::value(format!("{}{}>", EMBEDDED_ERROR_PREFIX, e))
                            }
                        };
                        if value.is_hidden() {
                            parsed.hide();
                        } else {
                            self.hide_secrets(&mut parsed)?;
                        }
                        parsed
                    }
                    other => {
                        debug!(key = %key, "Embedded key already holds structured content, keeping it");
                        other
                    }
                };
                map.insert(base, replacement);
            }
            Ok(())
        })
    }
}
