//! Tree-transforming passes applied after providers are merged.
//!
//! The standard pipeline runs, in order:
//! 1. [`RemovalProcessor`] - `-key` tombstones delete `key`
//! 2. [`ProfileProcessor`] - `key<p1,p2>` kept as `key` only if a profile is active
//! 3. [`SystemPropertiesProcessor`] - `conftree.config.*` properties overlay the tree
//! 4. [`SecureProcessor`] - secret-looking keys are hidden from display
//! 5. [`EmbeddedProcessor`] - `key|json` / `key|yaml` strings are parsed into subtrees
//! 6. [`EvaluationProcessor`] - `${function(args)}` and `${path}` expressions are evaluated
//!
//! Every processor is idempotent: running it again on its own output changes
//! nothing.

mod embedded;
mod evaluate;
mod profile;
mod removal;
mod secure;
mod system;

pub use embedded::{EMBEDDED_ERROR_PREFIX, EmbeddedProcessor};
pub use evaluate::EvaluationProcessor;
pub use profile::ProfileProcessor;
pub use removal::RemovalProcessor;
pub use secure::SecureProcessor;
pub use system::SystemPropertiesProcessor;

use crate::error::ConfigResult;
use crate::function::FunctionRegistry;
use crate::tree::MapNode;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A pass over the merged configuration tree.
pub trait ConfigProcessor: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Transform the tree in place.
    fn process(&self, root: &mut MapNode) -> ConfigResult<()>;
}

/// Ordered list of processors.
#[derive(Debug, Default)]
pub struct Pipeline {
    processors: Vec<Box<dyn ConfigProcessor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard processors in their documented order.
    pub fn standard(functions: Arc<FunctionRegistry>) -> Self {
        Self::new()
            .with(RemovalProcessor)
            .with(ProfileProcessor::from_tree())
            .with(SystemPropertiesProcessor)
            .with(SecureProcessor::default())
            .with(EmbeddedProcessor::default())
            .with(EvaluationProcessor::new(functions))
    }

    /// Append a processor.
    pub fn with(mut self, processor: impl ConfigProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Replace the processor with the same name, keeping its position.
    pub fn replace(mut self, processor: impl ConfigProcessor + 'static) -> Self {
        match self
            .processors
            .iter()
            .position(|p| p.name() == processor.name())
        {
            Some(i) => self.processors[i] = Box::new(processor),
            None => self.processors.push(Box::new(processor)),
        }
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Run every processor in order.
    pub fn run(&self, root: &mut MapNode) -> ConfigResult<()> {
        for processor in &self.processors {
            debug!(processor = processor.name(), "Running configuration processor");
            processor.process(root)?;
        }
        Ok(())
    }
}

/// Apply `f` to `map` and every map nested below it (through arrays too).
pub(crate) fn visit_maps(
    map: &mut MapNode,
    f: &mut impl FnMut(&mut MapNode) -> ConfigResult<()>,
) -> ConfigResult<()> {
    f(map)?;
    for (_, child) in map.iter_mut() {
        visit_node(child, f)?;
    }
    Ok(())
}

fn visit_node(
    node: &mut crate::tree::TreeNode,
    f: &mut impl FnMut(&mut MapNode) -> ConfigResult<()>,
) -> ConfigResult<()> {
    use crate::tree::TreeNode;
    match node {
        TreeNode::Map(map) => visit_maps(map, f),
        TreeNode::Array(array) => {
            for item in array.iter_mut() {
                visit_node(item, f)?;
            }
            Ok(())
        }
        TreeNode::Value(_) => Ok(()),
    }
}
