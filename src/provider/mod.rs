//! Configuration sources.
//!
//! A provider produces a fresh tree on every [`ConfigProvider::provide`] call.
//! Trees returned to callers are never shared with the provider, so callers
//! may transform them in place.
//!
//! ## Standard providers
//! - [`ResourceProvider`] - YAML/JSON files under `conftree/` in each resource root
//! - [`EnvironmentProvider`] - environment variables under `env.*`
//! - [`SystemPropertiesProvider`] - system properties under `sys.*`
//! - [`MapProvider`] - programmatic, mutable in-memory tree
//! - [`PrioritizedProvider`] - named composite merged by priority

mod env;
mod in_memory;
mod prioritized;
mod resource;
mod system;

pub use env::{ENV_ROOT, EnvironmentProvider};
pub use in_memory::MapProvider;
pub use prioritized::{PrioritizedProvider, ProviderInfo};
pub use resource::{RESOURCE_DIR, ResourceKind, ResourceProvider};
pub use system::{SYS_ROOT, SystemPropertiesProvider};

use crate::error::ConfigResult;
use crate::tree::MapNode;
use std::fmt;

/// A source of configuration.
pub trait ConfigProvider: Send + Sync + fmt::Debug {
    /// Produce a fresh tree. Clears the provider's dirty state.
    fn provide(&self) -> ConfigResult<MapNode>;

    /// Whether the content may have changed since the last `provide()`.
    fn is_dirty(&self) -> bool {
        false
    }

    /// Deep, independent copy of this provider.
    fn fork(&self) -> Box<dyn ConfigProvider>;
}
