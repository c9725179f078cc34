//! Configuration facade.
//!
//! [`Config`] owns the provider registry, the processor pipeline and the
//! function registry, and serves typed reads from the resolved tree.
//!
//! ## Standard providers
//! | name           | priority | source                                |
//! |----------------|----------|---------------------------------------|
//! | `environment`  | -100     | environment variables under `env.*`   |
//! | `system`       | -100     | system properties under `sys.*`       |
//! | `resources`    | 0        | resource files                        |
//! | `overrides`    | 10       | `*.override.*` resource files         |
//! | `programmatic` | 100      | values set through [`Config::set`]    |

mod bootstrap;
mod watcher;

pub use bootstrap::{ConfigPaths, RESOURCE_PATH_ENV};
pub use watcher::{
    ResourceChangeEvent, ResourceWatcherHandle, WatcherConfig, start_resource_watcher,
};

use crate::error::{ConfigError, ConfigResult};
use crate::function::{ConfigFunction, FunctionRegistry, PortAllocator};
use crate::mapping::{ClassConfiguration, from_node, to_node};
use crate::processor::{EmbeddedProcessor, Pipeline, ProfileProcessor, SecureProcessor};
use crate::properties::{PROFILES_PROPERTY, SystemProperties};
use crate::provider::{
    ConfigProvider, EnvironmentProvider, MapProvider, PrioritizedProvider, ProviderInfo,
    ResourceKind, ResourceProvider, SystemPropertiesProvider,
};
use crate::tree::TreeNode;
use arc_swap::ArcSwap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub const ENVIRONMENT_PROVIDER: &str = "environment";
pub const SYSTEM_PROVIDER: &str = "system";
pub const RESOURCES_PROVIDER: &str = "resources";
pub const OVERRIDES_PROVIDER: &str = "overrides";
pub const PROGRAMMATIC_PROVIDER: &str = "programmatic";

pub const ENVIRONMENT_PRIORITY: i32 = -100;
pub const SYSTEM_PRIORITY: i32 = -100;
pub const RESOURCES_PRIORITY: i32 = 0;
pub const OVERRIDES_PRIORITY: i32 = 10;
pub const PROGRAMMATIC_PRIORITY: i32 = 100;

/// Builder for [`Config`].
///
/// Anything not set explicitly is discovered from the process: the
/// environment snapshot, and the resource roots through [`ConfigPaths`].
#[derive(Default)]
pub struct ConfigBuilder {
    name: Option<String>,
    roots: Option<Vec<PathBuf>>,
    env: Option<BTreeMap<String, String>>,
    properties: Option<SystemProperties>,
    profiles: Option<Vec<String>>,
    secret_patterns: Vec<String>,
    functions: Vec<(String, Arc<dyn ConfigFunction>)>,
    ports: Option<Arc<PortAllocator>>,
    fail_fast: bool,
}

impl ConfigBuilder {
    /// Application name reported in diagnostics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Resource roots, lowest priority first.
    pub fn roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.roots = Some(roots);
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.get_or_insert_with(Vec::new).push(root.into());
        self
    }

    /// Use this environment instead of the process environment.
    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn properties(mut self, properties: SystemProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Active profiles, stored as the `conftree.profiles` property.
    pub fn profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.profiles = Some(profiles.into_iter().map(Into::into).collect());
        self
    }

    /// Also hide values whose key matches this regular expression.
    pub fn secret_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.secret_patterns.push(pattern.into());
        self
    }

    /// Register an additional `${name(...)}` function.
    pub fn function(mut self, name: impl Into<String>, function: impl ConfigFunction + 'static) -> Self {
        self.functions.push((name.into(), Arc::new(function)));
        self
    }

    /// Share a port allocator, e.g. between independently built configs.
    pub fn ports(mut self, ports: Arc<PortAllocator>) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Fail on unreadable resources instead of skipping them.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Assemble and resolve the configuration.
    pub fn build(self) -> ConfigResult<Config> {
        let env = self
            .env
            .unwrap_or_else(|| EnvironmentProvider::from_process().vars().clone());
        let roots = self
            .roots
            .unwrap_or_else(|| ConfigPaths::from_env(&env).roots);
        let properties = self.properties.unwrap_or_default();
        if let Some(profiles) = self.profiles {
            properties.set(PROFILES_PROPERTY, profiles.join(","));
        }

        let ports = self.ports.unwrap_or_default();
        let mut functions = FunctionRegistry::standard(ports, env.clone());
        for (name, function) in self.functions {
            functions.register_shared(name, function)?;
        }
        let functions = Arc::new(functions);

        let mut secure = SecureProcessor::default();
        for pattern in &self.secret_patterns {
            secure = secure.with_pattern(pattern)?;
        }
        let pipeline = Pipeline::standard(Arc::clone(&functions))
            .replace(EmbeddedProcessor::new(secure.clone()))
            .replace(secure);

        let providers = PrioritizedProvider::new();
        providers.register(
            ENVIRONMENT_PROVIDER,
            Box::new(EnvironmentProvider::with_vars(env)),
            ENVIRONMENT_PRIORITY,
        )?;
        providers.register(
            SYSTEM_PROVIDER,
            Box::new(SystemPropertiesProvider::new(properties.clone())),
            SYSTEM_PRIORITY,
        )?;
        let mut resource_flags = Vec::new();
        for (name, kind, priority) in [
            (RESOURCES_PROVIDER, ResourceKind::Regular, RESOURCES_PRIORITY),
            (OVERRIDES_PROVIDER, ResourceKind::Override, OVERRIDES_PRIORITY),
        ] {
            let provider = ResourceProvider::new(roots.clone(), kind).fail_fast(self.fail_fast);
            resource_flags.push(provider.dirty_flag());
            providers.register(name, Box::new(provider), priority)?;
        }
        let programmatic = MapProvider::new();
        providers.register(
            PROGRAMMATIC_PROVIDER,
            Box::new(programmatic.clone()),
            PROGRAMMATIC_PRIORITY,
        )?;

        let config = Config {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name.unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
            providers,
            pipeline: Arc::new(pipeline),
            functions,
            properties,
            programmatic,
            roots,
            fail_fast: self.fail_fast,
            resource_flags,
            tree: ArcSwap::from_pointee(TreeNode::default()),
            refresh_lock: Mutex::new(()),
        };
        config.resolve()?;
        info!(
            id = %config.id,
            roots = ?config.roots,
            profiles = ?config.profiles(),
            "Configuration initialized"
        );
        Ok(config)
    }
}

/// Resolved, typed configuration.
///
/// Reads are lock-free. Every read first checks whether any provider
/// reported a change and, if so, re-resolves the tree.
#[derive(Debug)]
pub struct Config {
    id: String,
    name: String,
    providers: PrioritizedProvider,
    pipeline: Arc<Pipeline>,
    functions: Arc<FunctionRegistry>,
    properties: SystemProperties,
    programmatic: MapProvider,
    roots: Vec<PathBuf>,
    fail_fast: bool,
    resource_flags: Vec<Arc<AtomicBool>>,
    tree: ArcSwap<TreeNode>,
    refresh_lock: Mutex<()>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Build with everything discovered from the process.
    pub fn load() -> ConfigResult<Self> {
        Self::builder().build()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Shared system property store; changes are picked up on next read.
    pub fn properties(&self) -> &SystemProperties {
        &self.properties
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// The resolved tree, refreshed first if needed.
    pub fn tree(&self) -> ConfigResult<Arc<TreeNode>> {
        self.refresh()?;
        Ok(self.tree.load_full())
    }

    /// Node at `path`, `None` if absent.
    pub fn node(&self, path: &str) -> ConfigResult<Option<TreeNode>> {
        Ok(self.tree()?.get(path)?.cloned())
    }

    /// Value at `path`, or `T::default()` when absent.
    pub fn get<T: DeserializeOwned + Default>(&self, path: &str) -> ConfigResult<T> {
        Ok(self.get_optional(path)?.unwrap_or_default())
    }

    /// Value at `path`, `None` when absent.
    pub fn get_optional<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<Option<T>> {
        let tree = self.tree()?;
        match tree.get(path)? {
            Some(node) => from_node(node, path).map(Some),
            None => Ok(None),
        }
    }

    /// Value at `path`; absence is an error. A present empty string is
    /// returned as is.
    pub fn get_mandatory<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<T> {
        self.get_optional(path)?
            .ok_or_else(|| ConfigError::not_found(path))
    }

    /// Properties of a dotted component name, see [`ClassConfiguration`].
    pub fn class_configuration(&self, name: &str) -> ConfigResult<ClassConfiguration> {
        Ok(ClassConfiguration::resolve(&*self.tree()?, name))
    }

    /// Active profiles of the resolved tree.
    pub fn profiles(&self) -> Vec<String> {
        let tree = self.tree.load();
        tree.as_map()
            .map(|root| ProfileProcessor::from_tree().active_profiles(root))
            .unwrap_or_default()
    }

    /// Set a programmatic value at `path`, overriding every standard source.
    pub fn set<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> ConfigResult<()> {
        self.programmatic.set(path, to_node(value)?)
    }

    /// Remove a programmatic value. Values from other sources are unaffected.
    pub fn unset(&self, path: &str) -> ConfigResult<()> {
        self.programmatic.remove(path).map(|_| ())
    }

    pub fn register_provider(
        &self,
        name: impl Into<String>,
        provider: impl ConfigProvider + 'static,
        priority: i32,
    ) -> ConfigResult<()> {
        self.providers.register(name, Box::new(provider), priority)
    }

    pub fn unregister_provider(&self, name: &str) -> ConfigResult<()> {
        self.providers.unregister(name).map(|_| ())
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.providers.providers()
    }

    /// Re-resolve if any provider changed. Returns whether it did.
    pub fn refresh(&self) -> ConfigResult<bool> {
        if !self.providers.is_dirty() {
            return Ok(false);
        }
        let _guard = self.refresh_lock.lock().unwrap_or_else(|p| p.into_inner());
        if !self.providers.is_dirty() {
            return Ok(false);
        }
        debug!(id = %self.id, "Configuration changed, re-resolving");
        self.resolve()?;
        Ok(true)
    }

    fn resolve(&self) -> ConfigResult<()> {
        let resolved = self.providers.provide().and_then(|mut root| {
            self.pipeline.run(&mut root)?;
            Ok(root)
        });
        match resolved {
            Ok(root) => {
                self.tree.store(Arc::new(TreeNode::Map(root)));
                Ok(())
            }
            Err(e) => {
                // Keep the last good tree and retry on the next read.
                self.providers.mark_dirty();
                warn!(id = %self.id, error = %e, "Configuration resolution failed");
                Err(e)
            }
        }
    }

    /// Independent copy: changes to the fork's providers, properties or
    /// programmatic values never reach `self`, and vice versa. Functions
    /// (and so allocated ports) are shared.
    pub fn fork(&self) -> ConfigResult<Config> {
        let providers = self.providers.fork_prioritized();
        let properties = self.properties.fork();
        let programmatic = self.programmatic.detached();

        if providers.is_registered(SYSTEM_PROVIDER) {
            providers.replace(
                SYSTEM_PROVIDER,
                Box::new(SystemPropertiesProvider::new(properties.clone())),
            )?;
        }
        if providers.is_registered(PROGRAMMATIC_PROVIDER) {
            providers.replace(PROGRAMMATIC_PROVIDER, Box::new(programmatic.clone()))?;
        }
        let mut resource_flags = Vec::new();
        for (name, kind) in [
            (RESOURCES_PROVIDER, ResourceKind::Regular),
            (OVERRIDES_PROVIDER, ResourceKind::Override),
        ] {
            if providers.is_registered(name) {
                let provider =
                    ResourceProvider::new(self.roots.clone(), kind).fail_fast(self.fail_fast);
                resource_flags.push(provider.dirty_flag());
                providers.replace(name, Box::new(provider))?;
            }
        }

        let fork = Config {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name.clone(),
            providers,
            pipeline: Arc::clone(&self.pipeline),
            functions: Arc::clone(&self.functions),
            properties,
            programmatic,
            roots: self.roots.clone(),
            fail_fast: self.fail_fast,
            resource_flags,
            tree: ArcSwap::new(self.tree.load_full()),
            refresh_lock: Mutex::new(()),
        };
        fork.resolve()?;
        debug!(parent = %self.id, id = %fork.id, "Forked configuration");
        Ok(fork)
    }

    /// Watch the resource roots; changes are applied on the next read.
    pub fn watch(&self, config: WatcherConfig) -> Result<ResourceWatcherHandle, notify::Error> {
        start_resource_watcher(&self.roots, self.resource_flags.clone(), config)
    }

    /// Snapshot for diagnostic collectors: id, name, version, active profiles
    /// and the redacted tree.
    pub fn diagnostics(&self) -> ConfigResult<BTreeMap<String, Value>> {
        let tree = self.tree()?;
        Ok(BTreeMap::from([
            ("id".to_string(), Value::from(self.id.clone())),
            ("name".to_string(), Value::from(self.name.clone())),
            ("version".to_string(), Value::from(env!("CARGO_PKG_VERSION"))),
            ("profiles".to_string(), Value::from(self.profiles())),
            ("configuration".to_string(), tree.to_display_value()),
        ]))
    }
}

impl fmt::Display for Config {
    /// Redacted YAML of the last resolved tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree.load_full())
    }
}
