//! Process-level property store.
//!
//! Properties are flat `key=value` pairs (keys usually dotted, such as
//! `conftree.profiles`). They are supplied at bootstrap, typically from `-D`
//! command-line flags, and owned by whoever builds the configuration.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Property naming the comma-separated list of active profiles.
pub const PROFILES_PROPERTY: &str = "conftree.profiles";

/// Environment variable consulted when [`PROFILES_PROPERTY`] is not set.
pub const PROFILES_ENV: &str = "CONFTREE_PROFILES";

/// Prefix of properties copied into the configuration tree.
pub const CONFIG_PREFIX: &str = "conftree.config.";

/// Shared, thread-safe property store.
#[derive(Debug, Clone, Default)]
pub struct SystemProperties {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
    revision: Arc<AtomicU64>,
}

impl SystemProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` definitions. A bare `key` maps to an empty value.
    pub fn from_definitions<I, S>(definitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let properties = Self::new();
        for definition in definitions {
            let definition = definition.as_ref();
            match definition.split_once('=') {
                Some((key, value)) => properties.set(key.trim(), value),
                None => properties.set(definition.trim(), ""),
            }
        }
        properties
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.write().insert(key.into(), value.into());
        self.revision.fetch_add(1, Ordering::Release);
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        let removed = self.write().remove(key);
        if removed.is_some() {
            self.revision.fetch_add(1, Ordering::Release);
        }
        removed
    }

    /// Counter bumped on every modification.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Copy of all properties, sorted by key.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.read().clone()
    }

    /// Independent copy that does not share storage with `self`.
    pub fn fork(&self) -> Self {
        Self {
            inner: Arc::new(RwLock::new(self.snapshot())),
            revision: Arc::new(AtomicU64::new(self.revision())),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Active profiles: the `conftree.profiles` property, falling back to the
/// `CONFTREE_PROFILES` entry of `env`. Blank entries are ignored.
pub fn active_profiles(
    properties: &SystemProperties,
    env: &BTreeMap<String, String>,
) -> Vec<String> {
    let raw = properties
        .get(PROFILES_PROPERTY)
        .or_else(|| env.get(PROFILES_ENV).cloned())
        .unwrap_or_default();
    split_list(&raw)
}

/// Split a comma-separated list, trimming entries and dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
