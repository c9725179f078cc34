//! Functions callable from `${name(args)}` expressions.
//!
//! Functions are registered by name in a [`FunctionRegistry`] at bootstrap.
//! The standard set is:
//! - `randomUuid()` - random UUID v4
//! - `availableTcpPort(name)` / `availableUdpPort(name)` - a free local port,
//!   stable per name for the lifetime of the [`PortAllocator`]
//! - `decrypt(ciphertext)` - AES-256-GCM decryption with the master key
//! - `hostname()` - local host name

mod crypto;
mod port;

pub use crypto::{MASTER_KEY_ENV, MASTER_KEY_PATH_ENV, MasterKey, decrypt, encrypt};
pub use port::{PortAllocator, Protocol};

use crate::error::{ConfigError, ConfigResult};
use std::collections::{BTreeMap, btree_map::Entry};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// A named configuration function.
pub trait ConfigFunction: Send + Sync {
    /// Evaluate with already-resolved arguments.
    fn call(&self, args: &[String]) -> ConfigResult<String>;
}

impl<F> ConfigFunction for F
where
    F: Fn(&[String]) -> ConfigResult<String> + Send + Sync,
{
    fn call(&self, args: &[String]) -> ConfigResult<String> {
        self(args)
    }
}

/// Name to function mapping.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn ConfigFunction>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard functions.
    ///
    /// `env` supplies the master key variables for `decrypt` and the host
    /// name for `hostname`.
    pub fn standard(ports: Arc<PortAllocator>, env: BTreeMap<String, String>) -> Self {
        let mut registry = Self::new();
        let tcp = Arc::clone(&ports);
        let udp = ports;
        let master_key = Arc::new(LazyMasterKey {
            env: env.clone(),
            key: OnceLock::new(),
        });

        registry.insert("randomUuid", |args: &[String]| {
            expect_args("randomUuid", args, 0)?;
            Ok(uuid::Uuid::new_v4().to_string())
        });
        registry.insert("availableTcpPort", move |args: &[String]| {
            expect_args("availableTcpPort", args, 1)?;
            Ok(tcp.allocate(Protocol::Tcp, &args[0])?.to_string())
        });
        registry.insert("availableUdpPort", move |args: &[String]| {
            expect_args("availableUdpPort", args, 1)?;
            Ok(udp.allocate(Protocol::Udp, &args[0])?.to_string())
        });
        registry.insert("decrypt", move |args: &[String]| {
            expect_args("decrypt", args, 1)?;
            decrypt(master_key.get()?, &args[0])
        });
        registry.insert("hostname", move |args: &[String]| {
            expect_args("hostname", args, 0)?;
            Ok(env
                .get("HOSTNAME")
                .or_else(|| env.get("COMPUTERNAME"))
                .cloned()
                .unwrap_or_else(|| "localhost".to_string()))
        });
        registry
    }

    /// Register a function. Fails if the name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        function: impl ConfigFunction + 'static,
    ) -> ConfigResult<()> {
        self.register_shared(name.into(), Arc::new(function))
    }

    pub(crate) fn register_shared(
        &mut self,
        name: String,
        function: Arc<dyn ConfigFunction>,
    ) -> ConfigResult<()> {
        match self.functions.entry(name) {
            Entry::Occupied(entry) => Err(ConfigError::evaluation(
                entry.key().as_str(),
                "function already registered",
            )),
            Entry::Vacant(entry) => {
                debug!(function = %entry.key(), "Registered configuration function");
                entry.insert(function);
                Ok(())
            }
        }
    }

    fn insert(&mut self, name: &str, function: impl ConfigFunction + 'static) {
        self.functions.insert(name.to_string(), Arc::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    /// Call a function by name.
    pub fn call(&self, name: &str, args: &[String]) -> ConfigResult<String> {
        let function = self.functions.get(name).ok_or_else(|| {
            ConfigError::evaluation(format!("{}(...)", name), "unknown function")
        })?;
        function.call(args)
    }
}

fn expect_args(name: &str, args: &[String], expected: usize) -> ConfigResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ConfigError::evaluation(
            format!("{}({})", name, args.join(", ")),
            format!("expected {} argument(s), got {}", expected, args.len()),
        ))
    }
}

/// Master key loaded on first use, so configurations that never call
/// `decrypt` do not need one.
struct LazyMasterKey {
    env: BTreeMap<String, String>,
    key: OnceLock<MasterKey>,
}

impl LazyMasterKey {
    fn get(&self) -> ConfigResult<&MasterKey> {
        if let Some(key) = self.key.get() {
            return Ok(key);
        }
        let loaded = MasterKey::from_env(&self.env)?;
        Ok(self.key.get_or_init(|| loaded))
    }
}
