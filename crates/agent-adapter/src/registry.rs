//! Name to adapter factory lookup

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapter::{Adapter, ProcessAdapter};
use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};
use crate::profile::AgentKind;

/// Builds an adapter from the shared configuration
pub type AdapterFactory = Arc<dyn Fn(Arc<AdapterConfig>) -> Arc<dyn Adapter> + Send + Sync>;

/// Explicit table of adapter constructors
///
/// Passed to whoever needs to resolve adapters by name; there is no global
/// instance.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: BTreeMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in agent under its canonical name
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in AgentKind::ALL {
            registry.register(kind.as_str(), move |config| {
                Arc::new(ProcessAdapter::for_kind(kind, config)) as Arc<dyn Adapter>
            });
        }
        registry
    }

    /// Register (or replace) a factory
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Arc<AdapterConfig>) -> Arc<dyn Adapter> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Create the adapter registered under `name`
    ///
    /// Falls back to the built-in aliases (`claude`, `gemini`, ...) when
    /// the exact name is not registered.
    pub fn create(&self, name: &str, config: Arc<AdapterConfig>) -> Result<Arc<dyn Adapter>> {
        if let Some(factory) = self.factories.get(name) {
            return Ok(factory(config));
        }
        let canonical = name
            .parse::<AgentKind>()
            .map_err(|_| AdapterError::unknown_agent(name))?;
        self.factories
            .get(canonical.as_str())
            .map(|factory| factory(config))
            .ok_or_else(|| AdapterError::unknown_agent(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("names", &self.names())
            .finish()
    }
}
