//! Plugin resolution.
//!
//! Configuration names plugins by identifier. A [`PluginRegistry`] maps
//! identifiers to factories, and a [`PluginChain`] turns its ordered list of
//! identifiers into plugin instances exactly once.
//!
//! # Resolution rules
//!
//! - **All-or-nothing**: if any identifier fails, nothing is stored and the
//!   chain stays unresolved. A session never runs with a partial chain.
//! - **Idempotent**: once resolved, later calls return the same instances
//!   without calling any factory again.
//! - **Order-preserving**: instances are in configuration order, which is
//!   the order the dispatcher notifies them in.
//!
//! Sharing a chain between sessions is explicit: wrap it in an `Arc` and hand
//! the same chain to each session.

use crate::config::SiteConfig;
use crate::plugin::{Plugin, PluginError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Unknown plugin '{0}'")]
    UnknownPlugin(String),
    #[error("Plugin '{id}' failed to initialize: {source}")]
    Instantiate { id: String, source: PluginError },
}

/// Builds one plugin instance from the site configuration.
pub type PluginFactory =
    Box<dyn Fn(&SiteConfig) -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync>;

/// Identifier → factory table.
#[derive(Default)]
pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the stock plugins from [`crate::builtin`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register(&mut registry);
        registry
    }

    /// Register a factory, replacing any previous one under `id`.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&SiteConfig) -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup(id).is_some()
    }

    /// Exact match first, then the last `::` segment of a qualified
    /// identifier (`quire::builtin::log` → `log`).
    fn lookup(&self, id: &str) -> Option<&PluginFactory> {
        self.factories.get(id).or_else(|| {
            id.rsplit_once("::")
                .and_then(|(_, short)| self.factories.get(short))
        })
    }

    /// Instantiate the plugin registered under `id`.
    pub fn instantiate(
        &self,
        id: &str,
        config: &SiteConfig,
    ) -> Result<Arc<dyn Plugin>, ChainError> {
        let factory = self
            .lookup(id)
            .ok_or_else(|| ChainError::UnknownPlugin(id.to_string()))?;
        factory(config).map_err(|source| ChainError::Instantiate {
            id: id.to_string(),
            source,
        })
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("identifiers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An ordered list of plugin identifiers and, once resolved, their instances.
pub struct PluginChain {
    identifiers: Vec<String>,
    resolved: OnceLock<Vec<Arc<dyn Plugin>>>,
}

impl PluginChain {
    pub fn new(identifiers: Vec<String>) -> Self {
        Self {
            identifiers,
            resolved: OnceLock::new(),
        }
    }

    /// An unresolved chain over the site's configured plugins.
    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(config.plugins.clone())
    }

    /// A chain that is already resolved to the given instances.
    pub fn preloaded(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let identifiers = plugins.iter().map(|p| p.name().to_string()).collect();
        let resolved = OnceLock::new();
        let _ = resolved.set(plugins);
        Self {
            identifiers,
            resolved,
        }
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Resolved instances, or an empty slice before resolution.
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        self.resolved.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Resolve every identifier through `registry`.
    ///
    /// See the [module docs](self) for the resolution rules.
    pub fn resolve(
        &self,
        registry: &PluginRegistry,
        config: &SiteConfig,
    ) -> Result<&[Arc<dyn Plugin>], ChainError> {
        if let Some(plugins) = self.resolved.get() {
            return Ok(plugins);
        }

        let plugins = self
            .identifiers
            .iter()
            .map(|id| registry.instantiate(id, config))
            .collect::<Result<Vec<_>, _>>()?;

        info!(plugins = ?self.identifiers, "resolved plugin chain");
        // A concurrent resolve may have won the race; its instances are kept.
        let _ = self.resolved.set(plugins);
        Ok(self.plugins())
    }
}

impl fmt::Debug for PluginChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginChain")
            .field("identifiers", &self.identifiers)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
