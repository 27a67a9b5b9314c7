//! The plugin extension point.
//!
//! A plugin implements any subset of the lifecycle hooks below; every hook
//! has a no-op default. Hooks take `&self` because a resolved chain is shared
//! between sessions and resource hooks may run on rayon worker threads.
//! Plugins that keep state use interior mutability (`Mutex`, atomics).
//!
//! ## Lifecycle
//!
//! ```text
//! template_loaded                once per session
//! begin_site                     once per session, first call only
//!   begin_generation             once per top-level call
//!     begin_node / node_complete once per node per session
//!     begin_text_resource        once per rendered text resource
//!     begin_binary_resource      once per copied binary resource
//! site_complete                  once per session, end of first successful call
//!   generation_complete          once per top-level call
//! ```
//!
//! The two resource hooks are content transforms: returning `Some(value)`
//! replaces the content handed to the next plugin and, ultimately, to the
//! renderer. Returning `None` passes the current content through.

use crate::tree::{ContentTree, Node, Resource};
use thiserror::Error;

/// Error raised by a plugin from inside a hook.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
}

impl PluginError {
    pub fn failed(message: impl Into<String>) -> Self {
        PluginError::Failed(message.into())
    }
}

pub type HookResult<T = ()> = Result<T, PluginError>;

pub trait Plugin: Send + Sync {
    /// Identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// The session's renderer is ready. `renderer` is its name.
    fn template_loaded(&self, _renderer: &str) -> HookResult {
        Ok(())
    }

    fn begin_site(&self, _tree: &ContentTree) -> HookResult {
        Ok(())
    }

    fn site_complete(&self, _tree: &ContentTree) -> HookResult {
        Ok(())
    }

    fn begin_generation(&self) -> HookResult {
        Ok(())
    }

    fn generation_complete(&self) -> HookResult {
        Ok(())
    }

    fn begin_node(&self, _node: &Node) -> HookResult {
        Ok(())
    }

    /// `meta` is the node's effective metadata after inheritance.
    fn node_complete(&self, _node: &Node, _meta: &toml::Table) -> HookResult {
        Ok(())
    }

    fn begin_text_resource(&self, _resource: &Resource, _text: &str) -> HookResult<Option<String>> {
        Ok(None)
    }

    fn begin_binary_resource(
        &self,
        _resource: &Resource,
        _bytes: &[u8],
    ) -> HookResult<Option<Vec<u8>>> {
        Ok(None)
    }
}
