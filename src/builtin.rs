//! Stock plugins shipped with quire.
//!
//! | Identifier | Plugin | Effect |
//! |------------|--------|--------|
//! | `log` | [`BuildLogPlugin`] | Traces every lifecycle event and summarizes the site at the end |
//! | `trim` | [`TrimPlugin`] | Strips trailing whitespace from every line of text resources |
//!
//! Both are also reachable by qualified identifier, e.g. `quire::builtin::log`.

use crate::chain::PluginRegistry;
use crate::plugin::{HookResult, Plugin};
use crate::tree::{ContentTree, Node, Resource};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Register every stock plugin.
pub fn register(registry: &mut PluginRegistry) {
    registry.register("log", |_| Ok(Arc::new(BuildLogPlugin::default()) as Arc<dyn Plugin>));
    registry.register("trim", |_| Ok(Arc::new(TrimPlugin) as Arc<dyn Plugin>));
}

// =============================================================================
// log
// =============================================================================

/// Emits a `tracing` event for each hook and counts what went by.
#[derive(Debug, Default)]
pub struct BuildLogPlugin {
    nodes: AtomicUsize,
    text: AtomicUsize,
    binary: AtomicUsize,
}

impl BuildLogPlugin {
    /// `(nodes, text resources, binary resources)` seen so far.
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.nodes.load(Ordering::Relaxed),
            self.text.load(Ordering::Relaxed),
            self.binary.load(Ordering::Relaxed),
        )
    }
}

impl Plugin for BuildLogPlugin {
    fn name(&self) -> &str {
        "log"
    }

    fn template_loaded(&self, renderer: &str) -> HookResult {
        debug!(renderer, "template loaded");
        Ok(())
    }

    fn begin_site(&self, tree: &ContentTree) -> HookResult {
        info!(
            root = %tree.root_dir().display(),
            nodes = tree.node_count(),
            resources = tree.resource_count(),
            "begin site"
        );
        Ok(())
    }

    fn site_complete(&self, tree: &ContentTree) -> HookResult {
        let (nodes, text, binary) = self.counts();
        info!(
            root = %tree.root_dir().display(),
            nodes,
            text,
            binary,
            "site complete"
        );
        Ok(())
    }

    fn begin_generation(&self) -> HookResult {
        debug!("begin generation");
        Ok(())
    }

    fn generation_complete(&self) -> HookResult {
        debug!("generation complete");
        Ok(())
    }

    fn begin_node(&self, node: &Node) -> HookResult {
        self.nodes.fetch_add(1, Ordering::Relaxed);
        debug!(node = %node.path.display(), "begin node");
        Ok(())
    }

    fn node_complete(&self, node: &Node, meta: &toml::Table) -> HookResult {
        debug!(node = %node.path.display(), meta_keys = meta.len(), "node complete");
        Ok(())
    }

    fn begin_text_resource(&self, resource: &Resource, text: &str) -> HookResult<Option<String>> {
        self.text.fetch_add(1, Ordering::Relaxed);
        debug!(resource = %resource.path.display(), len = text.len(), "text resource");
        Ok(None)
    }

    fn begin_binary_resource(
        &self,
        resource: &Resource,
        bytes: &[u8],
    ) -> HookResult<Option<Vec<u8>>> {
        self.binary.fetch_add(1, Ordering::Relaxed);
        debug!(resource = %resource.path.display(), len = bytes.len(), "binary resource");
        Ok(None)
    }
}

// =============================================================================
// trim
// =============================================================================

/// Removes trailing whitespace from each line of text content.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrimPlugin;

impl Plugin for TrimPlugin {
    fn name(&self) -> &str {
        "trim"
    }

    fn begin_text_resource(&self, _resource: &Resource, text: &str) -> HookResult<Option<String>> {
        let trimmed = trim_lines(text);
        // None keeps the running value without a copy
        Ok((trimmed != text).then_some(trimmed))
    }
}

fn trim_lines(text: &str) -> String {
    let mut out: String = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}
