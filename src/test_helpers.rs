//! Shared test utilities for the quire test suite.
//!
//! Provides a scenario site writer, a resource constructor for renderer and
//! plugin tests, and a [`RecordingPlugin`] that logs every hook it receives.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let content = write_scenario_site(tmp.path());
//! let tree = ContentTree::load(&content).unwrap();
//!
//! let recorder = RecordingPlugin::new("recorder");
//! // ... run a session with `recorder` in its chain ...
//! assert_eq!(recorder.count(Hook::BeginNode), 3);
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::dispatch::Hook;
use crate::plugin::{HookResult, Plugin, PluginError};
use crate::source::ResourceKind;
use crate::tree::{ContentTree, Node, NodeId, Resource, ResourceId};

// =========================================================================
// Fixture setup
// =========================================================================

/// Write the lifecycle scenario under `root/content` and return that path.
///
/// ```text
/// content/
/// ├── meta.toml       title = "Scenario", description = "Lifecycle fixture"
/// ├── about.html      (trailing whitespace on purpose)
/// ├── favicon.ico     binary
/// ├── index.html
/// └── a/
///     ├── meta.toml   title = "Section A"
///     ├── logo.png    binary
///     ├── notes.txt
///     ├── page.md
///     └── b/
///         └── deep.html
/// ```
///
/// Three nodes, five text resources, two binary resources.
pub fn write_scenario_site(root: &Path) -> PathBuf {
    let content = root.join("content");
    fs::create_dir_all(content.join("a/b")).unwrap();

    fs::write(
        content.join("meta.toml"),
        "title = \"Scenario\"\ndescription = \"Lifecycle fixture\"\n",
    )
    .unwrap();
    fs::write(content.join("index.html"), "<h1>Home</h1>\n").unwrap();
    fs::write(content.join("about.html"), "<p>About</p>   \n").unwrap();
    fs::write(content.join("favicon.ico"), [0u8, 0, 1, 0, 1, 0, 16, 16]).unwrap();

    fs::write(content.join("a/meta.toml"), "title = \"Section A\"\n").unwrap();
    fs::write(content.join("a/page.md"), "# Page\n\nSome text.\n").unwrap();
    fs::write(content.join("a/notes.txt"), "plain notes\n").unwrap();
    fs::write(
        content.join("a/logo.png"),
        [0x89u8, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D],
    )
    .unwrap();

    fs::write(content.join("a/b/deep.html"), "<p>deep</p>\n").unwrap();
    content
}

/// A free-standing resource at `path`, owned by node 0.
pub fn resource(path: &str, kind: ResourceKind) -> Resource {
    Resource {
        id: ResourceId(0),
        path: PathBuf::from(path),
        source_path: PathBuf::from(path),
        kind,
        node: NodeId(0),
    }
}

// =========================================================================
// Recording plugin
// =========================================================================

/// Records every hook call as `(hook, subject)`.
///
/// The subject is the node or resource path, the renderer name for
/// `template_loaded`, and empty for site and generation hooks.
pub struct RecordingPlugin {
    name: String,
    events: Mutex<Vec<(Hook, String)>>,
    node_titles: Mutex<Vec<(String, Option<String>)>>,
    fail_once: Mutex<Option<Hook>>,
}

impl RecordingPlugin {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            events: Mutex::new(Vec::new()),
            node_titles: Mutex::new(Vec::new()),
            fail_once: Mutex::new(None),
        })
    }

    /// A recorder whose first call of `hook` fails after being recorded.
    pub fn failing_once(name: &str, hook: Hook) -> Arc<Self> {
        let plugin = Self::new(name);
        *plugin.fail_once.lock().unwrap() = Some(hook);
        plugin
    }

    fn record(&self, hook: Hook, subject: impl Into<String>) -> HookResult {
        self.events.lock().unwrap().push((hook, subject.into()));
        let mut fail = self.fail_once.lock().unwrap();
        if *fail == Some(hook) {
            *fail = None;
            return Err(PluginError::failed(format!("injected failure in {hook}")));
        }
        Ok(())
    }

    pub fn events(&self) -> Vec<(Hook, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, hook: Hook) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| *h == hook)
            .count()
    }

    /// Subjects of every call of `hook`, in call order.
    pub fn subjects(&self, hook: Hook) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| *h == hook)
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn snapshot_counts(&self) -> HashMap<Hook, usize> {
        let mut counts = HashMap::new();
        for (hook, _) in self.events.lock().unwrap().iter() {
            *counts.entry(*hook).or_insert(0) += 1;
        }
        counts
    }

    /// `(node path, effective title)` as seen by `node_complete`.
    pub fn node_titles(&self) -> Vec<(String, Option<String>)> {
        self.node_titles.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
        self.node_titles.lock().unwrap().clear();
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn template_loaded(&self, renderer: &str) -> HookResult {
        self.record(Hook::TemplateLoaded, renderer)
    }

    fn begin_site(&self, _tree: &ContentTree) -> HookResult {
        self.record(Hook::BeginSite, "")
    }

    fn site_complete(&self, _tree: &ContentTree) -> HookResult {
        self.record(Hook::SiteComplete, "")
    }

    fn begin_generation(&self) -> HookResult {
        self.record(Hook::BeginGeneration, "")
    }

    fn generation_complete(&self) -> HookResult {
        self.record(Hook::GenerationComplete, "")
    }

    fn begin_node(&self, node: &Node) -> HookResult {
        self.record(Hook::BeginNode, display(&node.path))
    }

    fn node_complete(&self, node: &Node, meta: &toml::Table) -> HookResult {
        let title = meta.get("title").and_then(|v| v.as_str()).map(str::to_string);
        self.node_titles
            .lock()
            .unwrap()
            .push((display(&node.path), title));
        self.record(Hook::NodeComplete, display(&node.path))
    }

    fn begin_text_resource(&self, resource: &Resource, _text: &str) -> HookResult<Option<String>> {
        self.record(Hook::BeginTextResource, display(&resource.path))?;
        Ok(None)
    }

    fn begin_binary_resource(
        &self,
        resource: &Resource,
        _bytes: &[u8],
    ) -> HookResult<Option<Vec<u8>>> {
        self.record(Hook::BeginBinaryResource, display(&resource.path))?;
        Ok(None)
    }
}
