//! Generation sessions: the orchestrator behind every build.
//!
//! A [`GenerationSession`] binds a loaded [`ContentTree`] snapshot to a
//! plugin chain, a renderer and an output sink, and remembers what it has
//! already announced to plugins. Callers issue top-level calls against it:
//!
//! | Call | Node hooks | Resources rendered |
//! |------|------------|--------------------|
//! | [`generate_all`](GenerationSession::generate_all) | whole tree | every resource |
//! | [`generate_resource_at_path`](GenerationSession::generate_resource_at_path) | whole tree | the one resource |
//! | [`generate_node_at_path`](GenerationSession::generate_node_at_path) | whole tree | resources directly under the node |
//!
//! ## One call, step by step
//!
//! ```text
//! resolve target path             unknown path → error, nothing fired
//! check output paths              two resources, one output → error
//! resolve plugin chain            first call only (lazy)
//! template_loaded                 first call only
//! begin_site                      first call only
//! begin_generation
//! node pass                       DFS; begin_node → metadata → node_complete
//!                                 for nodes not yet visited this session
//! render pass (rayon)             per resource: read → transform hook →
//!                                 freshness check → render → write
//! site_complete                   once, after the first successful call
//! generation_complete
//! ```
//!
//! The node pass always covers the whole tree, even for a single-resource
//! build: a node's effective metadata (its parent's merged with its own
//! `meta.toml`) may be needed by any resource below it. Visited nodes are
//! remembered for the lifetime of the session, so later partial builds skip
//! straight to rendering.
//!
//! ## Failures
//!
//! A plugin hook error aborts the call in progress. Everything recorded
//! before the failure stays recorded: a retried call never re-announces the
//! site or a node that plugins have already seen. Content hooks are not
//! deduplicated; a resource rendered twice is announced twice.
//!
//! ## Concurrency
//!
//! Entry points take `&mut self`, so one session serves one call at a time.
//! Within a call, resources are rendered in parallel once the node pass is
//! done; state updates are applied after the parallel join.

use crate::cache::{self, CacheManifest, CacheStats};
use crate::chain::{ChainError, PluginChain, PluginRegistry};
use crate::config::{self, SiteConfig};
use crate::dispatch::{Hook, HookError, notify, transform};
use crate::plugin::{Plugin, PluginError};
use crate::render::{LayoutRenderer, RenderError, Renderer};
use crate::sink::OutputSink;
use crate::source::{self, ResourceKind};
use crate::tree::{ContentTree, NodeId, Resource, ResourceId};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Failed to load plugins: {0}")]
    PluginLoad(#[from] ChainError),
    #[error("Resource not found: {0}")]
    ResourceNotFound(PathBuf),
    #[error("Node not found: {0}")]
    NodeNotFound(PathBuf),
    #[error("Plugin '{plugin}' failed in {hook}: {source}")]
    PluginHook {
        plugin: String,
        hook: Hook,
        source: PluginError,
    },
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("{path} is no longer valid UTF-8: {source}")]
    Decode {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },
    #[error("{first} and {second} both generate {output}")]
    OutputCollision {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Failed to save cache manifest: {0}")]
    Cache(io::Error),
}

impl From<HookError> for GenerateError {
    fn from(e: HookError) -> Self {
        GenerateError::PluginHook {
            plugin: e.plugin,
            hook: e.hook,
            source: e.source,
        }
    }
}

/// What a top-level call was asked to generate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Scope {
    #[default]
    All,
    Node(PathBuf),
    Resource(PathBuf),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => f.write_str("site"),
            Scope::Node(p) => write!(f, "node /{}", p.display()),
            Scope::Resource(p) => write!(f, "resource /{}", p.display()),
        }
    }
}

/// Outcome of one top-level call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub scope: Scope,
    /// Nodes that received their one-time node hooks during this call.
    pub nodes: usize,
    /// Output paths written, in tree order.
    pub written: Vec<PathBuf>,
    /// Output paths skipped because they were already fresh.
    pub fresh: Vec<PathBuf>,
}

impl GenerationReport {
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.fresh.len() as u32,
            misses: self.written.len() as u32,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    All,
    Node(NodeId),
    Resource(ResourceId),
}

/// Idempotence state. Only ever grows within a session.
#[derive(Debug, Default)]
struct SessionState {
    template_loaded: bool,
    site_started: bool,
    site_completed: bool,
    /// Nodes whose `begin_node` went through the whole chain.
    begun: HashSet<NodeId>,
    /// Nodes whose `node_complete` went through the whole chain.
    visited: HashSet<NodeId>,
    /// Effective (inherited + own) metadata per visited node.
    node_meta: HashMap<NodeId, toml::Table>,
}

enum Outcome {
    Written {
        output: PathBuf,
        source_hash: String,
        params_hash: String,
    },
    Fresh(PathBuf),
}

pub struct GenerationSession {
    tree: Arc<ContentTree>,
    config: SiteConfig,
    chain: Arc<PluginChain>,
    registry: Arc<PluginRegistry>,
    renderer: Arc<dyn Renderer>,
    sink: Arc<dyn OutputSink>,
    cache: CacheManifest,
    cache_path: Option<PathBuf>,
    state: SessionState,
}

impl GenerationSession {
    /// A session using the configured plugins, the stock registry and the
    /// stock [`LayoutRenderer`]. No freshness cache is persisted unless
    /// [`with_cache_file`](Self::with_cache_file) is used.
    pub fn new(tree: Arc<ContentTree>, config: SiteConfig, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            chain: Arc::new(PluginChain::from_config(&config)),
            registry: Arc::new(PluginRegistry::with_builtins()),
            renderer: Arc::new(LayoutRenderer::new(config.layout.clone())),
            tree,
            config,
            sink,
            cache: CacheManifest::empty(),
            cache_path: None,
            state: SessionState::default(),
        }
    }

    /// Use a chain shared with other sessions instead of the configured one.
    pub fn with_chain(mut self, chain: Arc<PluginChain>) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_registry(mut self, registry: Arc<PluginRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Load the freshness manifest from `path` and save it back there after
    /// every call that writes output.
    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.cache = CacheManifest::load(&path);
        self.cache_path = Some(path);
        self
    }

    pub fn tree(&self) -> &ContentTree {
        &self.tree
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn chain(&self) -> &Arc<PluginChain> {
        &self.chain
    }

    pub fn cache(&self) -> &CacheManifest {
        &self.cache
    }

    pub fn is_site_started(&self) -> bool {
        self.state.site_started
    }

    pub fn is_site_complete(&self) -> bool {
        self.state.site_completed
    }

    pub fn has_visited(&self, node: NodeId) -> bool {
        self.state.visited.contains(&node)
    }

    pub fn visited_count(&self) -> usize {
        self.state.visited.len()
    }

    /// Effective metadata of a node visited by this session.
    pub fn node_meta(&self, node: NodeId) -> Option<&toml::Table> {
        self.state.node_meta.get(&node)
    }

    /// Resolve the plugin chain now instead of on the first call.
    pub fn load_plugins(&self) -> Result<(), GenerateError> {
        self.chain.resolve(&self.registry, &self.config)?;
        Ok(())
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Generate every resource in the tree.
    pub fn generate_all(&mut self) -> Result<GenerationReport, GenerateError> {
        self.run(Target::All, Scope::All, false)
    }

    /// Generate the single resource at `path`.
    ///
    /// With `incremental`, the render and write are skipped when the cache
    /// says the output is fresh; the content hook fires either way.
    pub fn generate_resource_at_path(
        &mut self,
        path: &Path,
        incremental: bool,
    ) -> Result<GenerationReport, GenerateError> {
        let resource = self
            .tree
            .resource_at(path)
            .ok_or_else(|| GenerateError::ResourceNotFound(path.to_path_buf()))?;
        let target = Target::Resource(resource.id);
        let scope = Scope::Resource(resource.path.clone());
        self.run(target, scope, incremental)
    }

    /// Generate the resources directly under the node at `path`.
    pub fn generate_node_at_path(&mut self, path: &Path) -> Result<GenerationReport, GenerateError> {
        let node = self
            .tree
            .node_at(path)
            .ok_or_else(|| GenerateError::NodeNotFound(path.to_path_buf()))?;
        let target = Target::Node(node.id);
        let scope = Scope::Node(node.path.clone());
        self.run(target, scope, false)
    }

    // =========================================================================
    // Orchestration
    // =========================================================================

    fn run(
        &mut self,
        target: Target,
        scope: Scope,
        incremental: bool,
    ) -> Result<GenerationReport, GenerateError> {
        self.check_outputs()?;
        let chain = Arc::clone(&self.chain);
        let plugins = chain.resolve(&self.registry, &self.config)?;
        info!(%scope, incremental, "generation started");

        if !self.state.template_loaded {
            let renderer = self.renderer.name().to_string();
            notify(plugins, Hook::TemplateLoaded, |p| p.template_loaded(&renderer))?;
            self.state.template_loaded = true;
        }
        if !self.state.site_started {
            let tree = Arc::clone(&self.tree);
            notify(plugins, Hook::BeginSite, |p| p.begin_site(&tree))?;
            self.state.site_started = true;
        }
        notify(plugins, Hook::BeginGeneration, |p| p.begin_generation())?;

        let mut report = GenerationReport {
            scope,
            ..Default::default()
        };
        report.nodes = self.node_pass(plugins)?;

        let selected = self.select(target);
        self.render_pass(plugins, &selected, incremental, &mut report)?;

        if !self.state.site_completed {
            let tree = Arc::clone(&self.tree);
            notify(plugins, Hook::SiteComplete, |p| p.site_complete(&tree))?;
            self.state.site_completed = true;
        }
        notify(plugins, Hook::GenerationComplete, |p| p.generation_complete())?;

        info!(
            scope = %report.scope,
            nodes = report.nodes,
            written = report.written.len(),
            fresh = report.fresh.len(),
            "generation finished"
        );
        Ok(report)
    }

    /// Announce every node this session has not finished yet, parents first.
    /// Returns how many nodes were finished by this pass.
    fn node_pass(&mut self, plugins: &[Arc<dyn Plugin>]) -> Result<usize, GenerateError> {
        let tree = Arc::clone(&self.tree);
        let no_meta = toml::Table::new();
        let mut finished = 0;

        for id in tree.walk() {
            if self.state.visited.contains(&id) {
                continue;
            }
            let node = tree.node(id);

            if !self.state.begun.contains(&id) {
                notify(plugins, Hook::BeginNode, |p| p.begin_node(node))?;
                self.state.begun.insert(id);
            }

            let inherited = node
                .parent
                .and_then(|parent| self.state.node_meta.get(&parent))
                .unwrap_or(&no_meta);
            let meta = config::merge_meta(inherited, node.meta.as_ref());

            notify(plugins, Hook::NodeComplete, |p| p.node_complete(node, &meta))?;
            debug!(node = %node.path.display(), "node complete");
            self.state.node_meta.insert(id, meta);
            self.state.visited.insert(id);
            finished += 1;
        }
        Ok(finished)
    }

    /// Fail if two resources would be written to the same output path.
    fn check_outputs(&self) -> Result<(), GenerateError> {
        let mut owners: HashMap<PathBuf, &Path> = HashMap::new();
        for resource in self.tree.resources() {
            let output = self.renderer.output_path(resource);
            if let Some(first) = owners.get(&output) {
                return Err(GenerateError::OutputCollision {
                    output,
                    first: first.to_path_buf(),
                    second: resource.path.clone(),
                });
            }
            owners.insert(output, &resource.path);
        }
        Ok(())
    }

    fn select(&self, target: Target) -> Vec<ResourceId> {
        match target {
            Target::All => self
                .tree
                .walk()
                .into_iter()
                .flat_map(|id| self.tree.node(id).resources.iter().copied())
                .collect(),
            Target::Node(id) => self.tree.node(id).resources.clone(),
            Target::Resource(id) => vec![id],
        }
    }

    /// Render the selected resources in parallel, then record the results.
    ///
    /// Successful renders are recorded in the cache even when another
    /// resource failed; the first failure in tree order is returned.
    fn render_pass(
        &mut self,
        plugins: &[Arc<dyn Plugin>],
        selected: &[ResourceId],
        incremental: bool,
        report: &mut GenerationReport,
    ) -> Result<(), GenerateError> {
        let this = &*self;
        let outcomes: Vec<Result<Outcome, GenerateError>> = selected
            .par_iter()
            .map(|&id| this.produce(plugins, this.tree.resource(id), incremental))
            .collect();

        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(Outcome::Written {
                    output,
                    source_hash,
                    params_hash,
                }) => {
                    self.cache.insert(&output, source_hash, params_hash);
                    report.written.push(output);
                }
                Ok(Outcome::Fresh(output)) => report.fresh.push(output),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if !report.written.is_empty() {
            self.save_cache()?;
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Produce one resource: content hook, freshness check, render, write.
    fn produce(
        &self,
        plugins: &[Arc<dyn Plugin>],
        resource: &Resource,
        incremental: bool,
    ) -> Result<Outcome, GenerateError> {
        let bytes = source::read_bytes(&resource.source_path).map_err(|source| {
            GenerateError::Read {
                path: resource.source_path.clone(),
                source,
            }
        })?;

        let no_meta = toml::Table::new();
        let meta = self.state.node_meta.get(&resource.node).unwrap_or(&no_meta);
        let output = self.renderer.output_path(resource);
        let source_hash = cache::hash_bytes(&bytes);
        let params_hash =
            cache::hash_render_params(self.renderer.name(), self.chain.identifiers(), meta);
        let fresh = || {
            incremental
                && self
                    .cache
                    .is_fresh(&output, &source_hash, &params_hash, self.sink.as_ref())
        };

        let content = match resource.kind {
            ResourceKind::Text => {
                let text =
                    String::from_utf8(bytes).map_err(|source| GenerateError::Decode {
                        path: resource.source_path.clone(),
                        source,
                    })?;
                let text = transform(plugins, Hook::BeginTextResource, text, |p, t| {
                    p.begin_text_resource(resource, t)
                })?;
                if fresh() {
                    debug!(resource = %resource.path.display(), "fresh, skipping render");
                    return Ok(Outcome::Fresh(output));
                }
                self.renderer.render_text(resource, &text, meta)?.into_bytes()
            }
            ResourceKind::Binary => {
                let copied = transform(plugins, Hook::BeginBinaryResource, bytes, |p, b| {
                    p.begin_binary_resource(resource, b)
                })?;
                if fresh() {
                    debug!(resource = %resource.path.display(), "fresh, skipping copy");
                    return Ok(Outcome::Fresh(output));
                }
                copied
            }
        };

        self.sink
            .write(&output, &content)
            .map_err(|source| GenerateError::Write {
                path: output.clone(),
                source,
            })?;
        debug!(resource = %resource.path.display(), output = %output.display(), "written");

        Ok(Outcome::Written {
            output,
            source_hash,
            params_hash,
        })
    }

    fn save_cache(&self) -> Result<(), GenerateError> {
        if let Some(path) = &self.cache_path {
            self.cache.save(path).map_err(GenerateError::Cache)?;
        }
        Ok(())
    }
}

impl fmt::Debug for GenerationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationSession")
            .field("root", &self.tree.root_dir())
            .field("chain", &self.chain)
            .field("renderer", &self.renderer.name())
            .field("state", &self.state)
            .finish()
    }
}
