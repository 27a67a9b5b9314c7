//! The content tree: directories become [`Node`]s, files become [`Resource`]s.
//!
//! A tree is a snapshot. It is built once by [`ContentTree::load`] and never
//! mutated afterwards; reloading produces a fresh, independent tree, so a
//! session holding the old one keeps seeing the old shape.
//!
//! Entities live in two arenas and refer to each other by [`NodeId`] and
//! [`ResourceId`]. A resource's owning node is a back-reference id, not an
//! ownership relation.
//!
//! ## What becomes what
//!
//! ```text
//! content/                 → root Node (path "")
//! ├── meta.toml            → root Node metadata, not a Resource
//! ├── index.html           → Resource (text)
//! ├── favicon.ico          → Resource (binary)
//! ├── .drafts/             → skipped (hidden)
//! └── a/                   → Node "a"
//!     └── b/               → Node "a/b"
//! ```
//!
//! Entries are visited in file-name order, so ids, child lists and resource
//! lists are deterministic for a given directory.

use crate::config::{self, ConfigError, META_FILENAME};
use crate::source::{self, ResourceKind};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Content root is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Invalid metadata in {path}: {source}")]
    Meta { path: PathBuf, source: ConfigError },
    #[error("Entry has no parent node in the tree: {0}")]
    Orphan(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) usize);

/// A directory level of content.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Path relative to the content root; empty for the root node.
    pub path: PathBuf,
    /// Absolute path of the directory on disk.
    pub source_path: PathBuf,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub resources: Vec<ResourceId>,
    /// Raw `meta.toml` of this directory, before inheritance.
    pub meta: Option<toml::Table>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Directory name, or `""` for the root.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A single content file.
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: ResourceId,
    /// Path relative to the content root.
    pub path: PathBuf,
    /// Absolute path of the file on disk.
    pub source_path: PathBuf,
    pub kind: ResourceKind,
    /// Owning node.
    pub node: NodeId,
}

impl Resource {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercased extension, empty when absent.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    pub fn is_text(&self) -> bool {
        self.kind.is_text()
    }
}

#[derive(Debug)]
pub struct ContentTree {
    root_dir: PathBuf,
    nodes: Vec<Node>,
    resources: Vec<Resource>,
    node_index: HashMap<PathBuf, NodeId>,
    resource_index: HashMap<PathBuf, ResourceId>,
}

impl ContentTree {
    /// Walk `root` and build the tree.
    ///
    /// Hidden entries (leading `.`) are skipped, `meta.toml` files are
    /// attached to their directory's node, and every other regular file
    /// becomes a resource classified by [`source::classify`].
    pub fn load(root: &Path) -> Result<Self, TreeError> {
        if !root.is_dir() {
            return Err(TreeError::NotADirectory(root.to_path_buf()));
        }

        let mut tree = ContentTree {
            root_dir: root.to_path_buf(),
            nodes: Vec::new(),
            resources: Vec::new(),
            node_index: HashMap::new(),
            resource_index: HashMap::new(),
        };

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = entry?;
            let rel = entry
                .path()
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_default();

            if entry.file_type().is_dir() {
                tree.push_node(rel, entry.path())?;
            } else if entry.file_type().is_file() {
                let parent = tree.parent_of(&rel)?;
                if entry.file_name() == META_FILENAME {
                    let meta = config::load_table(entry.path()).map_err(|source| {
                        TreeError::Meta {
                            path: entry.path().to_path_buf(),
                            source,
                        }
                    })?;
                    tree.nodes[parent.0].meta = meta;
                } else {
                    let kind = source::classify(entry.path())?;
                    tree.push_resource(rel, entry.path(), kind, parent);
                }
            }
        }

        debug!(
            root = %root.display(),
            nodes = tree.nodes.len(),
            resources = tree.resources.len(),
            "loaded content tree"
        );
        Ok(tree)
    }

    fn push_node(&mut self, rel: PathBuf, source_path: &Path) -> Result<(), TreeError> {
        let parent = if rel.as_os_str().is_empty() {
            None
        } else {
            Some(self.parent_of(&rel)?)
        };
        let id = NodeId(self.nodes.len());
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        self.node_index.insert(rel.clone(), id);
        self.nodes.push(Node {
            id,
            path: rel,
            source_path: source_path.to_path_buf(),
            parent,
            children: Vec::new(),
            resources: Vec::new(),
            meta: None,
        });
        Ok(())
    }

    fn push_resource(&mut self, rel: PathBuf, source_path: &Path, kind: ResourceKind, node: NodeId) {
        let id = ResourceId(self.resources.len());
        self.nodes[node.0].resources.push(id);
        self.resource_index.insert(rel.clone(), id);
        self.resources.push(Resource {
            id,
            path: rel,
            source_path: source_path.to_path_buf(),
            kind,
            node,
        });
    }

    fn parent_of(&self, rel: &Path) -> Result<NodeId, TreeError> {
        rel.parent()
            .and_then(|p| self.node_index.get(p).copied())
            .ok_or_else(|| TreeError::Orphan(rel.to_path_buf()))
    }

    /// Absolute path of the content root this tree was loaded from.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Depth-first, parent-before-children order of every node.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root().id];
        while let Some(id) = stack.pop() {
            order.push(id);
            // reversed so the first child is visited first
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        order
    }

    /// Look up a node by path. See [`ContentTree::relative_path`].
    pub fn node_at(&self, path: &Path) -> Option<&Node> {
        self.node_index
            .get(&self.relative_path(path))
            .map(|&id| self.node(id))
    }

    /// Look up a resource by path. See [`ContentTree::relative_path`].
    pub fn resource_at(&self, path: &Path) -> Option<&Resource> {
        self.resource_index
            .get(&self.relative_path(path))
            .map(|&id| self.resource(id))
    }

    /// Normalize a caller-supplied path to a tree key.
    ///
    /// Accepts paths under the content root's absolute location, or
    /// root-relative paths with or without a leading `/` or `./`.
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        let path = path.strip_prefix(&self.root_dir).unwrap_or(path);
        path.components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(Path::new(part).to_path_buf()),
                Component::ParentDir => Some(PathBuf::from("..")),
                Component::RootDir | Component::CurDir | Component::Prefix(_) => None,
            })
            .collect()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
