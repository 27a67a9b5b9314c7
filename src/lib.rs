//! # Quire
//!
//! A static content generator built around a plugin lifecycle. Your
//! filesystem is the data source: directories become nodes, files become
//! resources, and a chain of plugins is told exactly what is happening at
//! every step of a build.
//!
//! # Architecture: Sessions Over Snapshots
//!
//! ```text
//! content/  →  ContentTree  →  GenerationSession  →  OutputSink (deploy/)
//!                                   │
//!                                   └── PluginChain ── Dispatcher
//! ```
//!
//! A [`tree::ContentTree`] is loaded once and never mutated. A
//! [`session::GenerationSession`] binds that snapshot to a plugin chain, a
//! renderer and an output sink, and accepts three kinds of top-level call:
//! the whole site, one node, or one resource. The session is long-lived and
//! remembers which lifecycle events it has already announced, so repeated
//! partial builds (an editor saving one file at a time) never duplicate a
//! site or node notification.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`tree`] | Walks the content directory into nodes and resources |
//! | [`source`] | Text/binary classification and content reads |
//! | [`plugin`] | The `Plugin` trait: every lifecycle hook, all optional |
//! | [`chain`] | Identifier → plugin resolution (registry + resolve-once chain) |
//! | [`builtin`] | Stock plugins: `log`, `trim` |
//! | [`dispatch`] | Broadcasting a hook across a chain, in order |
//! | [`session`] | The orchestrator: idempotence state and the three entry points |
//! | [`render`] | The `Renderer` trait and the stock Markdown layout renderer |
//! | [`sink`] | Output destinations: directory or memory |
//! | [`cache`] | SHA-256 freshness manifest for incremental builds |
//! | [`config`] | `site.toml` loading, validation, merging; `meta.toml` cascade |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Plugin Registry
//!
//! Plugins are named by identifier in `site.toml` and resolved through a
//! [`chain::PluginRegistry`] of factories, never by reflection. Resolution
//! is all-or-nothing: a session never runs with half its plugins.
//!
//! ## Idempotence Is Session State
//!
//! "Has the site been announced?" and "has this node been announced?" are
//! plain fields on the session, not properties of the plugins. A retried
//! call after a plugin failure resumes where the failed one left off.
//!
//! ## Content Hashes, Not Timestamps
//!
//! Incremental builds compare SHA-256 hashes of the source and of the render
//! parameters, so they survive `git checkout` and clock skew.
//!
//! ## Maud Over Template Engines
//!
//! The stock renderer generates HTML with [Maud](https://maud.lambda.xyz/):
//! malformed markup is a compile error and all interpolation is escaped.

pub mod builtin;
pub mod cache;
pub mod chain;
pub mod config;
pub mod dispatch;
pub mod output;
pub mod plugin;
pub mod render;
pub mod session;
pub mod sink;
pub mod source;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_helpers;
