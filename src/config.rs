//! Site configuration and node metadata.
//!
//! Handles loading, validating, and merging `site.toml`. Stock defaults are
//! overridden by the user's `site.toml` at the site root. The same recursive
//! TOML merge drives the node metadata cascade: every content directory may
//! carry a `meta.toml` whose keys override the metadata inherited from its
//! parent directory.
//!
//! ## Site Layout
//!
//! ```text
//! my-site/
//! ├── site.toml                # Site config (optional)
//! ├── content/                 # Content root → one Node per directory
//! │   ├── meta.toml            # Root node metadata (optional)
//! │   ├── index.html
//! │   └── blog/
//! │       ├── meta.toml        # Overrides root metadata for blog/
//! │       └── first-post.md
//! └── deploy/                  # Generated output
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! content_root = "content"
//! deploy_root = "deploy"
//! plugins = []              # Ordered plugin identifiers, e.g. ["log", "trim"]
//!
//! [layout]
//! title = "Untitled"
//! # stylesheet = "/style.css"
//!
//! [generation]
//! incremental = false       # Default for single-resource builds
//!
//! [processing]
//! # max_processes = 4       # Omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the site configuration file at the site root.
pub const SITE_CONFIG_FILENAME: &str = "site.toml";

/// Name of the per-directory metadata file inside the content tree.
pub const META_FILENAME: &str = "meta.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `site.toml`.
///
/// All fields have defaults; a user config only names the values it wants
/// to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Content directory, relative to the site root.
    pub content_root: String,
    /// Output directory, relative to the site root.
    pub deploy_root: String,
    /// Plugin identifiers in dispatch order.
    pub plugins: Vec<String>,
    /// Page layout settings for the stock renderer.
    pub layout: LayoutConfig,
    /// Generation defaults.
    pub generation: GenerationConfig,
    /// Parallel rendering settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_root: "content".to_string(),
            deploy_root: "deploy".to_string(),
            plugins: Vec::new(),
            layout: LayoutConfig::default(),
            generation: GenerationConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content_root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "content_root must not be empty".into(),
            ));
        }
        if self.deploy_root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "deploy_root must not be empty".into(),
            ));
        }
        let mut seen = HashSet::new();
        for id in &self.plugins {
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "plugin '{id}' is listed more than once"
                )));
            }
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Absolute content directory for a site rooted at `site_root`.
    pub fn content_dir(&self, site_root: &Path) -> PathBuf {
        site_root.join(&self.content_root)
    }

    /// Absolute deploy directory for a site rooted at `site_root`.
    pub fn deploy_dir(&self, site_root: &Path) -> PathBuf {
        site_root.join(&self.deploy_root)
    }
}

/// Page layout settings used by the stock renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Site title, appended to every page title.
    pub title: String,
    /// Optional stylesheet URL linked from every page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            stylesheet: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Skip rendering unchanged resources on single-resource builds.
    pub incremental: bool,
}

/// Parallel rendering settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel render workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge a child metadata table on top of its parent's effective metadata.
pub fn merge_meta(parent: &toml::Table, own: Option<&toml::Table>) -> toml::Table {
    match own {
        None => parent.clone(),
        Some(own) => match merge_toml(
            toml::Value::Table(parent.clone()),
            toml::Value::Table(own.clone()),
        ) {
            toml::Value::Table(t) => t,
            // merging two tables always yields a table
            _ => parent.clone(),
        },
    }
}

/// Read a TOML file as a table.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_table(path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let table: toml::Table = toml::from_str(&content)?;
    Ok(Some(table))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `site.toml` in the given site root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(site_root: &Path) -> Result<SiteConfig, ConfigError> {
    let overlay = load_table(&site_root.join(SITE_CONFIG_FILENAME))?.map(toml::Value::Table);
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `site.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Quire Site Configuration
# ========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Content directory, relative to this file.
content_root = "content"

# Output directory, relative to this file.
deploy_root = "deploy"

# Plugins, notified in this order at every lifecycle event.
# Run `quire plugins` to list the available identifiers.
plugins = []

# ---------------------------------------------------------------------------
# Layout (stock renderer)
# ---------------------------------------------------------------------------
[layout]
# Site title, appended to every page title.
title = "Untitled"

# Stylesheet linked from every page.
# stylesheet = "/style.css"

# ---------------------------------------------------------------------------
# Generation
# ---------------------------------------------------------------------------
[generation]
# Skip re-rendering unchanged resources when building a single resource.
incremental = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel render workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
