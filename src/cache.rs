//! Freshness cache for incremental single-resource builds.
//!
//! When a build asks for one resource with `incremental` set, the session
//! consults this cache before rendering. If the source bytes and the render
//! parameters are unchanged since the output was last produced, and that
//! output is still present in the sink, the render and the write are
//! skipped. The resource's lifecycle hook fires either way: the hook marks
//! "this resource was the subject of a generation request", not "bytes were
//! rewritten".
//!
//! # Cache keys
//!
//! Entries are keyed by output path and hold two hashes:
//!
//! - **`source_hash`**: SHA-256 of the source file contents. Content-based
//!   rather than mtime-based so it survives `git checkout` (which resets
//!   modification times).
//!
//! - **`params_hash`**: SHA-256 of everything else that shapes the output:
//!   renderer name, plugin identifiers in order, and the owning node's
//!   effective metadata. Adding a plugin or editing a `meta.toml` up the
//!   tree invalidates every affected resource.
//!
//! # Storage
//!
//! The manifest is a JSON file, `.quire-cache.json`, in the deploy
//! directory so it travels with the output. Every render (incremental or
//! not) records its entry, so a full build primes the cache for later
//! incremental builds.

use crate::sink::OutputSink;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the deploy directory.
pub const MANIFEST_FILENAME: &str = ".quire-cache.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
}

/// On-disk cache manifest mapping output paths to their cache entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self::empty()
    }
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or first build).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
        }
    }

    /// Load from `path`. Returns an empty manifest if the file doesn't
    /// exist or can't be parsed (version mismatch, corruption).
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(),
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest
    }

    /// Save to `path`, creating its parent directory if needed.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Whether the output at `output_path` was produced from exactly these
    /// inputs and still exists in `sink`.
    pub fn is_fresh(
        &self,
        output_path: &Path,
        source_hash: &str,
        params_hash: &str,
        sink: &dyn OutputSink,
    ) -> bool {
        self.entries
            .get(&key(output_path))
            .is_some_and(|e| e.source_hash == source_hash && e.params_hash == params_hash)
            && sink.exists(output_path)
    }

    /// Record the inputs an output was produced from.
    pub fn insert(&mut self, output_path: &Path, source_hash: String, params_hash: String) {
        self.entries.insert(
            key(output_path),
            CacheEntry {
                source_hash,
                params_hash,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key(output_path: &Path) -> String {
    output_path.to_string_lossy().replace('\\', "/")
}

/// SHA-256 of a byte slice, as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of the render parameters of one resource.
///
/// Inputs: renderer name, plugin identifiers (order matters), and the
/// owning node's effective metadata.
pub fn hash_render_params(renderer: &str, plugins: &[String], meta: &toml::Table) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"render\0");
    hasher.update(renderer.as_bytes());
    hasher.update(b"\0");
    for id in plugins {
        hasher.update(id.as_bytes());
        hasher.update(b"\0");
    }
    // toml::Table is ordered by key, so the JSON form is stable
    hasher.update(serde_json::to_vec(meta).unwrap_or_default());
    format!("{:x}", hasher.finalize())
}

/// Resolve the cache manifest path for a deploy directory.
pub fn manifest_path(deploy_dir: &Path) -> PathBuf {
    deploy_dir.join(MANIFEST_FILENAME)
}

/// How many renders the cache saved in one generation call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} fresh, {} rendered ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} rendered", self.misses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::fs;
    use tempfile::TempDir;

    fn meta(src: &str) -> toml::Table {
        toml::from_str(src).unwrap()
    }

    // =========================================================================
    // CacheManifest basics
    // =========================================================================

    #[test]
    fn empty_manifest_has_no_entries() {
        let m = CacheManifest::empty();
        assert_eq!(m.version, MANIFEST_VERSION);
        assert!(m.is_empty());
    }

    #[test]
    fn fresh_when_hashes_match_and_output_exists() {
        let sink = MemorySink::new();
        sink.write(Path::new("a/page.html"), b"x").unwrap();
        let mut m = CacheManifest::empty();
        m.insert(Path::new("a/page.html"), "src".into(), "prm".into());

        assert!(m.is_fresh(Path::new("a/page.html"), "src", "prm", &sink));
    }

    #[test]
    fn stale_when_source_hash_differs() {
        let sink = MemorySink::new();
        sink.write(Path::new("p.html"), b"x").unwrap();
        let mut m = CacheManifest::empty();
        m.insert(Path::new("p.html"), "old".into(), "prm".into());

        assert!(!m.is_fresh(Path::new("p.html"), "new", "prm", &sink));
    }

    #[test]
    fn stale_when_params_hash_differs() {
        let sink = MemorySink::new();
        sink.write(Path::new("p.html"), b"x").unwrap();
        let mut m = CacheManifest::empty();
        m.insert(Path::new("p.html"), "src".into(), "a".into());

        assert!(!m.is_fresh(Path::new("p.html"), "src", "b", &sink));
    }

    #[test]
    fn stale_when_output_missing() {
        let sink = MemorySink::new();
        let mut m = CacheManifest::empty();
        m.insert(Path::new("gone.html"), "src".into(), "prm".into());

        assert!(!m.is_fresh(Path::new("gone.html"), "src", "prm", &sink));
    }

    #[test]
    fn insert_replaces_previous_entry() {
        let mut m = CacheManifest::empty();
        m.insert(Path::new("p.html"), "one".into(), "prm".into());
        m.insert(Path::new("p.html"), "two".into(), "prm".into());
        assert_eq!(m.len(), 1);
        assert_eq!(m.entries["p.html"].source_hash, "two");
    }

    // =========================================================================
    // Save / Load
    // =========================================================================

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = manifest_path(&tmp.path().join("deploy"));
        let mut m = CacheManifest::empty();
        m.insert(Path::new("x.html"), "s1".into(), "p1".into());
        m.insert(Path::new("y/z.css"), "s2".into(), "p2".into());

        m.save(&path).unwrap();
        let loaded = CacheManifest::load(&path);

        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.entries["y/z.css"],
            CacheEntry {
                source_hash: "s2".into(),
                params_hash: "p2".into()
            }
        );
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheManifest::load(&manifest_path(tmp.path())).is_empty());
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let path = manifest_path(tmp.path());
        fs::write(&path, "not json").unwrap();
        assert!(CacheManifest::load(&path).is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let path = manifest_path(tmp.path());
        let json = format!(
            r#"{{"version": {}, "entries": {{"a": {{"source_hash":"h","params_hash":"p"}}}}}}"#,
            MANIFEST_VERSION + 1
        );
        fs::write(&path, json).unwrap();
        assert!(CacheManifest::load(&path).is_empty());
    }

    // =========================================================================
    // Hash functions
    // =========================================================================

    #[test]
    fn hash_bytes_deterministic() {
        let h1 = hash_bytes(b"hello world");
        assert_eq!(h1, hash_bytes(b"hello world"));
        assert_eq!(h1.len(), 64); // SHA-256 hex is 64 chars
        assert_ne!(h1, hash_bytes(b"hello world!"));
    }

    #[test]
    fn params_hash_varies_with_plugins_and_order() {
        let m = toml::Table::new();
        let ab = hash_render_params("layout", &["a".into(), "b".into()], &m);
        let ba = hash_render_params("layout", &["b".into(), "a".into()], &m);
        let a = hash_render_params("layout", &["a".into()], &m);
        assert_ne!(ab, ba);
        assert_ne!(ab, a);
    }

    #[test]
    fn params_hash_varies_with_meta() {
        let plugins: Vec<String> = Vec::new();
        assert_ne!(
            hash_render_params("layout", &plugins, &meta("title = \"A\"")),
            hash_render_params("layout", &plugins, &meta("title = \"B\""))
        );
        assert_eq!(
            hash_render_params("layout", &plugins, &meta("a = 1\nb = 2")),
            hash_render_params("layout", &plugins, &meta("b = 2\na = 1"))
        );
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let s = CacheStats { hits: 5, misses: 2 };
        assert_eq!(format!("{}", s), "5 fresh, 2 rendered (7 total)");
    }

    #[test]
    fn cache_stats_display_no_hits() {
        let s = CacheStats { hits: 0, misses: 3 };
        assert_eq!(format!("{}", s), "3 rendered");
    }
}
