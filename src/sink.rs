//! Destinations for generated output.
//!
//! A sink accepts rendered bytes keyed by a path relative to the deploy
//! root. [`DirSink`] writes to disk; [`MemorySink`] keeps everything in
//! memory for previews and tests.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait OutputSink: Send + Sync {
    /// Write `bytes` to `path`, replacing any previous output.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Whether output was previously written to `path`.
    fn exists(&self, path: &Path) -> bool;
}

/// Writes output files under a deploy directory.
#[derive(Debug, Clone)]
pub struct DirSink {
    root: PathBuf,
}

impl DirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl OutputSink for DirSink {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, bytes)
    }

    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).is_file()
    }
}

/// Keeps output in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.lock().get(path).cloned()
    }

    /// Output as UTF-8 text, if present and valid.
    pub fn get_text(&self, path: &Path) -> Option<String> {
        self.get(path).and_then(|b| String::from_utf8(b).ok())
    }

    /// Every written path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        // every critical section is a single map operation, so a poisoned map is still consistent
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl OutputSink for MemorySink {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.lock().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }
}
