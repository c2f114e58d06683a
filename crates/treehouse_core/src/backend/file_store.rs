//! File store implementations.
//!
//! # Invariants
//! - Paths are relative, `/`-separated and never contain `..` segments.
//! - A missing file reads as `None`, not as an error.

use super::{BackendError, BackendResult, FileStore};
use log::{debug, error};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Process-local file store, mostly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<String, String>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted list of stored paths.
    pub fn paths(&self) -> Vec<String> {
        let files = self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut paths = files.keys().cloned().collect::<Vec<_>>();
        paths.sort();
        paths
    }
}

impl FileStore for MemoryFileStore {
    fn read_file(&self, path: &str) -> BackendResult<Option<String>> {
        let key = normalize_path(path)?;
        let files = self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(files.get(&key).cloned())
    }

    fn write_file(&self, path: &str, contents: &str) -> BackendResult<()> {
        let key = normalize_path(path)?;
        let mut files = self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        files.insert(key, contents.to_string());
        Ok(())
    }
}

/// File store rooted at one directory on disk.
#[derive(Debug, Clone)]
pub struct DirFileStore {
    root: PathBuf,
}

impl DirFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> BackendResult<PathBuf> {
        let normalized = normalize_path(path)?;
        Ok(normalized
            .split('/')
            .fold(self.root.clone(), |acc, segment| acc.join(segment)))
    }
}

impl FileStore for DirFileStore {
    fn read_file(&self, path: &str) -> BackendResult<Option<String>> {
        let full = self.resolve(path)?;
        match std::fs::read_to_string(&full) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => {
                error!(
                    "event=file_read module=backend status=error path={} error={}",
                    full.display(),
                    source
                );
                Err(BackendError::Io { path: full, source })
            }
        }
    }

    fn write_file(&self, path: &str, contents: &str) -> BackendResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|source| BackendError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&full, contents).map_err(|source| BackendError::Io {
            path: full.clone(),
            source,
        })?;
        debug!(
            "event=file_write module=backend status=ok path={} bytes={}",
            full.display(),
            contents.len()
        );
        Ok(())
    }
}

fn normalize_path(path: &str) -> BackendResult<String> {
    let segments = path
        .trim()
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>();
    if segments.is_empty() || segments.iter().any(|segment| *segment == "..") {
        return Err(BackendError::InvalidPath(path.to_string()));
    }
    Ok(segments.join("/"))
}
