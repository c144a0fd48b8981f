//! Read callback serving engine requests for files outside the source map

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::compiler::engine::{READ_KIND_SOURCE, ReadCallback};
use crate::compiler::paths::SourcePaths;
use crate::config::WorkspaceConfig;
use crate::vfs::DocumentStore;

/// A read the engine asked for and could not get
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFailure {
    pub source_name: String,
    pub reason: String,
}

/// Serves reads from the Document Store first, then from disk below the
/// workspace base path and the configured include paths.
pub struct FileReader<'a> {
    store: &'a DocumentStore,
    paths: &'a SourcePaths,
    search_dirs: Vec<PathBuf>,
    allowed_dirs: Vec<PathBuf>,
    loaded: BTreeMap<String, String>,
    failures: Vec<ReadFailure>,
}

impl<'a> FileReader<'a> {
    pub fn new(store: &'a DocumentStore, paths: &'a SourcePaths, config: &WorkspaceConfig) -> Self {
        let search_dirs: Vec<PathBuf> = paths
            .base_path()
            .map(Path::to_path_buf)
            .into_iter()
            .chain(config.include_paths.iter().cloned())
            .collect();

        let allowed_dirs = search_dirs
            .iter()
            .filter_map(|dir| dir.canonicalize().ok())
            .collect();

        Self {
            store,
            paths,
            search_dirs,
            allowed_dirs,
            loaded: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// Contents served so far, and the reads that failed
    pub fn into_parts(self) -> (BTreeMap<String, String>, Vec<ReadFailure>) {
        (self.loaded, self.failures)
    }

    fn read(&self, kind: &str, source_name: &str) -> Result<String, String> {
        if kind != READ_KIND_SOURCE {
            return Err(format!("Unsupported read kind \"{}\"", kind));
        }

        if let Some(document) = self
            .paths
            .uri(source_name)
            .and_then(|uri| self.store.get(&uri))
        {
            return Ok(document.content().to_string());
        }

        let path = Path::new(source_name);
        let candidates: Vec<PathBuf> = if path.is_absolute() {
            vec![path.to_path_buf()]
        } else {
            self.search_dirs.iter().map(|dir| dir.join(path)).collect()
        };

        let Some(found) = candidates.iter().find(|candidate| candidate.is_file()) else {
            return Err("File not found.".to_string());
        };

        let canonical = found
            .canonicalize()
            .map_err(|e| format!("Cannot resolve {}: {}", found.display(), e))?;

        if !self.allowed_dirs.iter().any(|dir| canonical.starts_with(dir)) {
            warn!("Refusing to read {:?} outside allowed directories", canonical);
            return Err(format!(
                "{} is outside the allowed directories.",
                canonical.display()
            ));
        }

        std::fs::read_to_string(&canonical)
            .map_err(|e| format!("Cannot read {}: {}", canonical.display(), e))
    }
}

impl ReadCallback for FileReader<'_> {
    fn read_file(&mut self, kind: &str, path: &str) -> Result<String, String> {
        let result = self.read(kind, path);

        match &result {
            Ok(content) => {
                debug!("Read {} ({} bytes)", path, content.len());
                self.loaded.insert(path.to_string(), content.clone());
            }
            Err(reason) => {
                debug!("Failed to read {}: {}", path, reason);
                self.failures.push(ReadFailure {
                    source_name: path.to_string(),
                    reason: reason.clone(),
                });
            }
        }

        result
    }
}
