//! Mapping between document URIs and source unit names
//!
//! Files below the workspace base path are named relative to it, other files by
//! their absolute path. Documents without a `file` URI keep the URI as name.

use std::path::{Component, Path, PathBuf};

use tower_lsp::lsp_types::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePaths {
    base_path: Option<PathBuf>,
}

impl SourcePaths {
    pub fn new(base_path: Option<PathBuf>) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    pub fn set_base_path(&mut self, base_path: PathBuf) {
        self.base_path = Some(base_path);
    }

    /// Source unit name the engine knows `uri` by
    pub fn source_name(&self, uri: &Url) -> String {
        if uri.scheme() != "file" {
            return uri.to_string();
        }

        let Ok(path) = uri.to_file_path() else {
            return uri.to_string();
        };

        match self.base_path().and_then(|base| path.strip_prefix(base).ok()) {
            Some(relative) => join_components(relative),
            None => path.to_string_lossy().into_owned(),
        }
    }

    /// Filesystem path of a source unit, `None` for non-file sources or
    /// relative names without a base path
    pub fn file_path(&self, source_name: &str) -> Option<PathBuf> {
        if is_uri(source_name) {
            return None;
        }

        let path = Path::new(source_name);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            self.base_path().map(|base| base.join(path))
        }
    }

    /// Document URI of a source unit
    pub fn uri(&self, source_name: &str) -> Option<Url> {
        if is_uri(source_name) {
            return Url::parse(source_name).ok();
        }

        self.file_path(source_name)
            .and_then(|path| Url::from_file_path(path).ok())
    }
}

fn is_uri(source_name: &str) -> bool {
    // single-letter schemes are drive letters
    Url::parse(source_name).is_ok_and(|url| url.scheme().len() > 1)
}

fn join_components(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
