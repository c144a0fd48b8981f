use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Returns the path to the data directory for compiler-lsp.
/// Uses $XDG_DATA_HOME/compiler-lsp if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/compiler-lsp,
/// or ./compiler-lsp if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("compiler-lsp.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("compiler-lsp")
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid remapping \"{0}\": expected [context:]prefix=target")]
    InvalidRemapping(String),
}

/// Import path rewrite rule in `[context:]prefix=target` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remapping {
    /// Only imports from source units starting with this prefix are remapped
    pub context: String,
    pub prefix: String,
    pub target: String,
}

impl Remapping {
    /// Rewrites `path` if this remapping applies to an import found in `importer`
    pub fn apply(&self, importer: &str, path: &str) -> Option<String> {
        if !importer.starts_with(&self.context) {
            return None;
        }
        path.strip_prefix(&self.prefix)
            .map(|rest| format!("{}{}", self.target, rest))
    }
}

impl FromStr for Remapping {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidRemapping(s.to_string());

        let (head, target) = s.split_once('=').ok_or_else(invalid)?;
        let (context, prefix) = head.split_once(':').unwrap_or(("", head));

        if prefix.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            context: context.to_string(),
            prefix: prefix.to_string(),
            target: target.to_string(),
        })
    }
}

impl fmt::Display for Remapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}={}", self.prefix, self.target)
        } else {
            write!(f, "{}:{}={}", self.context, self.prefix, self.target)
        }
    }
}

/// Settings as sent by the client; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    #[serde(default, alias = "remapping")]
    remappings: Option<Vec<String>>,
    #[serde(default, alias = "evm")]
    target_version: Option<String>,
    #[serde(default)]
    include_paths: Option<Vec<PathBuf>>,
}

/// Workspace-wide compilation settings, read on every compile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub remappings: Vec<Remapping>,
    pub target_version: Option<String>,
    pub include_paths: Vec<PathBuf>,
}

impl WorkspaceConfig {
    /// Applies client settings, leaving keys the client did not send untouched.
    ///
    /// Returns the problems found; valid entries are applied regardless.
    pub fn apply(&mut self, settings: &Value) -> Result<Vec<ConfigError>, serde_json::Error> {
        if settings.is_null() {
            return Ok(Vec::new());
        }

        let raw = RawSettings::deserialize(settings)?;
        let mut problems = Vec::new();

        if let Some(remappings) = raw.remappings {
            self.remappings = remappings
                .iter()
                .filter_map(|entry| {
                    entry
                        .parse::<Remapping>()
                        .inspect_err(|e| problems.push(e.clone()))
                        .ok()
                })
                .collect();
        }

        if let Some(version) = raw.target_version {
            self.target_version = Some(version);
        }

        if let Some(include_paths) = raw.include_paths {
            self.include_paths = include_paths;
        }

        Ok(problems)
    }

    /// Rewrites an import path with the longest matching remapping
    pub fn remap(&self, importer: &str, path: &str) -> String {
        self.remappings
            .iter()
            .filter(|remapping| remapping.apply(importer, path).is_some())
            .max_by_key(|remapping| (remapping.context.len(), remapping.prefix.len()))
            .and_then(|remapping| remapping.apply(importer, path))
            .unwrap_or_else(|| path.to_string())
    }
}
