//! Run configuration.
//!
//! Values come from an optional `discover.toml`; command-line flags are
//! applied on top by `main.rs`. Every field has a default so an empty file
//! (or no file at all) is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "discover.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Roots searched, in order, for the module directory of a logical path.
    pub search_paths: Vec<PathBuf>,
    /// Suffix appended to a source path to find its syntax-tree dump.
    pub tree_suffix: String,
    /// Worker threads; `None` sizes the pool from the CPU count.
    pub threads: Option<usize>,
    /// Output root. Without one, results go to stdout.
    pub output: Option<PathBuf>,
    pub instrument: InstrumentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from(".")],
            tree_suffix: ".ast.json".to_string(),
            threads: None,
            output: None,
            instrument: InstrumentConfig::default(),
        }
    }
}

/// Identifiers the instrumenter writes into rewritten sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Package-level variable holding counters, positions and statement counts.
    pub cover_var: String,
    /// Import path of the runtime helper package (TraceID, MakeFunc, ...).
    pub runtime_path: String,
    pub runtime_alias: String,
    pub atomic_path: String,
    pub atomic_alias: String,
    /// Local variable carrying the trace id inside every function body.
    pub trace_id: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            cover_var: "DiscoverCover".to_string(),
            runtime_path: "github.com/eandre/discover/runtimeutil".to_string(),
            runtime_alias: "_discover_runtimeutil_".to_string(),
            atomic_path: "sync/atomic".to_string(),
            atomic_alias: "_cover_atomic_".to_string(),
            trace_id: "_discover_trace_id_".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(src: &str) -> Result<Self> {
        toml::from_str(src).context("Invalid discover configuration")
    }

    /// Load the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let src = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        Self::from_toml_str(&src).with_context(|| format!("In {}", path.display()))
    }

    /// Load `path` if given, else `discover.toml` when present, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml_str(
            r#"
search_paths = ["/src", "/vendor"]
threads = 2

[instrument]
cover_var = "Cov"
"#,
        )
        .unwrap();
        assert_eq!(config.search_paths, vec![PathBuf::from("/src"), PathBuf::from("/vendor")]);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.instrument.cover_var, "Cov");
        assert_eq!(config.instrument.atomic_path, "sync/atomic");
        assert_eq!(config.tree_suffix, ".ast.json");
    }

    #[test]
    fn test_unknown_type_is_error() {
        assert!(Config::from_toml_str("threads = \"many\"").is_err());
    }
}
