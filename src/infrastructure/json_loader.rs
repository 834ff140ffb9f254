//! Loads syntax trees dumped as JSON next to their source files.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::ast::SyntaxTree;
use crate::ports::TreeLoader;

pub struct JsonTreeLoader {
    /// Appended to a source path to find its dump, e.g. `.ast.json`.
    suffix: String,
}

impl JsonTreeLoader {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }

    pub fn dump_path(&self, source: &Path) -> PathBuf {
        let mut name = source.as_os_str().to_owned();
        name.push(&self.suffix);
        PathBuf::from(name)
    }
}

impl TreeLoader for JsonTreeLoader {
    fn load_tree(&self, source: &Path) -> Result<SyntaxTree> {
        let dump = self.dump_path(source);
        let text = fs::read_to_string(&dump)
            .with_context(|| format!("Failed to read syntax tree {}", dump.display()))?;
        let tree: SyntaxTree = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse syntax tree {}", dump.display()))?;
        tree.validate()
            .with_context(|| format!("Invalid syntax tree {}", dump.display()))?;
        Ok(tree)
    }

    fn read_source(&self, source: &Path) -> Result<String> {
        fs::read_to_string(source)
            .with_context(|| format!("Failed to read source file {}", source.display()))
    }
}
