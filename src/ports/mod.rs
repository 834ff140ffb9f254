// Interfaces to the collaborators around the tree passes: whoever parses
// source files, locates module directories, prints trees and stores output.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::domain::ast::SyntaxTree;

pub trait TreeLoader: Sync {
    /// Parsed, validated tree of the source file at `source`.
    fn load_tree(&self, source: &Path) -> Result<SyntaxTree>;

    /// Raw text of the source file at `source`.
    fn read_source(&self, source: &Path) -> Result<String>;
}

pub trait ModuleResolver: Sync {
    /// Directory holding the sources of `module_dir`, e.g. the directory for
    /// `example.com/app/server`. Failing to find one is fatal to the run.
    fn resolve(&self, module_dir: &str) -> Result<PathBuf>;
}

pub trait TreePrinter: Sync {
    fn print(&self, tree: &SyntaxTree) -> String;
}

pub trait OutputSink: Sync {
    /// Stores `contents` under `relative`, a slash-separated path.
    fn write_file(&self, relative: &str, contents: &str) -> Result<()>;
}
