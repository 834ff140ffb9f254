//! Output destinations for rewritten sources.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::ports::OutputSink;

/// Writes each file under a root directory, creating directories as needed
/// and truncating existing files.
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl OutputSink for DirectorySink {
    fn write_file(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote file");
        Ok(())
    }
}

/// One shared stream; every file is written whole under the lock, after a
/// `name:` line and an underline of `=`.
pub struct ConsoleSink<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> Result<W> {
        self.out.into_inner().map_err(|_| anyhow!("console writer lock poisoned"))
    }
}

impl<W: Write + Send> OutputSink for ConsoleSink<W> {
    fn write_file(&self, relative: &str, contents: &str) -> Result<()> {
        let mut out = self.out.lock().map_err(|_| anyhow!("console writer lock poisoned"))?;
        write!(out, "{}:\n{}\n{}\n\n", relative, "=".repeat(relative.len()), contents)
            .and_then(|_| out.flush())
            .with_context(|| format!("Failed to print {}", relative))
    }
}
