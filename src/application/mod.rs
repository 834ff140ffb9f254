// Use cases: one instrumentation run, one trimming run.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::common::config::InstrumentConfig;
use crate::domain::ast::SyntaxTree;
use crate::domain::comments::{leading_header, retain_directives};
use crate::domain::cover::write_counter_table;
use crate::domain::extent::index_tree;
use crate::domain::instrument::{instrument_tree, Instrumentation};
use crate::domain::profile::{correlate, CoverageProfile, FileRecords, Profile, ProfiledFile};
use crate::domain::trim::Trimmer;
use crate::ports::{ModuleResolver, OutputSink, TreeLoader, TreePrinter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstrumentSummary {
    pub files: usize,
    pub blocks: usize,
    pub overlaps: usize,
}

pub struct InstrumentUsecase<'a> {
    pub loader: &'a dyn TreeLoader,
    pub printer: &'a dyn TreePrinter,
    pub sink: &'a dyn OutputSink,
    pub config: &'a InstrumentConfig,
}

impl<'a> InstrumentUsecase<'a> {
    /// Instruments every file in parallel. All files are attempted; the first
    /// failure in input order is returned afterwards.
    pub fn run(&self, sources: &[PathBuf]) -> Result<InstrumentSummary> {
        let results: Vec<Result<Instrumentation>> =
            sources.par_iter().map(|source| self.instrument_file(source)).collect();
        let done = results.into_iter().collect::<Result<Vec<_>>>()?;

        let summary = InstrumentSummary {
            files: done.len(),
            blocks: done.iter().map(|i| i.blocks.len()).sum(),
            overlaps: done.iter().map(|i| i.overlaps.len()).sum(),
        };
        tracing::info!(files = summary.files, blocks = summary.blocks, "instrumented");
        Ok(summary)
    }

    fn instrument_file(&self, source: &Path) -> Result<Instrumentation> {
        let tree = self.loader.load_tree(source)?;
        let text = self.loader.read_source(source)?;
        let (output, result) = self.instrument_source(tree, &text)?;
        for overlap in &result.overlaps {
            tracing::error!("{}", overlap);
        }

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", source.display()))?;
        self.sink.write_file(&name, &output)?;
        tracing::debug!(file = %source.display(), blocks = result.blocks.len(), "instrumented file");
        Ok(result)
    }

    /// Rewritten source of one file: the original leading header, the
    /// instrumented tree, then the counter table.
    pub fn instrument_source(
        &self,
        mut tree: SyntaxTree,
        source_text: &str,
    ) -> Result<(String, Instrumentation)> {
        let header = leading_header(source_text);
        retain_directives(&mut tree, header.matches('\n').count() as u32);
        let result = instrument_tree(&mut tree, self.config);

        let mut output = String::with_capacity(source_text.len() * 2);
        output.push_str(header);
        output.push_str(&self.printer.print(&tree));
        write_counter_table(&mut output, &self.config.cover_var, &result.blocks)
            .with_context(|| format!("Failed to write counter table for {}", tree.path))?;
        Ok((output, result))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimSummary {
    pub emitted: usize,
    pub omitted: usize,
}

pub struct TrimUsecase<'a> {
    pub loader: &'a dyn TreeLoader,
    pub resolver: &'a dyn ModuleResolver,
    pub printer: &'a dyn TreePrinter,
    pub sink: &'a dyn OutputSink,
}

impl<'a> TrimUsecase<'a> {
    pub fn run(&self, profile: &CoverageProfile) -> Result<TrimSummary> {
        let profile = self.load_profile(profile)?;
        self.trim(profile)
    }

    /// Loads the tree of every file in the profile and correlates it with
    /// the file's records. Packages and the files inside each run in
    /// parallel.
    pub fn load_profile(&self, profile: &CoverageProfile) -> Result<Profile> {
        let packages = group_by_module(&profile.files);
        let results: Vec<Vec<Result<ProfiledFile>>> = packages
            .par_iter()
            .map(|(module, files)| match self.resolver.resolve(module) {
                Ok(dir) => files.par_iter().map(|file| self.profile_file(&dir, file)).collect(),
                Err(err) => vec![Err(err)],
            })
            .collect();
        let files = results.into_iter().flatten().collect::<Result<Vec<_>>>()?;
        Ok(Profile { files })
    }

    fn profile_file(&self, dir: &Path, file: &FileRecords) -> Result<ProfiledFile> {
        let name = file.file.rsplit('/').next().unwrap_or(&file.file);
        let mut tree = self
            .loader
            .load_tree(&dir.join(name))
            .with_context(|| format!("While loading {}", file.file))?;
        tree.path = file.file.clone();

        let extents = index_tree(&tree);
        let reach = correlate(&extents, &file.records);
        tracing::debug!(
            file = %file.file,
            funcs = extents.funcs.len(),
            reached_funcs = reach.reached_funcs(),
            stmts = extents.stmts.len(),
            reached_stmts = reach.reached_stmts(),
            "correlated"
        );
        Ok(ProfiledFile { tree, reach })
    }

    /// Trims and emits every file. Files left without declarations are not
    /// written at all.
    pub fn trim(&self, profile: Profile) -> Result<TrimSummary> {
        let results: Vec<Result<bool>> =
            profile.files.into_par_iter().map(|file| self.trim_file(file)).collect();
        let emitted = results.into_iter().collect::<Result<Vec<_>>>()?;

        let summary = TrimSummary {
            emitted: emitted.iter().filter(|e| **e).count(),
            omitted: emitted.iter().filter(|e| !**e).count(),
        };
        tracing::info!(emitted = summary.emitted, omitted = summary.omitted, "trimmed");
        Ok(summary)
    }

    fn trim_file(&self, file: ProfiledFile) -> Result<bool> {
        let ProfiledFile { mut tree, reach } = file;
        if !Trimmer::new(&reach).trim_tree(&mut tree) {
            tracing::debug!(file = %tree.path, "nothing reached, omitted");
            return Ok(false);
        }
        let text = self.printer.print(&tree);
        self.sink.write_file(&tree.path, &text)?;
        Ok(true)
    }
}

/// Files grouped by module directory, both in first-appearance order.
fn group_by_module(files: &[FileRecords]) -> Vec<(String, Vec<&FileRecords>)> {
    let mut packages: Vec<(String, Vec<&FileRecords>)> = Vec::new();
    for file in files {
        let module = match file.file.rfind('/') {
            Some(idx) => &file.file[..idx],
            None => "",
        };
        match packages.iter_mut().find(|(m, _)| m.as_str() == module) {
            Some((_, group)) => group.push(file),
            None => packages.push((module.to_string(), vec![file])),
        }
    }
    packages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(file: &str) -> FileRecords {
        FileRecords { file: file.to_string(), records: Vec::new() }
    }

    #[test]
    fn test_group_by_module_keeps_first_appearance_order() {
        let files = vec![records("m/b/x.go"), records("m/a/y.go"), records("m/b/z.go"), records("top.go")];
        let groups = group_by_module(&files);
        let names: Vec<(&str, Vec<&str>)> = groups
            .iter()
            .map(|(m, fs)| (m.as_str(), fs.iter().map(|f| f.file.as_str()).collect()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("m/b", vec!["m/b/x.go", "m/b/z.go"]),
                ("m/a", vec!["m/a/y.go"]),
                ("", vec!["top.go"]),
            ]
        );
    }
}
