//! Module directory lookup over an ordered list of search roots.

use anyhow::{bail, Result};
use dashmap::DashMap;
use std::path::PathBuf;

use crate::ports::ModuleResolver;

/// Resolves `<module dir>` to the first `<root>/<module dir>` that exists.
/// Results are cached; loaders running in parallel share the cache.
pub struct SearchPathResolver {
    roots: Vec<PathBuf>,
    cache: DashMap<String, PathBuf>,
}

impl SearchPathResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots, cache: DashMap::new() }
    }
}

impl ModuleResolver for SearchPathResolver {
    fn resolve(&self, module_dir: &str) -> Result<PathBuf> {
        if let Some(hit) = self.cache.get(module_dir) {
            return Ok(hit.value().clone());
        }
        for root in &self.roots {
            let candidate = root.join(module_dir);
            if candidate.is_dir() {
                tracing::debug!(module = module_dir, dir = %candidate.display(), "resolved module");
                self.cache.insert(module_dir.to_string(), candidate.clone());
                return Ok(candidate);
            }
        }
        bail!(
            "cannot find module directory {:?} in search paths {:?}",
            module_dir,
            self.roots
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_first_root_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::create_dir_all(first.path().join("example.com/app")).unwrap();
        fs::create_dir_all(second.path().join("example.com/app")).unwrap();
        fs::create_dir_all(second.path().join("example.com/lib")).unwrap();

        let resolver =
            SearchPathResolver::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        assert_eq!(resolver.resolve("example.com/app").unwrap(), first.path().join("example.com/app"));
        assert_eq!(resolver.resolve("example.com/lib").unwrap(), second.path().join("example.com/lib"));
    }

    #[test]
    fn test_cached_after_first_lookup() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("m");
        fs::create_dir_all(&dir).unwrap();
        let resolver = SearchPathResolver::new(vec![root.path().to_path_buf()]);
        assert_eq!(resolver.resolve("m").unwrap(), dir);
        fs::remove_dir(&dir).unwrap();
        assert_eq!(resolver.resolve("m").unwrap(), dir);
    }

    #[test]
    fn test_unresolved_module_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let resolver = SearchPathResolver::new(vec![root.path().to_path_buf()]);
        let err = resolver.resolve("missing/mod").unwrap_err();
        assert!(err.to_string().contains("missing/mod"));
    }
}
