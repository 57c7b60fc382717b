use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::Result;

/// A candidate file whose contents contain a handler fragment verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMatch {
    pub path: PathBuf,
}

/// Scans a resolution directory tree for compiled source files containing a
/// given code fragment.
///
/// Traversal is depth-first with subdirectories visited before files, entries
/// sorted by name at every level, so the match order is reproducible for a
/// fixed filesystem state. Containment is plain substring search; the catalog
/// never guesses beyond that.
pub struct SourceCatalog {
    root: PathBuf,
    extension: String,
}

impl SourceCatalog {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every file under the root containing `fragment`, in traversal order.
    pub fn find_containing(&self, fragment: &str) -> Result<Vec<SourceMatch>> {
        let mut matches = Vec::new();
        self.scan_dir(&self.root, fragment, &mut matches)?;
        Ok(matches)
    }

    fn scan_dir(&self, dir: &Path, fragment: &str, matches: &mut Vec<SourceMatch>) -> Result<()> {
        let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in &entries {
            let path = entry.path();
            if path.is_dir() {
                self.scan_dir(&path, fragment, matches)?;
            }
        }

        for entry in &entries {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            if contents.contains(fragment) {
                debug!("fragment found in {}", path.display());
                matches.push(SourceMatch { path });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_finds_fragment_in_nested_directory() {
        let tree = TempDir::new().unwrap();
        write(tree.path(), "main.mjs", "export const main = () => 1;");
        let nested = write(
            &tree.path().join("app"),
            "math.mjs",
            "export const double = (n) => n * 2;",
        );

        let catalog = SourceCatalog::new(tree.path(), "mjs");
        let matches = catalog.find_containing("(n) => n * 2").unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, nested);
    }

    #[test]
    fn test_subdirectories_come_before_files() {
        let tree = TempDir::new().unwrap();
        // "a.mjs" sorts before the "z" directory, but the directory is
        // scanned first anyway.
        write(tree.path(), "a.mjs", "shared fragment");
        let in_subdir = write(&tree.path().join("z"), "inner.mjs", "shared fragment");

        let catalog = SourceCatalog::new(tree.path(), "mjs");
        let matches = catalog.find_containing("shared fragment").unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].path, in_subdir);
    }

    #[test]
    fn test_other_extensions_are_skipped() {
        let tree = TempDir::new().unwrap();
        write(tree.path(), "notes.txt", "the fragment");
        write(tree.path(), "module.mjs.map", "the fragment");

        let catalog = SourceCatalog::new(tree.path(), "mjs");
        let matches = catalog.find_containing("the fragment").unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_traversal_order_is_stable() {
        let tree = TempDir::new().unwrap();
        write(&tree.path().join("b"), "one.mjs", "needle");
        write(&tree.path().join("a"), "two.mjs", "needle");
        write(tree.path(), "root.mjs", "needle");

        let catalog = SourceCatalog::new(tree.path(), "mjs");
        let first = catalog.find_containing("needle").unwrap();
        let second = catalog.find_containing("needle").unwrap();
        assert_eq!(first, second);
        // directory "a" before "b", files at this level last
        assert!(first[0].path.ends_with("a/two.mjs"));
        assert!(first[1].path.ends_with("b/one.mjs"));
        assert!(first[2].path.ends_with("root.mjs"));
    }
}
