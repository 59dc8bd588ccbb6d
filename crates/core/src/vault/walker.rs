//! Recursive vault directory walker.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use walkdir::WalkDir;

use crate::store::NotePath;

#[derive(Debug, Error)]
pub enum VaultWalkerError {
    #[error("vault root does not exist: {0}")]
    MissingRoot(String),

    #[error("failed to walk vault directory {0}: {1}")]
    WalkError(String, #[source] walkdir::Error),

    #[error("failed to read file metadata {0}: {1}")]
    MetadataError(String, #[source] std::io::Error),
}

/// A markdown file discovered in the vault.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub absolute_path: PathBuf,
    /// Vault-relative note path.
    pub note: NotePath,
    pub modified: DateTime<Utc>,
}

/// Walker for discovering markdown notes in a vault.
#[derive(Debug)]
pub struct VaultWalker {
    root: PathBuf,
    /// Vault-relative folders that are skipped entirely.
    excluded_folders: Vec<PathBuf>,
}

impl VaultWalker {
    pub fn new(root: &Path) -> Result<Self, VaultWalkerError> {
        Self::with_exclusions(root, Vec::new())
    }

    /// Create a walker that skips the given folders.
    ///
    /// Absolute exclusions under the root are made relative to it.
    pub fn with_exclusions(
        root: &Path,
        excluded_folders: Vec<PathBuf>,
    ) -> Result<Self, VaultWalkerError> {
        let root = root
            .canonicalize()
            .map_err(|_| VaultWalkerError::MissingRoot(root.display().to_string()))?;

        let excluded_folders = excluded_folders
            .into_iter()
            .map(|p| match p.strip_prefix(&root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => p,
            })
            .collect();

        Ok(Self { root, excluded_folders })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All markdown files, sorted by note path.
    pub fn walk(&self) -> Result<Vec<WalkedFile>, VaultWalkerError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e))
        {
            let entry = entry.map_err(|e| {
                VaultWalkerError::WalkError(self.root.display().to_string(), e)
            })?;

            let path = entry.path();
            if !path.is_file() || !is_markdown_file(path) {
                continue;
            }

            let metadata = path.metadata().map_err(|e| {
                VaultWalkerError::MetadataError(path.display().to_string(), e)
            })?;

            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let modified = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);

            files.push(WalkedFile {
                absolute_path: path.to_path_buf(),
                note: NotePath::new(relative.to_string_lossy()),
                modified: modified.into(),
            });
        }

        files.sort_by(|a, b| a.note.cmp(&b.note));
        Ok(files)
    }

    fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }

        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            return true;
        }
        if matches!(name.as_ref(), "node_modules" | "target") {
            return true;
        }

        match entry.path().strip_prefix(&self.root) {
            Ok(relative) => self.excluded_folders.iter().any(|ex| relative.starts_with(ex)),
            Err(_) => false,
        }
    }
}

fn is_markdown_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e == "md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_vault() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("note1.md"), "# Note 1").unwrap();
        fs::write(root.join("note2.md"), "# Note 2").unwrap();
        fs::create_dir(root.join("fileClasses")).unwrap();
        fs::write(root.join("fileClasses/Book.md"), "---\nfields: []\n---\n").unwrap();
        fs::create_dir(root.join(".obsidian")).unwrap();
        fs::write(root.join(".obsidian/workspace.md"), "hidden").unwrap();
        fs::write(root.join("readme.txt"), "Not markdown").unwrap();

        dir
    }

    #[test]
    fn test_walk_finds_markdown_files() {
        let vault = create_test_vault();
        let files = VaultWalker::new(vault.path()).unwrap().walk().unwrap();

        let notes: Vec<_> = files.iter().map(|f| f.note.as_str()).collect();
        assert_eq!(notes, vec!["fileClasses/Book.md", "note1.md", "note2.md"]);
    }

    #[test]
    fn test_walk_with_exclusions() {
        let vault = create_test_vault();
        let walker =
            VaultWalker::with_exclusions(vault.path(), vec![PathBuf::from("fileClasses")])
                .unwrap();
        let files = walker.walk().unwrap();

        assert_eq!(files.len(), 2);
        assert!(!files.iter().any(|f| f.note.is_inside("fileClasses")));
    }

    #[test]
    fn test_missing_root() {
        let result = VaultWalker::new(Path::new("/nonexistent/path"));
        assert!(matches!(result.unwrap_err(), VaultWalkerError::MissingRoot(_)));
    }
}
