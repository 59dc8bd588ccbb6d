//! Filesystem-backed store: a snapshot of a markdown vault.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_yaml::Value;

use super::memory::{MemoryNote, MemoryStore};
use super::{DocumentStore, NotePath, QueryEvaluator, StoreError};
use crate::frontmatter::Frontmatter;
use crate::vault::{VaultWalker, VaultWalkerError};

/// A markdown vault on disk, loaded into memory.
///
/// The snapshot only changes when [`FsVault::refresh`] or
/// [`FsVault::reload_note`] is called; each of those bumps the revision.
/// Notes whose front matter cannot be parsed are still listed, but reading
/// them fails with [`StoreError::Read`].
#[derive(Debug)]
pub struct FsVault {
    walker: VaultWalker,
    notes: MemoryStore,
    broken: RwLock<HashMap<NotePath, String>>,
}

impl FsVault {
    /// Scan the vault at `root`, skipping `excluded` folders.
    pub fn open(root: &Path, excluded: Vec<PathBuf>) -> Result<Self, VaultWalkerError> {
        let walker = VaultWalker::with_exclusions(root, excluded)?;
        let vault = Self {
            walker,
            notes: MemoryStore::new(),
            broken: RwLock::new(HashMap::new()),
        };
        vault.refresh()?;
        Ok(vault)
    }

    pub fn root(&self) -> &Path {
        self.walker.root()
    }

    /// Rescan the whole vault. Returns the number of notes found.
    pub fn refresh(&self) -> Result<usize, VaultWalkerError> {
        let mut notes = BTreeMap::new();
        let mut broken = HashMap::new();

        for file in self.walker.walk()? {
            match read_note(&file.absolute_path) {
                Ok(note) => {
                    notes.insert(file.note, note.with_modified(file.modified));
                }
                Err(message) => {
                    tracing::warn!(note = %file.note, error = %message, "Unreadable note");
                    notes.insert(file.note.clone(), MemoryNote::new());
                    broken.insert(file.note, message);
                }
            }
        }

        let count = notes.len();
        self.notes.replace_all(notes);
        *self.broken.write().unwrap_or_else(PoisonError::into_inner) = broken;
        tracing::debug!(root = %self.root().display(), count, "Scanned vault");
        Ok(count)
    }

    /// Re-read a single note from disk, or drop it if the file is gone.
    pub fn reload_note(&self, note: &NotePath) -> Result<(), StoreError> {
        let absolute = self.root().join(note.as_str());
        let mut broken = self.broken.write().unwrap_or_else(PoisonError::into_inner);
        broken.remove(note);

        if !absolute.is_file() {
            self.notes.remove(note);
            return Ok(());
        }
        let modified: DateTime<Utc> = fs::metadata(&absolute)
            .and_then(|m| m.modified())
            .map(Into::into)
            .map_err(|e| StoreError::Read { path: note.clone(), message: e.to_string() })?;

        match read_note(&absolute) {
            Ok(parsed) => self.notes.insert(note.clone(), parsed.with_modified(modified)),
            Err(message) => {
                self.notes.insert(note.clone(), MemoryNote::new().with_modified(modified));
                broken.insert(note.clone(), message);
            }
        }
        Ok(())
    }

    /// Notes that failed to parse, with the reason.
    pub fn broken_notes(&self) -> Vec<(NotePath, String)> {
        let broken = self.broken.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = broken.iter().map(|(p, m)| (p.clone(), m.clone())).collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    fn check(&self, note: &NotePath) -> Result<(), StoreError> {
        let broken = self.broken.read().unwrap_or_else(PoisonError::into_inner);
        match broken.get(note) {
            Some(message) => Err(StoreError::Read { path: note.clone(), message: message.clone() }),
            None => Ok(()),
        }
    }
}

fn read_note(path: &Path) -> Result<MemoryNote, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    MemoryNote::from_markdown(&content).map_err(|e| e.to_string())
}

#[async_trait]
impl DocumentStore for FsVault {
    async fn list_notes(&self) -> Result<Vec<NotePath>, StoreError> {
        self.notes.list_notes().await
    }

    async fn front_matter(&self, note: &NotePath) -> Result<Frontmatter, StoreError> {
        self.check(note)?;
        self.notes.front_matter(note).await
    }

    async fn inline_fields(&self, note: &NotePath) -> Result<Vec<(String, Value)>, StoreError> {
        self.check(note)?;
        self.notes.inline_fields(note).await
    }

    async fn tags(&self, note: &NotePath) -> Result<Vec<String>, StoreError> {
        self.check(note)?;
        self.notes.tags(note).await
    }

    async fn modified(&self, note: &NotePath) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.notes.modified(note).await
    }
}

#[async_trait]
impl QueryEvaluator for FsVault {
    async fn evaluate(
        &self,
        query: &str,
        context: Option<&NotePath>,
    ) -> Result<Vec<NotePath>, StoreError> {
        self.notes.evaluate(query, context).await
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn revision(&self) -> u64 {
        self.notes.revision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vault() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("Books")).unwrap();
        fs::create_dir_all(root.join("Archive")).unwrap();
        fs::write(root.join("Books/Dune.md"), "---\nauthor: \"[[Herbert]]\"\n---\n#novel\n").unwrap();
        fs::write(root.join("Herbert.md"), "# Frank Herbert\n").unwrap();
        fs::write(root.join("Broken.md"), "---\nkey: [unclosed\n---\n").unwrap();
        fs::write(root.join("Archive/Old.md"), "old").unwrap();
        tmp
    }

    #[tokio::test]
    async fn test_open_scans_vault() {
        let tmp = vault();
        let vault = FsVault::open(tmp.path(), vec![PathBuf::from("Archive")]).unwrap();
        let notes = vault.list_notes().await.unwrap();
        assert_eq!(
            notes,
            vec![NotePath::new("Books/Dune.md"), NotePath::new("Broken.md"), NotePath::new("Herbert.md")]
        );
        let dune = NotePath::new("Books/Dune.md");
        assert_eq!(vault.tags(&dune).await.unwrap(), vec!["novel"]);
        assert!(vault.modified(&dune).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_broken_note_fails_to_read() {
        let tmp = vault();
        let vault = FsVault::open(tmp.path(), vec![]).unwrap();
        let err = vault.front_matter(&NotePath::new("Broken.md")).await.unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
        assert_eq!(vault.broken_notes().len(), 1);
    }

    #[tokio::test]
    async fn test_reload_note_picks_up_edits() {
        let tmp = vault();
        let vault = FsVault::open(tmp.path(), vec![]).unwrap();
        let before = vault.revision();
        fs::write(tmp.path().join("Herbert.md"), "---\nborn: 1920\n---\n").unwrap();
        vault.reload_note(&NotePath::new("Herbert.md")).unwrap();
        let fm = vault.front_matter(&NotePath::new("Herbert.md")).await.unwrap();
        assert_eq!(fm.get("born"), Some(&Value::Number(1920.into())));
        assert!(vault.revision() > before);

        fs::remove_file(tmp.path().join("Herbert.md")).unwrap();
        vault.reload_note(&NotePath::new("Herbert.md")).unwrap();
        assert_eq!(vault.len(), 3);
    }

    #[tokio::test]
    async fn test_query_through_vault() {
        let tmp = vault();
        let vault = FsVault::open(tmp.path(), vec![]).unwrap();
        let hits = vault.evaluate("[[Herbert]]", None).await.unwrap();
        assert_eq!(hits, vec![NotePath::new("Books/Dune.md")]);
    }
}
