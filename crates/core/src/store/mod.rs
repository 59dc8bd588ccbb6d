//! Document store and query evaluator collaborators.
//!
//! The index never reads files itself. It talks to a [`DocumentStore`] for
//! note metadata and to a [`QueryEvaluator`] for source selections. Two
//! adapters ship with the crate:
//! - [`MemoryStore`]: an in-memory store, used by tests and embedders
//! - [`FsVault`]: a snapshot of a markdown vault on disk

pub mod fs;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frontmatter::Frontmatter;

pub use fs::FsVault;
pub use memory::{MemoryNote, MemoryStore};

/// Field values of a note keyed by field name, front matter first.
pub type FieldValues = BTreeMap<String, serde_yaml::Value>;

/// Vault-relative path of a note, using `/` separators (e.g. `Books/Dune.md`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotePath(String);

impl NotePath {
    pub fn new(path: impl Into<String>) -> Self {
        let raw: String = path.into();
        let normalized = raw.replace('\\', "/");
        Self(normalized.trim_start_matches("./").trim_start_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path without the `.md` extension, as used inside wikilinks.
    pub fn without_extension(&self) -> &str {
        self.0.strip_suffix(".md").unwrap_or(&self.0)
    }

    /// File name without directory and extension.
    pub fn stem(&self) -> &str {
        let no_ext = self.without_extension();
        no_ext.rsplit('/').next().unwrap_or(no_ext)
    }

    /// Wikilink pointing at this note.
    pub fn to_link(&self) -> String {
        format!("[[{}]]", self.without_extension())
    }

    /// Whether the note lives inside `dir` (vault-relative, any depth).
    pub fn is_inside(&self, dir: &str) -> bool {
        let dir = dir.trim_matches('/');
        if dir.is_empty() {
            return true;
        }
        self.0
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for NotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NotePath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note not found: {0}")]
    NotFound(NotePath),

    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read note {path}: {message}")]
    Read { path: NotePath, message: String },

    #[error("query failed: {0}")]
    Query(#[from] crate::query::QueryError),
}

/// Read access to the notes of a collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every note currently known to the store, sorted by path.
    async fn list_notes(&self) -> Result<Vec<NotePath>, StoreError>;

    async fn front_matter(&self, note: &NotePath) -> Result<Frontmatter, StoreError>;

    /// Inline `key:: value` fields found in the note body.
    async fn inline_fields(
        &self,
        _note: &NotePath,
    ) -> Result<Vec<(String, serde_yaml::Value)>, StoreError> {
        Ok(Vec::new())
    }

    /// Tags without the leading `#`.
    async fn tags(&self, note: &NotePath) -> Result<Vec<String>, StoreError>;

    async fn modified(&self, note: &NotePath) -> Result<Option<DateTime<Utc>>, StoreError>;
}

/// Evaluates source selections such as `"Books" and #novel`.
#[async_trait]
pub trait QueryEvaluator: Send + Sync {
    /// Notes matching `query`; `context` is the note the query is evaluated for.
    async fn evaluate(
        &self,
        query: &str,
        context: Option<&NotePath>,
    ) -> Result<Vec<NotePath>, StoreError>;

    fn is_ready(&self) -> bool;

    /// Monotonic counter bumped whenever the underlying data changes.
    fn revision(&self) -> u64;
}

/// Merged field values of a note: front matter first, then inline fields
/// whose names the front matter does not already define.
pub async fn field_values(
    store: &dyn DocumentStore,
    note: &NotePath,
) -> Result<FieldValues, StoreError> {
    let fm = store.front_matter(note).await?;
    let mut values: FieldValues = fm.fields.into_iter().collect();
    for (name, value) in store.inline_fields(note).await? {
        values.entry(name).or_insert(value);
    }
    Ok(values)
}

/// Normalize a tag for comparison: no leading `#`, lowercase.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_path_normalization() {
        assert_eq!(NotePath::new("./Books/Dune.md").as_str(), "Books/Dune.md");
        assert_eq!(NotePath::new("Books\\Dune.md").as_str(), "Books/Dune.md");
    }

    #[test]
    fn test_note_path_parts() {
        let p = NotePath::new("Books/Dune.md");
        assert_eq!(p.without_extension(), "Books/Dune");
        assert_eq!(p.stem(), "Dune");
        assert_eq!(p.to_link(), "[[Books/Dune]]");
    }

    #[test]
    fn test_is_inside() {
        let p = NotePath::new("fileClasses/Book.md");
        assert!(p.is_inside("fileClasses"));
        assert!(p.is_inside("fileClasses/"));
        assert!(!p.is_inside("fileClass"));
        assert!(!NotePath::new("Books/Dune.md").is_inside("fileClasses"));
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("#Draft"), "draft");
        assert_eq!(normalize_tag("book/novel"), "book/novel");
    }
}
