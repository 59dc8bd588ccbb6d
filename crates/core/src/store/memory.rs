//! In-memory document store and query evaluator.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_yaml::Value;

use super::{DocumentStore, NotePath, QueryEvaluator, StoreError};
use crate::frontmatter::{Frontmatter, FrontmatterParseError};
use crate::query::{self, QueryNote};
use crate::resolve::links::LinkResolver;
use crate::vault::extract_note;

/// One note held by a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryNote {
    pub frontmatter: Frontmatter,
    pub inline_fields: Vec<(String, Value)>,
    /// Normalized tags.
    pub tags: Vec<String>,
    pub modified: Option<DateTime<Utc>>,
    /// Raw wikilink targets from the body.
    pub links: Vec<String>,
}

impl MemoryNote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a note from markdown content.
    pub fn from_markdown(content: &str) -> Result<Self, FrontmatterParseError> {
        let extracted = extract_note(content)?;
        Ok(Self {
            frontmatter: extracted.frontmatter,
            inline_fields: extracted.inline_fields,
            tags: extracted.tags,
            modified: None,
            links: extracted.links,
        })
    }

    /// Set a front-matter field.
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.frontmatter.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_inline_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.inline_fields.push((name.to_string(), value.into()));
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| super::normalize_tag(t)).collect();
        self
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Every value that may carry a link: front matter, inline fields and
    /// body links.
    fn link_values(&self) -> impl Iterator<Item = Value> + '_ {
        self.frontmatter
            .fields
            .values()
            .cloned()
            .chain(self.inline_fields.iter().map(|(_, v)| v.clone()))
            .chain(self.links.iter().map(|l| Value::String(format!("[[{l}]]"))))
    }
}

/// A thread-safe in-memory store. Every mutation bumps the revision.
#[derive(Debug)]
pub struct MemoryStore {
    notes: RwLock<BTreeMap<NotePath, MemoryNote>>,
    revision: AtomicU64,
    ready: AtomicBool,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store that reports ready.
    pub fn new() -> Self {
        Self {
            notes: RwLock::new(BTreeMap::new()),
            revision: AtomicU64::new(0),
            ready: AtomicBool::new(true),
            available: AtomicBool::new(true),
        }
    }

    pub fn insert(&self, path: impl Into<NotePath>, note: MemoryNote) {
        self.write().insert(path.into(), note);
        self.bump();
    }

    /// Parse markdown and insert it.
    pub fn insert_markdown(
        &self,
        path: impl Into<NotePath>,
        content: &str,
    ) -> Result<(), FrontmatterParseError> {
        self.insert(path, MemoryNote::from_markdown(content)?);
        Ok(())
    }

    pub fn remove(&self, path: &NotePath) -> Option<MemoryNote> {
        let removed = self.write().remove(path);
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Move a note to a new path. Returns false if `from` does not exist.
    pub fn rename(&self, from: &NotePath, to: impl Into<NotePath>) -> bool {
        let mut notes = self.write();
        let Some(note) = notes.remove(from) else {
            return false;
        };
        notes.insert(to.into(), note);
        drop(notes);
        self.bump();
        true
    }

    /// Set (or replace) one front-matter field of an existing note.
    pub fn set_field(&self, path: &NotePath, name: &str, value: impl Into<Value>) -> bool {
        let mut notes = self.write();
        let Some(note) = notes.get_mut(path) else {
            return false;
        };
        note.frontmatter.fields.insert(name.to_string(), value.into());
        drop(notes);
        self.bump();
        true
    }

    pub fn get(&self, path: &NotePath) -> Option<MemoryNote> {
        self.read().get(path).cloned()
    }

    /// Replace the whole content of the store in one step.
    pub fn replace_all(&self, notes: BTreeMap<NotePath, MemoryNote>) {
        *self.write() = notes;
        self.bump();
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Make every read fail with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<NotePath, MemoryNote>> {
        self.notes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<NotePath, MemoryNote>> {
        self.notes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("store is offline".to_string()))
        }
    }

    fn with_note<T>(
        &self,
        note: &NotePath,
        f: impl FnOnce(&MemoryNote) -> T,
    ) -> Result<T, StoreError> {
        self.check_available()?;
        self.read().get(note).map(f).ok_or_else(|| StoreError::NotFound(note.clone()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_notes(&self) -> Result<Vec<NotePath>, StoreError> {
        self.check_available()?;
        Ok(self.read().keys().cloned().collect())
    }

    async fn front_matter(&self, note: &NotePath) -> Result<Frontmatter, StoreError> {
        self.with_note(note, |n| n.frontmatter.clone())
    }

    async fn inline_fields(&self, note: &NotePath) -> Result<Vec<(String, Value)>, StoreError> {
        self.with_note(note, |n| n.inline_fields.clone())
    }

    async fn tags(&self, note: &NotePath) -> Result<Vec<String>, StoreError> {
        self.with_note(note, |n| n.tags.clone())
    }

    async fn modified(&self, note: &NotePath) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.with_note(note, |n| n.modified)
    }
}

#[async_trait]
impl QueryEvaluator for MemoryStore {
    async fn evaluate(
        &self,
        query: &str,
        context: Option<&NotePath>,
    ) -> Result<Vec<NotePath>, StoreError> {
        self.check_available()?;
        let parsed = query::parse(query)?;
        let notes = self.read();
        let resolver = LinkResolver::from_notes(notes.keys());
        let snapshot: Vec<QueryNote> = notes
            .iter()
            .map(|(path, note)| QueryNote {
                path: path.clone(),
                tags: note.tags.clone(),
                links: note
                    .link_values()
                    .flat_map(|v| resolver.references_in(&v))
                    .collect::<HashSet<_>>(),
            })
            .collect();
        Ok(query::select(&parsed, &snapshot, context, &resolver))
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert("Projects/Alpha.md", MemoryNote::new().with_tags(&["project"]));
        store.insert(
            "Tasks/One.md",
            MemoryNote::new().with_field("parent", "[[Alpha]]").with_tags(&["task"]),
        );
        store
            .insert_markdown("Tasks/Two.md", "---\ntags: [task]\n---\nparent:: [[Projects/Alpha]]\n")
            .unwrap();
        store
    }

    #[test]
    fn test_insert_markdown_rejects_broken_frontmatter() {
        let store = MemoryStore::new();
        let before = store.revision();
        assert!(store.insert_markdown("Bad.md", "---\ntags: [task\n---\n").is_err());
        assert_eq!(store.revision(), before);
    }

    #[tokio::test]
    async fn test_revision_bumps_on_mutation() {
        let store = store();
        let before = store.revision();
        store.set_field(&NotePath::new("Tasks/One.md"), "done", true);
        assert_eq!(store.revision(), before + 1);
        assert!(!store.set_field(&NotePath::new("Missing.md"), "x", 1));
        assert_eq!(store.revision(), before + 1);
    }

    #[tokio::test]
    async fn test_evaluate_links_to_context() {
        let store = store();
        let alpha = NotePath::new("Projects/Alpha.md");
        let hits = store.evaluate("[[]]", Some(&alpha)).await.unwrap();
        assert_eq!(hits, vec![NotePath::new("Tasks/One.md"), NotePath::new("Tasks/Two.md")]);
    }

    #[tokio::test]
    async fn test_evaluate_folder_and_tag() {
        let store = store();
        let hits = store.evaluate("\"Tasks\" and #task", None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(store.evaluate("\"Tasks", None).await.is_err());
    }

    #[tokio::test]
    async fn test_rename_and_remove() {
        let store = store();
        assert!(store.rename(&NotePath::new("Tasks/One.md"), "Tasks/Uno.md"));
        assert!(store.get(&NotePath::new("Tasks/Uno.md")).is_some());
        assert!(store.remove(&NotePath::new("Tasks/Uno.md")).is_some());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = store();
        store.set_available(false);
        assert!(matches!(store.list_notes().await, Err(StoreError::Unavailable(_))));
    }
}
