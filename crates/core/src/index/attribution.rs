//! Schema attribution: which fields apply to which note.
//!
//! Fields are collected from five tiers in strict priority order and merged
//! by name, first tier wins:
//!
//! 1. templates declared on the note under the template key
//! 2. templates bound to one of the note's tags
//! 3. templates bound to a query the note matches
//! 4. the global template, when tiers 1 to 3 matched nothing
//! 5. preset fields, when tiers 1 to 4 produced no field

use std::collections::{BTreeMap, HashMap};

use serde_yaml::Value;
use thiserror::Error;

use super::types::{AttributedField, SchemaEntry, Tier};
use crate::fields::Field;
use crate::resolve::links::LinkResolver;
use crate::store::{self, DocumentStore, FieldValues, NotePath, QueryEvaluator, StoreError};
use crate::templates::TemplateRegistry;

/// A single note whose schema could not be resolved. The note is skipped.
#[derive(Debug, Clone, Error)]
pub enum AttributionError {
    #[error("failed to read note: {0}")]
    Store(String),

    #[error("invalid template declaration '{key}': {message}")]
    InvalidDeclaration { key: String, message: String },
}

impl From<StoreError> for AttributionError {
    fn from(e: StoreError) -> Self {
        Self::Store(e.to_string())
    }
}

/// Inputs to attribution that come from configuration.
#[derive(Debug, Clone)]
pub struct SchemaSettings {
    /// Vault-relative folder holding template notes.
    pub templates_dir: String,
    /// Front-matter key declaring a note's templates.
    pub template_alias: String,
    pub global_template: Option<String>,
    pub presets: Vec<Field>,
    /// `(template, query)` bindings in addition to those declared by
    /// templates.
    pub template_queries: Vec<(String, String)>,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            templates_dir: "templates".to_string(),
            template_alias: "fileClass".to_string(),
            global_template: None,
            presets: Vec::new(),
            template_queries: Vec::new(),
        }
    }
}

/// Per-note schemas for the whole collection.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    entries: BTreeMap<NotePath, SchemaEntry>,
    skipped: BTreeMap<NotePath, String>,
}

impl SchemaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the schema of every note outside the templates directory.
    ///
    /// A note that fails is skipped and remembered in [`Self::skipped`]; only
    /// a failure to list the collection aborts the rebuild.
    pub async fn rebuild(
        store: &dyn DocumentStore,
        queries: &dyn QueryEvaluator,
        registry: &TemplateRegistry,
        settings: &SchemaSettings,
    ) -> Result<Self, StoreError> {
        let notes = store.list_notes().await?;
        let links = LinkResolver::from_notes(&notes);
        let query_matches = evaluate_bindings(queries, registry, settings).await;

        let mut index = Self::new();
        for note in notes.iter().filter(|n| !n.is_inside(&settings.templates_dir)) {
            let matched = query_matches.get(note).map(Vec::as_slice).unwrap_or(&[]);
            match attribute_note(store, note, matched, registry, settings, &links).await {
                Ok(entry) => {
                    index.entries.insert(note.clone(), entry);
                }
                Err(e) => {
                    tracing::warn!(note = %note, error = %e, "Skipping note");
                    index.skipped.insert(note.clone(), e.to_string());
                }
            }
        }
        tracing::debug!(notes = index.entries.len(), skipped = index.skipped.len(), "Rebuilt schema index");
        Ok(index)
    }

    /// Resolve one note's schema. Returns `Ok(None)` for notes inside the
    /// templates directory.
    pub async fn resolve_note(
        store: &dyn DocumentStore,
        queries: &dyn QueryEvaluator,
        registry: &TemplateRegistry,
        settings: &SchemaSettings,
        note: &NotePath,
    ) -> Result<Option<SchemaEntry>, AttributionError> {
        if note.is_inside(&settings.templates_dir) {
            return Ok(None);
        }
        let notes = store.list_notes().await?;
        let links = LinkResolver::from_notes(&notes);
        let query_matches = evaluate_bindings(queries, registry, settings).await;
        let matched = query_matches.get(note).map(Vec::as_slice).unwrap_or(&[]);
        attribute_note(store, note, matched, registry, settings, &links).await.map(Some)
    }

    pub fn entry(&self, note: &NotePath) -> Option<&SchemaEntry> {
        self.entries.get(note)
    }

    /// Fields of `note`, in priority order.
    pub fn fields_for(&self, note: &NotePath) -> Vec<Field> {
        self.entries
            .get(note)
            .map(|e| e.fields().cloned().collect())
            .unwrap_or_default()
    }

    pub fn matched_templates(&self, note: &NotePath) -> &[String] {
        self.entries.get(note).map(|e| e.matched.as_slice()).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NotePath, &SchemaEntry)> {
        self.entries.iter()
    }

    pub fn notes(&self) -> impl Iterator<Item = &NotePath> {
        self.entries.keys()
    }

    /// Replace (or add) one entry.
    pub fn insert(&mut self, note: NotePath, entry: SchemaEntry) {
        self.skipped.remove(&note);
        self.entries.insert(note, entry);
    }

    pub fn remove(&mut self, note: &NotePath) -> Option<SchemaEntry> {
        self.skipped.remove(note);
        self.entries.remove(note)
    }

    pub fn mark_skipped(&mut self, note: NotePath, reason: String) {
        self.entries.remove(&note);
        self.skipped.insert(note, reason);
    }

    /// Notes whose resolution failed, with the reason.
    pub fn skipped(&self) -> &BTreeMap<NotePath, String> {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluate every query binding once. Returns note → bound templates, in
/// binding order. A failing query is logged and ignored.
async fn evaluate_bindings(
    queries: &dyn QueryEvaluator,
    registry: &TemplateRegistry,
    settings: &SchemaSettings,
) -> HashMap<NotePath, Vec<String>> {
    let mut bindings = registry.query_bindings();
    bindings.extend(settings.template_queries.iter().cloned());

    let mut out: HashMap<NotePath, Vec<String>> = HashMap::new();
    for (template, query) in bindings {
        if !registry.contains(&template) {
            tracing::warn!(template = %template, "Query bound to unknown template");
            continue;
        }
        match queries.evaluate(&query, None).await {
            Ok(notes) => {
                for note in notes {
                    let bound = out.entry(note).or_default();
                    if !bound.contains(&template) {
                        bound.push(template.clone());
                    }
                }
            }
            Err(e) => tracing::warn!(template = %template, query = %query, error = %e, "Template query failed"),
        }
    }
    out
}

async fn attribute_note(
    store: &dyn DocumentStore,
    note: &NotePath,
    query_templates: &[String],
    registry: &TemplateRegistry,
    settings: &SchemaSettings,
    links: &LinkResolver,
) -> Result<SchemaEntry, AttributionError> {
    let values = store::field_values(store, note).await?;
    let tags = store.tags(note).await?;
    let declared = declared_templates(&values, &settings.template_alias)?;
    let tags: Vec<String> = tags.iter().map(|t| store::normalize_tag(t)).collect();

    let mut entry = attribute(&declared, &tags, query_templates, registry, settings);
    entry.references = values
        .iter()
        .filter(|(name, _)| *name != &settings.template_alias)
        .map(|(name, value)| (name.clone(), links.references_in(value)))
        .filter(|(_, refs)| !refs.is_empty())
        .collect();
    Ok(entry)
}

/// Template names declared under `alias`: a string, a comma-separated
/// string, a wikilink or a list of those.
pub fn declared_templates(values: &FieldValues, alias: &str) -> Result<Vec<String>, AttributionError> {
    let invalid = |message: &str| AttributionError::InvalidDeclaration {
        key: alias.to_string(),
        message: message.to_string(),
    };
    let names = match values.get(alias) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => s.split(',').map(template_name).collect(),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|v| v.as_str().map(template_name).ok_or_else(|| invalid("list entries must be names")))
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(invalid("expected a template name or a list of names")),
    };
    Ok(names.into_iter().filter(|n| !n.is_empty()).collect())
}

fn template_name(raw: &str) -> String {
    let s = raw.trim().trim_start_matches("[[").trim_end_matches("]]");
    let s = s.split('|').next().unwrap_or(s);
    let s = s.rsplit('/').next().unwrap_or(s);
    s.trim_end_matches(".md").trim().to_string()
}

/// The five-tier merge for one note. Pure: all inputs are already resolved.
pub fn attribute(
    declared: &[String],
    tags: &[String],
    query_templates: &[String],
    registry: &TemplateRegistry,
    settings: &SchemaSettings,
) -> SchemaEntry {
    let mut entry = SchemaEntry::default();

    for name in declared {
        add_template(&mut entry, registry, name, Tier::InnerTemplate);
    }
    for tag in tags {
        for template in registry.bound_to_tag(tag) {
            add_template(&mut entry, registry, template.name(), Tier::Tag);
        }
    }
    for name in query_templates {
        add_template(&mut entry, registry, name, Tier::Query);
    }

    if entry.matched.is_empty()
        && let Some(global) = settings.global_template.as_deref()
    {
        add_template(&mut entry, registry, global, Tier::Global);
    }

    if entry.fields.is_empty() {
        for field in &settings.presets {
            push_field(&mut entry, field, Tier::Preset);
        }
    }
    entry
}

fn add_template(entry: &mut SchemaEntry, registry: &TemplateRegistry, name: &str, tier: Tier) {
    let Some(template) = registry.get(name) else {
        tracing::debug!(template = %name, "Unknown template");
        return;
    };
    if !entry.matched.iter().any(|m| m == name) {
        entry.matched.push(name.to_string());
    }
    for field in &template.attributes {
        push_field(entry, field, tier);
    }
}

fn push_field(entry: &mut SchemaEntry, field: &Field, tier: Tier) {
    if entry.fields.iter().any(|a| a.field.name == field.name) {
        return;
    }
    entry.fields.push(AttributedField { field: field.clone(), tier });
}
