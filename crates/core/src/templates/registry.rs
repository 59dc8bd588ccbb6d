//! Template registry: loading and single-parent inheritance.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::definition::{Template, TemplateDefinition};
use super::errors::TemplateError;
use crate::fields::Field;
use crate::store::{DocumentStore, NotePath, StoreError};

/// All templates known to the collection, keyed by name.
///
/// Built wholesale by [`TemplateRegistry::load_all`] or
/// [`TemplateRegistry::from_definitions`]; never patched in place.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Arc<Template>>,
    by_path: HashMap<NotePath, String>,
    /// Problems found while loading, kept for reporting.
    problems: Vec<TemplateError>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every template note under `templates_dir`.
    ///
    /// A template that fails to read or parse is skipped with a warning. Only
    /// a failure to list the collection is returned.
    pub async fn load_all(
        store: &dyn DocumentStore,
        templates_dir: &str,
    ) -> Result<Self, StoreError> {
        let mut definitions = Vec::new();
        let mut problems = Vec::new();

        for path in store.list_notes().await? {
            if !path.is_inside(templates_dir) {
                continue;
            }
            let fm = match store.front_matter(&path).await {
                Ok(fm) => fm,
                Err(e) => {
                    tracing::warn!(template = %path, error = %e, "Skipping unreadable template");
                    problems.push(TemplateError::Unreadable { path, message: e.to_string() });
                    continue;
                }
            };
            match TemplateDefinition::from_frontmatter(path.clone(), &fm) {
                Ok(def) => definitions.push(def),
                Err(e) => {
                    tracing::warn!(template = %path, error = %e, "Skipping malformed template");
                    problems.push(e);
                }
            }
        }

        let mut registry = Self::from_definitions(definitions);
        problems.append(&mut registry.problems);
        registry.problems = problems;
        tracing::debug!(count = registry.len(), "Loaded templates");
        Ok(registry)
    }

    /// Build a registry from already-parsed definitions, resolving
    /// inheritance for each one.
    pub fn from_definitions(definitions: impl IntoIterator<Item = TemplateDefinition>) -> Self {
        let mut problems = Vec::new();
        let mut defs: BTreeMap<String, TemplateDefinition> = BTreeMap::new();
        for def in definitions {
            if defs.contains_key(&def.name) {
                tracing::warn!(template = %def.name, path = %def.path, "Duplicate template name, keeping the first");
                problems.push(TemplateError::Duplicate { name: def.name.clone(), path: def.path });
                continue;
            }
            defs.insert(def.name.clone(), def);
        }

        let mut templates = BTreeMap::new();
        let mut by_path = HashMap::new();
        for (name, def) in &defs {
            let (ancestors, problem) = walk_ancestors(&defs, name);
            if let Some(problem) = problem {
                tracing::warn!(template = %name, error = %problem, "Ancestor chain cut short");
                problems.push(problem);
            }
            let attributes = effective_attributes(&defs, def, &ancestors);
            by_path.insert(def.path.clone(), name.clone());
            templates.insert(
                name.clone(),
                Arc::new(Template { definition: def.clone(), ancestors, attributes }),
            );
        }

        Self { templates, by_path, problems }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    pub fn by_path(&self, path: &NotePath) -> Option<&Arc<Template>> {
        self.by_path.get(path).and_then(|name| self.templates.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Ancestor names of `name`, nearest first. Empty for unknown templates.
    pub fn resolve_ancestors(&self, name: &str) -> Vec<String> {
        self.templates.get(name).map(|t| t.ancestors.clone()).unwrap_or_default()
    }

    /// Templates that declare `name` as their direct parent.
    pub fn children_of(&self, name: &str) -> Vec<&Arc<Template>> {
        self.templates.values().filter(|t| t.parent() == Some(name)).collect()
    }

    /// Templates bound to a normalized tag, in name order.
    pub fn bound_to_tag(&self, tag: &str) -> Vec<&Arc<Template>> {
        self.templates
            .values()
            .filter(|t| t.definition.tags.iter().any(|b| b == tag))
            .collect()
    }

    /// `(template, query)` pairs declared by templates.
    pub fn query_bindings(&self) -> Vec<(String, String)> {
        self.templates
            .values()
            .flat_map(|t| {
                t.definition.queries.iter().map(|q| (t.name().to_string(), q.clone()))
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.templates.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn problems(&self) -> &[TemplateError] {
        &self.problems
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Walk the parent chain of `name`. Stops at a missing parent declaration,
/// an unknown parent, or a name already seen (the template itself included).
fn walk_ancestors(
    defs: &BTreeMap<String, TemplateDefinition>,
    name: &str,
) -> (Vec<String>, Option<TemplateError>) {
    let mut chain: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::from([name]);
    let mut current = defs.get(name);

    while let Some(def) = current {
        let Some(parent) = def.parent.as_deref() else {
            return (chain, None);
        };
        if seen.contains(parent) {
            let problem =
                TemplateError::Cycle { template: name.to_string(), at: parent.to_string() };
            return (chain, Some(problem));
        }
        let Some(parent_def) = defs.get(parent) else {
            let problem = TemplateError::UnknownParent {
                template: def.name.clone(),
                parent: parent.to_string(),
            };
            return (chain, Some(problem));
        };
        seen.insert(parent);
        chain.push(parent.to_string());
        current = Some(parent_def);
    }
    (chain, None)
}

fn effective_attributes(
    defs: &BTreeMap<String, TemplateDefinition>,
    def: &TemplateDefinition,
    ancestors: &[String],
) -> Vec<Field> {
    let mut attributes = def.fields.clone();
    let mut excluded: HashSet<&str> = def.excludes.iter().map(String::as_str).collect();

    for ancestor in ancestors.iter().filter_map(|a| defs.get(a)) {
        for field in &ancestor.fields {
            if excluded.contains(field.name.as_str())
                || attributes.iter().any(|f| f.name == field.name)
            {
                continue;
            }
            attributes.push(field.clone());
        }
        excluded.extend(ancestor.excludes.iter().map(String::as_str));
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldKind, FieldOwner};

    fn def(name: &str, parent: Option<&str>, fields: &[&str]) -> TemplateDefinition {
        let mut d = TemplateDefinition::new(name, NotePath::new(format!("T/{name}.md")));
        d.parent = parent.map(str::to_string);
        d.fields = fields
            .iter()
            .map(|f| Field::new(*f, FieldKind::Boolean, FieldOwner::Template(name.into())))
            .collect();
        d
    }

    #[test]
    fn test_three_template_cycle_terminates() {
        let reg = TemplateRegistry::from_definitions([
            def("A", Some("B"), &[]),
            def("B", Some("C"), &[]),
            def("C", Some("A"), &[]),
        ]);
        assert_eq!(reg.resolve_ancestors("A"), vec!["B", "C"]);
        assert_eq!(reg.resolve_ancestors("C"), vec!["A", "B"]);
        assert!(reg.problems().iter().all(|p| matches!(p, TemplateError::Cycle { .. })));
    }

    #[test]
    fn test_unknown_parent_ends_chain() {
        let reg = TemplateRegistry::from_definitions([def("Novel", Some("Missing"), &["x"])]);
        assert!(reg.resolve_ancestors("Novel").is_empty());
        assert_eq!(reg.get("Novel").unwrap().attributes.len(), 1);
        assert!(matches!(reg.problems()[0], TemplateError::UnknownParent { .. }));
    }

    #[test]
    fn test_attributes_override_by_name() {
        let reg = TemplateRegistry::from_definitions([
            def("Item", None, &["sku", "title"]),
            def("Book", Some("Item"), &["title", "pages"]),
            def("Novel", Some("Book"), &["genre"]),
        ]);
        let novel = reg.get("Novel").unwrap();
        let names: Vec<_> = novel.attributes.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["genre", "title", "pages", "sku"]);
        assert_eq!(novel.field("title").unwrap().owner, FieldOwner::Template("Book".into()));
    }

    #[test]
    fn test_excludes_accumulate_along_chain() {
        let mut book = def("Book", Some("Item"), &["pages"]);
        book.excludes = vec!["sku".into()];
        let reg = TemplateRegistry::from_definitions([
            def("Item", None, &["sku", "title"]),
            book,
            def("Novel", Some("Book"), &[]),
        ]);
        let names: Vec<_> =
            reg.get("Novel").unwrap().attributes.iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["pages", "title"]);
    }

    #[test]
    fn test_children_and_tag_bindings() {
        let mut draft = def("Draft", None, &[]);
        draft.tags = vec!["draft".into()];
        let reg = TemplateRegistry::from_definitions([
            def("Book", None, &[]),
            def("Novel", Some("Book"), &[]),
            draft,
        ]);
        let children: Vec<_> = reg.children_of("Book").iter().map(|t| t.name()).collect();
        assert_eq!(children, vec!["Novel"]);
        assert_eq!(reg.bound_to_tag("draft").len(), 1);
        assert!(reg.by_path(&NotePath::new("T/Draft.md")).is_some());
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let mut second = def("Book", None, &["other"]);
        second.path = NotePath::new("T/sub/Book.md");
        let reg = TemplateRegistry::from_definitions([def("Book", None, &["pages"]), second]);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("Book").unwrap().attributes[0].name, "pages");
    }
}
