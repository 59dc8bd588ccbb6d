//! Template definitions parsed from template notes.

use serde_yaml::Value;

use super::errors::TemplateError;
use crate::fields::{Field, FieldOwner};
use crate::frontmatter::Frontmatter;
use crate::store::{NotePath, normalize_tag};

/// Front-matter keys a template note may carry.
pub const RESERVED_KEYS: &[&str] = &[
    "extends",
    "fields",
    "map_with_tag",
    "mapWithTag",
    "tag_names",
    "tagNames",
    "queries",
    "excludes",
    "icon",
];

/// A template as declared in its own note, before inheritance.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDefinition {
    /// Template name (file stem of the template note).
    pub name: String,
    pub path: NotePath,
    /// Parent template name from `extends`.
    pub parent: Option<String>,
    /// Fields declared directly on this template, in file order.
    pub fields: Vec<Field>,
    /// Normalized tags that bind notes to this template.
    pub tags: Vec<String>,
    /// Queries whose matches are bound to this template.
    pub queries: Vec<String>,
    /// Inherited field names this template drops.
    pub excludes: Vec<String>,
    pub icon: Option<String>,
}

impl TemplateDefinition {
    pub fn new(name: impl Into<String>, path: NotePath) -> Self {
        Self {
            name: name.into(),
            path,
            parent: None,
            fields: Vec::new(),
            tags: Vec::new(),
            queries: Vec::new(),
            excludes: Vec::new(),
            icon: None,
        }
    }

    /// Parse a template from the front matter of its note.
    pub fn from_frontmatter(path: NotePath, fm: &Frontmatter) -> Result<Self, TemplateError> {
        let name = path.stem().to_string();
        let mut def = Self::new(name.clone(), path.clone());

        def.parent = match fm.get("extends") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(strip_link(s)).filter(|s| !s.is_empty()),
            Some(_) => {
                return Err(TemplateError::Malformed {
                    path,
                    message: "'extends' must be a template name".to_string(),
                });
            }
        };

        let owner = FieldOwner::Template(name.clone());
        let fields = Field::parse_list(fm.get("fields").unwrap_or(&Value::Null), &owner)
            .map_err(|source| TemplateError::InvalidField { template: name.clone(), source })?;
        for field in fields {
            if def.fields.iter().any(|f| f.name == field.name) {
                tracing::warn!(template = %name, field = %field.name, "Duplicate field name, keeping the first");
                continue;
            }
            def.fields.push(field);
        }

        let map_with_tag = fm
            .get("map_with_tag")
            .or_else(|| fm.get("mapWithTag"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if map_with_tag {
            def.tags.push(normalize_tag(&name));
        }
        let tag_names = fm.get("tag_names").or_else(|| fm.get("tagNames"));
        for tag in string_list(tag_names, &path, "tag_names")? {
            let tag = normalize_tag(&tag);
            if !tag.is_empty() && !def.tags.contains(&tag) {
                def.tags.push(tag);
            }
        }

        def.queries = string_list(fm.get("queries"), &path, "queries")?;
        def.excludes = string_list(fm.get("excludes"), &path, "excludes")?;
        def.icon = fm.get("icon").and_then(Value::as_str).map(str::to_string);
        Ok(def)
    }
}

/// A template with its inheritance resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub definition: TemplateDefinition,
    /// Ancestor names, nearest first.
    pub ancestors: Vec<String>,
    /// Own fields followed by inherited ones, deduplicated by name.
    pub attributes: Vec<Field>,
}

impl Template {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn path(&self) -> &NotePath {
        &self.definition.path
    }

    pub fn parent(&self) -> Option<&str> {
        self.definition.parent.as_deref()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.attributes.iter().find(|f| f.name == name)
    }
}

fn strip_link(s: &str) -> String {
    let s = s.trim();
    let inner = s
        .strip_prefix("[[")
        .and_then(|s| s.strip_suffix("]]"))
        .unwrap_or(s);
    let inner = inner.split('|').next().unwrap_or(inner);
    inner.rsplit('/').next().unwrap_or(inner).trim_end_matches(".md").to_string()
}

/// A key holding either a list of strings or a comma-separated string.
fn string_list(value: Option<&Value>, path: &NotePath, key: &str) -> Result<Vec<String>, TemplateError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()),
        Some(Value::Sequence(seq)) => seq
            .iter()
            .map(|v| {
                v.as_str().map(|s| s.trim().to_string()).ok_or_else(|| TemplateError::Malformed {
                    path: path.clone(),
                    message: format!("'{key}' entries must be strings"),
                })
            })
            .collect(),
        Some(_) => Err(TemplateError::Malformed {
            path: path.clone(),
            message: format!("'{key}' must be a list"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str, yaml: &str) -> Result<TemplateDefinition, TemplateError> {
        let fm = Frontmatter::from_yaml(yaml).unwrap();
        TemplateDefinition::from_frontmatter(NotePath::new(path), &fm)
    }

    #[test]
    fn test_parse_full_template() {
        let def = parse(
            "fileClasses/Novel.md",
            "extends: \"[[Book]]\"\nmapWithTag: true\ntagNames: [Fiction, '#story']\n\
             queries: ['\"Library\"']\nexcludes: isbn\nicon: book\n\
             fields:\n  - name: genre\n    type: Select\n    options:\n      values: [scifi, fantasy]\n",
        )
        .unwrap();
        assert_eq!(def.name, "Novel");
        assert_eq!(def.parent.as_deref(), Some("Book"));
        assert_eq!(def.tags, vec!["novel", "fiction", "story"]);
        assert_eq!(def.queries, vec!["\"Library\""]);
        assert_eq!(def.excludes, vec!["isbn"]);
        assert_eq!(def.icon.as_deref(), Some("book"));
        assert_eq!(def.fields.len(), 1);
        assert_eq!(def.fields[0].owner, FieldOwner::Template("Novel".into()));
    }

    #[test]
    fn test_duplicate_field_keeps_first() {
        let def = parse(
            "T/A.md",
            "fields:\n  - name: x\n    type: Number\n  - name: x\n    type: Boolean\n",
        )
        .unwrap();
        assert_eq!(def.fields.len(), 1);
        assert_eq!(def.fields[0].kind.type_name(), "Number");
    }

    #[test]
    fn test_bad_field_type_is_an_error() {
        let err = parse("T/A.md", "fields:\n  - name: x\n    type: Stars\n").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidField { .. }));
    }

    #[test]
    fn test_bad_extends_is_malformed() {
        let err = parse("T/A.md", "extends: [a, b]\n").unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { .. }));
    }
}
