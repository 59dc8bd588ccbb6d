//! Field definitions as attributed to notes.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::errors::FieldError;
use super::kind::FieldKind;

/// Separator between ids in a nested field path (`parentId____childId`).
pub const PATH_SEPARATOR: &str = "____";

/// Who contributed a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldOwner {
    Template(String),
    Preset,
    None,
}

impl FieldOwner {
    pub fn template_name(&self) -> Option<&str> {
        match self {
            Self::Template(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for FieldOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(name) => f.write_str(name),
            Self::Preset => f.write_str("preset"),
            Self::None => f.write_str("none"),
        }
    }
}

/// A field definition exactly as written in a template or in the config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub type_name: String,
    #[serde(default)]
    pub options: Value,
    #[serde(default)]
    pub path: String,
}

fn default_type() -> String {
    "Input".to_string()
}

/// A typed field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Stable identifier, unique across the collection.
    pub id: String,
    pub name: String,
    pub kind: FieldKind,
    /// Ids of the enclosing Object / ObjectList fields, joined by `____`.
    /// Empty for root fields.
    pub path: String,
    pub owner: FieldOwner,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind, owner: FieldOwner) -> Self {
        let name = name.into();
        let id = derive_id(&owner, &name);
        Self { id, name, kind, path: String::new(), owner }
    }

    /// Build a field from its raw definition. A missing id is derived from
    /// the owner and the field name so it survives reloads.
    pub fn from_raw(raw: &RawField, owner: FieldOwner) -> Result<Self, FieldError> {
        let name = raw.name.trim();
        if name.is_empty() {
            return Err(FieldError::MissingName);
        }
        let kind = FieldKind::from_parts(&raw.type_name, &raw.options)?;
        let id = match raw.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => derive_id(&owner, name),
        };
        Ok(Self { id, name: name.to_string(), kind, path: raw.path.clone(), owner })
    }

    /// Parse a list of raw YAML definitions (a template's `fields` key).
    pub fn parse_list(value: &Value, owner: &FieldOwner) -> Result<Vec<Self>, FieldError> {
        let raws: Vec<RawField> = match value {
            Value::Null => return Ok(Vec::new()),
            Value::Sequence(_) => serde_yaml::from_value(value.clone())
                .map_err(|e| FieldError::Malformed(e.to_string()))?,
            other => {
                return Err(FieldError::Malformed(format!(
                    "expected a list of fields, got {}",
                    crate::fields::validation::yaml_type_name(other)
                )));
            }
        };
        raws.iter().map(|raw| Self::from_raw(raw, owner.clone())).collect()
    }

    /// The id of the directly enclosing object field.
    pub fn parent_id(&self) -> Option<&str> {
        if self.path.is_empty() {
            return None;
        }
        self.path.rsplit(PATH_SEPARATOR).next()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Nesting depth; root fields are at depth 0.
    pub fn depth(&self) -> usize {
        if self.path.is_empty() { 0 } else { self.path.split(PATH_SEPARATOR).count() }
    }

    pub fn is_derived(&self) -> bool {
        self.kind.is_derived()
    }

    pub fn to_raw(&self) -> RawField {
        RawField {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            type_name: self.kind.type_name().to_string(),
            options: self.kind.options_value(),
            path: self.path.clone(),
        }
    }
}

fn derive_id(owner: &FieldOwner, name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    owner.to_string().hash(&mut hasher);
    name.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(yaml: &str) -> RawField {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_explicit_id_is_kept() {
        let f = Field::from_raw(&raw("id: a1\nname: pages\ntype: Number"), FieldOwner::Preset)
            .unwrap();
        assert_eq!(f.id, "a1");
        assert_eq!(f.kind.type_name(), "Number");
    }

    #[test]
    fn test_derived_id_is_stable_and_owner_scoped() {
        let book = FieldOwner::Template("Book".into());
        let a = Field::from_raw(&raw("name: title"), book.clone()).unwrap();
        let b = Field::from_raw(&raw("name: title"), book).unwrap();
        let c = Field::from_raw(&raw("name: title"), FieldOwner::Template("Novel".into())).unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.kind.type_name(), "Input");
    }

    #[test]
    fn test_missing_name_is_an_error() {
        let err = Field::from_raw(&raw("type: Number"), FieldOwner::None).unwrap_err();
        assert_eq!(err, FieldError::MissingName);
    }

    #[test]
    fn test_nested_path() {
        let f = Field::from_raw(&raw("name: street\npath: addr____home"), FieldOwner::None)
            .unwrap();
        assert_eq!(f.parent_id(), Some("home"));
        assert_eq!(f.depth(), 2);
        assert!(!f.is_root());
    }

    #[test]
    fn test_parse_list_rejects_mapping() {
        let value: Value = serde_yaml::from_str("name: x").unwrap();
        assert!(Field::parse_list(&value, &FieldOwner::None).is_err());
    }
}
