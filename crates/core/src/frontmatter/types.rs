//! Front matter types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Parsed YAML front matter of a note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    /// Top-level keys and their values.
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

impl Frontmatter {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Front matter as a single YAML mapping, for typed deserialization.
    pub fn to_mapping(&self) -> Value {
        let mut map = serde_yaml::Mapping::new();
        for (k, v) in &self.fields {
            map.insert(Value::String(k.clone()), v.clone());
        }
        Value::Mapping(map)
    }

    /// Parse front matter from a bare YAML document (no `---` fences).
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }
}

/// A note split into front matter and body.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub frontmatter: Option<Frontmatter>,
    /// Everything after the closing fence.
    pub body: String,
}
