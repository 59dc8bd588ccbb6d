//! Types for the schema index and computed-value records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::{Field, OutputKind};
use crate::store::NotePath;

/// Staleness of a computed field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// A dependency changed and the stored value is known or assumed stale.
    Changed,
    /// A note this value depends on changed; the value may be stale.
    MayHaveChanged,
    /// The stored value matches the last computation.
    UpToDate,
    /// The last computation failed; the message is kept for display.
    Error(String),
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Changed => "Changed",
            Self::MayHaveChanged => "MayHaveChanged",
            Self::UpToDate => "UpToDate",
            Self::Error(_) => "Error",
        }
    }

    /// Rebuild a status from its stored name and message.
    pub fn from_parts(name: &str, message: Option<String>) -> Option<Self> {
        match name {
            "Changed" => Some(Self::Changed),
            "MayHaveChanged" => Some(Self::MayHaveChanged),
            "UpToDate" => Some(Self::UpToDate),
            "Error" => Some(Self::Error(message.unwrap_or_default())),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Whether an explicit update could produce a different value.
    pub fn needs_update(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(message) => write!(f, "Error: {message}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Identifies one computed value: a note and one of its field ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    pub note: NotePath,
    pub field_id: String,
}

impl FieldKey {
    pub fn new(note: NotePath, field_id: impl Into<String>) -> Self {
        Self { note, field_id: field_id.into() }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.note, self.field_id)
    }
}

/// Last known state of a lookup or formula value.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputationRecord {
    /// Last written value; `None` until the first write.
    pub value: Option<serde_json::Value>,
    /// How the value was produced.
    pub output_kind: OutputKind,
    pub status: Status,
    pub updated_at: DateTime<Utc>,
}

impl ComputationRecord {
    /// A record with no value yet, waiting for its first computation.
    pub fn pending(output_kind: OutputKind, status: Status) -> Self {
        Self { value: None, output_kind, status, updated_at: Utc::now() }
    }
}

/// Which of the five attribution tiers contributed a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    InnerTemplate,
    Tag,
    Query,
    Global,
    Preset,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InnerTemplate => "inner",
            Self::Tag => "tag",
            Self::Query => "query",
            Self::Global => "global",
            Self::Preset => "preset",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field attributed to a note, with the tier it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributedField {
    pub field: Field,
    pub tier: Tier,
}

/// Schema of one note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaEntry {
    /// Fields in priority order; names are unique.
    pub fields: Vec<AttributedField>,
    /// Templates matched by tiers 1 to 4, in match order.
    pub matched: Vec<String>,
    /// Notes referenced by each field value of the note, keyed by value name.
    pub references: BTreeMap<String, Vec<NotePath>>,
}

impl SchemaEntry {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().map(|a| &a.field).find(|f| f.name == name)
    }

    /// Find a field by id, falling back to its name.
    pub fn field_by_id_or_name(&self, key: &str) -> Option<&Field> {
        self.fields
            .iter()
            .map(|a| &a.field)
            .find(|f| f.id == key)
            .or_else(|| self.field(key))
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().map(|a| &a.field)
    }

    /// Notes referenced through the value named `name`.
    pub fn references_via(&self, name: &str) -> &[NotePath] {
        self.references.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parts() {
        for status in [
            Status::Changed,
            Status::MayHaveChanged,
            Status::UpToDate,
            Status::Error("boom".into()),
        ] {
            let restored =
                Status::from_parts(status.as_str(), status.message().map(str::to_string));
            assert_eq!(restored, Some(status));
        }
        assert_eq!(Status::from_parts("Stale", None), None);
    }

    #[test]
    fn test_status_needs_update() {
        assert!(!Status::UpToDate.needs_update());
        assert!(Status::Changed.needs_update());
        assert!(Status::MayHaveChanged.needs_update());
        assert!(Status::Error("boom".into()).needs_update());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Error("division by zero".into()).to_string(), "Error: division by zero");
        assert_eq!(Status::MayHaveChanged.to_string(), "MayHaveChanged");
    }
}
