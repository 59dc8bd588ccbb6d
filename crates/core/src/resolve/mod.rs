//! Derived-field resolution: lookups and formulas, and the rules that turn a
//! computation outcome into a [`ComputationRecord`].

pub mod formula;
pub mod links;
pub mod lookup;

use chrono::{DateTime, Utc};

use crate::fields::OutputKind;
use crate::index::{ComputationRecord, Status};
use crate::store::{FieldValues, NotePath};

pub use formula::{FormulaError, compute_formula, current_view};
pub use links::LinkResolver;
pub use lookup::{LookupError, LookupSources, compute_lookup};

/// How a fresh computation is reconciled with the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Compare only. A difference is flagged `Changed`; nothing is written.
    Seed,
    /// Write differences and flag them `Changed`; identical results are
    /// `UpToDate`.
    Commit,
    /// Explicit update: always write, `UpToDate` on success.
    Refresh,
}

/// Reconcile a computation outcome with the previous record.
///
/// Errors never touch the stored value.
pub fn settle(
    previous: Option<&ComputationRecord>,
    output_kind: OutputKind,
    outcome: Result<serde_json::Value, String>,
    mode: Mode,
    now: DateTime<Utc>,
) -> ComputationRecord {
    let value = match outcome {
        Ok(value) => value,
        Err(message) => {
            return ComputationRecord {
                value: previous.and_then(|p| p.value.clone()),
                output_kind: previous.map(|p| p.output_kind).unwrap_or(output_kind),
                status: Status::Error(message),
                updated_at: now,
            };
        }
    };

    let identical = previous
        .is_some_and(|p| p.output_kind == output_kind && p.value.as_ref() == Some(&value));

    match mode {
        Mode::Refresh => written(value, output_kind, Status::UpToDate, now),
        _ if identical => ComputationRecord {
            value: Some(value),
            output_kind,
            status: Status::UpToDate,
            updated_at: previous.map(|p| p.updated_at).unwrap_or(now),
        },
        Mode::Commit => written(value, output_kind, Status::Changed, now),
        Mode::Seed => match previous {
            Some(p) => ComputationRecord { status: Status::Changed, ..p.clone() },
            None => ComputationRecord::pending(output_kind, Status::Changed),
        },
    }
}

/// Flag a record as possibly stale after one of its dependencies changed.
///
/// `Changed` and `Error` are stronger signals and are kept.
pub fn mark_may_have_changed(
    previous: Option<&ComputationRecord>,
    output_kind: OutputKind,
) -> ComputationRecord {
    match previous {
        Some(p) if matches!(p.status, Status::UpToDate) => {
            ComputationRecord { status: Status::MayHaveChanged, ..p.clone() }
        }
        Some(p) => p.clone(),
        None => ComputationRecord::pending(output_kind, Status::MayHaveChanged),
    }
}

fn written(
    value: serde_json::Value,
    output_kind: OutputKind,
    status: Status,
    now: DateTime<Utc>,
) -> ComputationRecord {
    ComputationRecord { value: Some(value), output_kind, status, updated_at: now }
}

/// Convert a YAML value to JSON. Non-string mapping keys are stringified.
pub fn yaml_to_json(value: &serde_yaml::Value) -> serde_json::Value {
    use serde_yaml::Value as Y;
    match value {
        Y::Null => serde_json::Value::Null,
        Y::Bool(b) => serde_json::Value::Bool(*b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Y::String(s) => serde_json::Value::String(s.clone()),
        Y::Sequence(items) => serde_json::Value::Array(items.iter().map(yaml_to_json).collect()),
        Y::Mapping(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let key = match k {
                        Y::String(s) => s.clone(),
                        other => serde_yaml::to_string(other)
                            .map(|s| s.trim().to_string())
                            .unwrap_or_default(),
                    };
                    (key, yaml_to_json(v))
                })
                .collect(),
        ),
        Y::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

/// A note's values as a JSON object, with a `file` entry describing the
/// note itself.
pub fn page_view(note: &NotePath, values: &FieldValues) -> serde_json::Map<String, serde_json::Value> {
    let mut map: serde_json::Map<String, serde_json::Value> =
        values.iter().map(|(k, v)| (k.clone(), yaml_to_json(v))).collect();
    map.insert(
        "file".to_string(),
        serde_json::json!({
            "path": note.as_str(),
            "name": note.stem(),
            "link": note.to_link(),
        }),
    );
    map
}
