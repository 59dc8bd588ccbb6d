//! Formula fields: user expressions over the owning note's values.

use thiserror::Error;

use super::page_view;
use crate::fields::FormulaOptions;
use crate::scripting::{Bindings, ScriptError, ScriptSandbox};
use crate::store::{FieldValues, NotePath};

#[derive(Debug, Clone, Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,

    #[error("{0}")]
    Script(#[from] ScriptError),
}

/// The `current` object a formula sees: the note's stored values, overlaid
/// with the latest computed lookup and formula values.
pub fn current_view<'a>(
    note: &NotePath,
    values: &FieldValues,
    derived: impl IntoIterator<Item = (&'a str, &'a serde_json::Value)>,
) -> serde_json::Value {
    let mut map = page_view(note, values);
    for (name, value) in derived {
        map.insert(name.to_string(), value.clone());
    }
    serde_json::Value::Object(map)
}

/// Evaluate a formula with `current` bound to the note's view.
pub async fn compute_formula(
    sandbox: &dyn ScriptSandbox,
    options: &FormulaOptions,
    current: serde_json::Value,
) -> Result<serde_json::Value, FormulaError> {
    let expression = options.formula.trim();
    if expression.is_empty() {
        return Err(FormulaError::Empty);
    }
    let mut bindings = Bindings::new();
    bindings.insert("current".to_string(), current);
    Ok(sandbox.run(expression, &bindings).await?)
}
