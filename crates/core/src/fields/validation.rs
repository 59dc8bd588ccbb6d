//! Value validation against field kinds.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde_yaml::Value;

use super::definition::Field;
use super::errors::{ValidationError, ValidationResult};
use super::kind::{ChoiceOptions, DateOptions, FieldKind, NumberOptions};
use crate::store::FieldValues;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\[[^\[\]]+\]\]$").unwrap());

/// Validate the values of a note against the fields attributed to it.
///
/// Only root fields are checked; values nested under objects are left to
/// their parent. Names with no matching field produce a warning.
pub fn validate_values(fields: &[Field], values: &FieldValues) -> ValidationResult {
    let mut result = ValidationResult::default();
    for field in fields.iter().filter(|f| f.is_root()) {
        if let Some(value) = values.get(&field.name) {
            result.merge(field.kind.validate_value(&field.name, value));
        }
    }
    for name in values.keys() {
        if !fields.iter().any(|f| &f.name == name) {
            result.add_warning(format!("'{name}' has no field definition"));
        }
    }
    result
}

impl FieldKind {
    /// Check that `value` fits this kind. Empty values always pass.
    pub fn validate_value(&self, field: &str, value: &Value) -> ValidationResult {
        let mut result = ValidationResult::default();
        if value.is_null() {
            return result;
        }
        let mismatch = |expected: &str| ValidationError::TypeMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
            actual: yaml_type_name(value),
        };

        match self {
            Self::Lookup(_) | Self::Formula(_) | Self::Yaml => {}
            Self::Canvas(_) | Self::CanvasGroup(_) | Self::CanvasGroupLink(_) => {}
            Self::Input(_) => {
                if !is_scalar(value) {
                    result.add_error(mismatch("text"));
                }
            }
            Self::Boolean => match value {
                Value::Bool(_) => {}
                Value::String(s) if s == "true" || s == "false" => {}
                _ => result.add_error(mismatch("boolean")),
            },
            Self::Number(opts) => match as_number(value) {
                Some(n) => check_number(field, n, opts, &mut result),
                None => result.add_error(mismatch("number")),
            },
            Self::Select(opts) | Self::Cycle(opts) => match scalar_text(value) {
                Some(s) => check_choice(field, &s, opts, &mut result),
                None => result.add_error(mismatch("single value")),
            },
            Self::Multi(opts) => match list_items(value) {
                Some(items) => {
                    for item in items {
                        check_choice(field, &item, opts, &mut result);
                    }
                }
                None => result.add_error(mismatch("list")),
            },
            Self::Date(opts) => check_temporal(field, value, opts, "%Y-%m-%d", is_date, &mut result),
            Self::DateTime(opts) => {
                check_temporal(field, value, opts, "%Y-%m-%dT%H:%M", is_datetime, &mut result)
            }
            Self::Time(opts) => check_temporal(field, value, opts, "%H:%M", is_time, &mut result),
            Self::File(_) | Self::Media(_) => match value {
                Value::String(s) if is_reference(s) => {}
                _ => result.add_error(mismatch("link")),
            },
            Self::MultiFile(_) | Self::MultiMedia(_) => match list_items(value) {
                Some(items) => {
                    for item in items.iter().filter(|i| !is_reference(i)) {
                        result.add_error(ValidationError::InvalidValue {
                            field: field.to_string(),
                            message: format!("'{item}' is not a link"),
                        });
                    }
                }
                None => result.add_error(mismatch("list of links")),
            },
            Self::Json => match value {
                Value::Mapping(_) | Value::Sequence(_) => {}
                Value::String(s) => {
                    if let Err(e) = serde_json::from_str::<serde_json::Value>(s) {
                        result.add_error(ValidationError::InvalidValue {
                            field: field.to_string(),
                            message: format!("not valid JSON: {e}"),
                        });
                    }
                }
                _ => result.add_error(mismatch("JSON")),
            },
            Self::Object(_) => {
                if !value.is_mapping() {
                    result.add_error(mismatch("object"));
                }
            }
            Self::ObjectList(_) => match value {
                Value::Sequence(items) if items.iter().all(|i| i.is_mapping() || i.is_null()) => {}
                _ => result.add_error(mismatch("list of objects")),
            },
        }
        result
    }
}

fn check_number(field: &str, n: f64, opts: &NumberOptions, result: &mut ValidationResult) {
    if let Some(min) = opts.min
        && n < min
    {
        result.add_error(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("value {n} is less than minimum {min}"),
        });
    }
    if let Some(max) = opts.max
        && n > max
    {
        result.add_error(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("value {n} is greater than maximum {max}"),
        });
    }
    if let Some(step) = opts.step
        && step > 0.0
    {
        let steps = (n - opts.min.unwrap_or(0.0)) / step;
        if (steps - steps.round()).abs() > 1e-9 {
            result.add_error(ValidationError::InvalidValue {
                field: field.to_string(),
                message: format!("value {n} is not a multiple of step {step}"),
            });
        }
    }
}

fn check_choice(field: &str, value: &str, opts: &ChoiceOptions, result: &mut ValidationResult) {
    // Values sourced from a note or a query are only known at edit time.
    if opts.is_closed() && !opts.values.iter().any(|v| v == value) {
        result.add_error(ValidationError::NotAllowed {
            field: field.to_string(),
            value: value.to_string(),
            allowed: opts.values.clone(),
        });
    }
}

fn check_temporal(
    field: &str,
    value: &Value,
    opts: &DateOptions,
    default_format: &str,
    parses: fn(&str, &str) -> bool,
    result: &mut ValidationResult,
) {
    let Value::String(raw) = value else {
        result.add_error(ValidationError::TypeMismatch {
            field: field.to_string(),
            expected: "date".to_string(),
            actual: yaml_type_name(value),
        });
        return;
    };
    let text = strip_link(raw);
    let format = opts.format.as_deref().unwrap_or(default_format);
    if !parses(text, format) {
        result.add_error(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("'{text}' does not match format '{format}'"),
        });
    }
}

fn is_date(s: &str, format: &str) -> bool {
    NaiveDate::parse_from_str(s, format).is_ok()
}

fn is_datetime(s: &str, format: &str) -> bool {
    NaiveDateTime::parse_from_str(s, format).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || DateTime::parse_from_rfc3339(s).is_ok()
}

fn is_time(s: &str, format: &str) -> bool {
    NaiveTime::parse_from_str(s, format).is_ok()
        || NaiveTime::parse_from_str(s, "%H:%M:%S").is_ok()
}

fn strip_link(s: &str) -> &str {
    s.trim()
        .strip_prefix("[[")
        .and_then(|s| s.strip_suffix("]]"))
        .unwrap_or(s.trim())
}

fn is_reference(s: &str) -> bool {
    let s = s.trim();
    LINK_RE.is_match(s) || (!s.is_empty() && !s.contains(['[', ']', '\n']))
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Items of a list value; a comma-separated string counts as a list.
fn list_items(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Sequence(seq) => seq.iter().map(scalar_text).collect(),
        Value::String(s) => Some(
            s.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        ),
        _ => None,
    }
}

/// Human-readable name of a YAML value's type.
pub fn yaml_type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "object",
        Value::Tagged(_) => "tagged",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldOwner;
    use rstest::rstest;

    fn kind(type_name: &str, options: &str) -> FieldKind {
        FieldKind::from_parts(type_name, &serde_yaml::from_str(options).unwrap()).unwrap()
    }

    fn y(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[rstest]
    #[case("Number", "min: 0\nmax: 10", "5", true)]
    #[case("Number", "min: 0\nmax: 10", "11", false)]
    #[case("Number", "step: 0.5", "1.5", true)]
    #[case("Number", "step: 0.5", "1.2", false)]
    #[case("Number", "{}", "'42'", true)]
    #[case("Number", "{}", "abc", false)]
    #[case("Boolean", "{}", "true", true)]
    #[case("Boolean", "{}", "yes please", false)]
    #[case("Select", "values: [a, b]", "a", true)]
    #[case("Select", "values: [a, b]", "c", false)]
    #[case("Select", "values: [a]\nvalues_note: Lists/Choices.md", "c", true)]
    #[case("Cycle", "values: [todo, done]", "done", true)]
    #[case("Multi", "values: [a, b]", "[a, b]", true)]
    #[case("Multi", "values: [a, b]", "'a, z'", false)]
    #[case("Date", "{}", "'2024-03-01'", true)]
    #[case("Date", "{}", "'[[2024-03-01]]'", true)]
    #[case("Date", "{}", "'03/01/2024'", false)]
    #[case("Date", "format: '%d/%m/%Y'", "'03/01/2024'", true)]
    #[case("DateTime", "{}", "'2024-03-01T10:30'", true)]
    #[case("Time", "{}", "'10:30'", true)]
    #[case("Time", "{}", "'25:99'", false)]
    #[case("File", "{}", "'[[Books/Dune]]'", true)]
    #[case("MultiFile", "{}", "['[[A]]', '[[B]]']", true)]
    #[case("Json", "{}", "'{\"a\": 1}'", true)]
    #[case("Json", "{}", "'{oops'", false)]
    #[case("Object", "{}", "{street: Main}", true)]
    #[case("Object", "{}", "text", false)]
    #[case("ObjectList", "{}", "[{a: 1}, {a: 2}]", true)]
    #[case("Input", "{}", "[a, b]", false)]
    #[case("Lookup", "{}", "[anything, 1]", true)]
    fn test_validate_value(
        #[case] type_name: &str,
        #[case] options: &str,
        #[case] value: &str,
        #[case] valid: bool,
    ) {
        let result = kind(type_name, options).validate_value("f", &y(value));
        assert_eq!(result.is_valid(), valid, "{:?}", result.errors);
    }

    #[test]
    fn test_null_is_always_valid() {
        assert!(kind("Number", "min: 1").validate_value("f", &Value::Null).is_valid());
    }

    #[test]
    fn test_validate_values_warns_on_undefined_names() {
        let fields = vec![Field::new("pages", kind("Number", "{}"), FieldOwner::Preset)];
        let mut values = FieldValues::new();
        values.insert("pages".into(), y("'many'"));
        values.insert("mood".into(), y("calm"));
        let result = validate_values(&fields, &values);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.warnings, vec!["'mood' has no field definition"]);
    }
}
