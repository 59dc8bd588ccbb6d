//! Field kinds and their per-kind options.
//!
//! Field definitions arrive as a `type` string plus an untyped `options`
//! mapping. [`FieldKind::from_parts`] is the only place that dispatches on the
//! string; everything downstream matches on the enum.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::errors::FieldError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputOptions {
    pub template: Option<String>,
}

/// Options shared by Select, Multi and Cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceOptions {
    /// Allowed values listed inline.
    #[serde(alias = "valuesList")]
    pub values: Vec<String>,
    /// Note whose lines provide the allowed values.
    #[serde(alias = "valuesListNotePath")]
    pub values_note: Option<String>,
    /// Query whose matches provide the allowed values.
    #[serde(alias = "valuesFromDVQuery")]
    pub values_query: Option<String>,
}

impl ChoiceOptions {
    /// Whether the allowed set is fully known from the inline list.
    pub fn is_closed(&self) -> bool {
        !self.values.is_empty() && self.values_note.is_none() && self.values_query.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberOptions {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateOptions {
    /// chrono format string; kind-specific ISO default when absent.
    #[serde(alias = "dateFormat")]
    pub format: Option<String>,
    #[serde(alias = "defaultInsertAsLink")]
    pub insert_as_link: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    #[serde(alias = "dvQueryString")]
    pub query: Option<String>,
    pub folders: Vec<String>,
    pub embed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasOptions {
    #[serde(alias = "canvasPath")]
    pub canvas_path: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectOptions {
    #[serde(alias = "displayTemplate")]
    pub display_template: Option<String>,
}

/// How a lookup renders its matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupOutput {
    #[default]
    LinksList,
    LinksBulletList,
    BuiltinSummarizingFunction,
    CustomList,
    CustomBulletList,
    CustomSummarizingFunction,
}

impl LookupOutput {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinksList => "LinksList",
            Self::LinksBulletList => "LinksBulletList",
            Self::BuiltinSummarizingFunction => "BuiltinSummarizingFunction",
            Self::CustomList => "CustomList",
            Self::CustomBulletList => "CustomBulletList",
            Self::CustomSummarizingFunction => "CustomSummarizingFunction",
        }
    }
}

/// Built-in reductions over the matches of a lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Summary {
    #[default]
    CountAll,
    Sum,
    Average,
    Max,
    Min,
}

impl Summary {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CountAll => "CountAll",
            Self::Sum => "Sum",
            Self::Average => "Average",
            Self::Max => "Max",
            Self::Min => "Min",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupOptions {
    #[serde(alias = "autoUpdate")]
    pub auto_update: bool,
    /// Selector for candidate notes.
    #[serde(alias = "dvQueryString")]
    pub source: String,
    /// Field on candidate notes that must link back to the owning note.
    #[serde(alias = "targetFieldName")]
    pub target_field_name: String,
    #[serde(alias = "outputType")]
    pub output: LookupOutput,
    #[serde(alias = "builtinSummarizingFunction")]
    pub builtin: Option<Summary>,
    #[serde(alias = "builtinSummarizingFunctionField")]
    pub summarized_field_name: Option<String>,
    /// Expression evaluated once per match with `page` bound.
    #[serde(alias = "customListFunction")]
    pub custom_list_function: Option<String>,
    /// Expression evaluated once with `pages` bound.
    #[serde(alias = "customSummarizingFunction")]
    pub custom_summarizing_function: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaOptions {
    #[serde(alias = "autoUpdate")]
    pub auto_update: bool,
    pub formula: String,
}

/// The closed set of field kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Input(InputOptions),
    Select(ChoiceOptions),
    Multi(ChoiceOptions),
    Cycle(ChoiceOptions),
    Boolean,
    Number(NumberOptions),
    Date(DateOptions),
    DateTime(DateOptions),
    Time(DateOptions),
    File(FileOptions),
    MultiFile(FileOptions),
    Media(FileOptions),
    MultiMedia(FileOptions),
    Lookup(LookupOptions),
    Formula(FormulaOptions),
    Canvas(CanvasOptions),
    CanvasGroup(CanvasOptions),
    CanvasGroupLink(CanvasOptions),
    Yaml,
    Json,
    Object(ObjectOptions),
    ObjectList(ObjectOptions),
}

/// What a computed record was rendered as. A change here forces the record
/// back to `Changed` even when the stored value looks current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Lookup { output: LookupOutput, builtin: Option<Summary> },
    Formula,
}

impl OutputKind {
    pub fn as_string(&self) -> String {
        match self {
            Self::Lookup { output, builtin: Some(b) } => format!("{}:{}", output.as_str(), b.as_str()),
            Self::Lookup { output, builtin: None } => output.as_str().to_string(),
            Self::Formula => "Formula".to_string(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s == "Formula" {
            return Some(Self::Formula);
        }
        let (output, builtin) = match s.split_once(':') {
            Some((o, b)) => (o, Some(b)),
            None => (s, None),
        };
        let output = serde_yaml::from_value(Value::String(output.to_string())).ok()?;
        let builtin = match builtin {
            Some(b) => Some(serde_yaml::from_value(Value::String(b.to_string())).ok()?),
            None => None,
        };
        Some(Self::Lookup { output, builtin })
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl FieldKind {
    /// Build a kind from its type name and raw options.
    pub fn from_parts(type_name: &str, options: &Value) -> Result<Self, FieldError> {
        let kind = match type_name {
            "Input" => Self::Input(opts(type_name, options)?),
            "Select" => Self::Select(opts(type_name, options)?),
            "Multi" => Self::Multi(opts(type_name, options)?),
            "Cycle" => Self::Cycle(opts(type_name, options)?),
            "Boolean" => Self::Boolean,
            "Number" => Self::Number(opts(type_name, options)?),
            "Date" => Self::Date(opts(type_name, options)?),
            "DateTime" => Self::DateTime(opts(type_name, options)?),
            "Time" => Self::Time(opts(type_name, options)?),
            "File" => Self::File(opts(type_name, options)?),
            "MultiFile" => Self::MultiFile(opts(type_name, options)?),
            "Media" => Self::Media(opts(type_name, options)?),
            "MultiMedia" => Self::MultiMedia(opts(type_name, options)?),
            "Lookup" => Self::Lookup(opts(type_name, options)?),
            "Formula" => Self::Formula(opts(type_name, options)?),
            "Canvas" => Self::Canvas(opts(type_name, options)?),
            "CanvasGroup" => Self::CanvasGroup(opts(type_name, options)?),
            "CanvasGroupLink" => Self::CanvasGroupLink(opts(type_name, options)?),
            "YAML" | "Yaml" => Self::Yaml,
            "JSON" | "Json" => Self::Json,
            "Object" => Self::Object(opts(type_name, options)?),
            "ObjectList" => Self::ObjectList(opts(type_name, options)?),
            other => return Err(FieldError::UnknownType(other.to_string())),
        };
        Ok(kind)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Input(_) => "Input",
            Self::Select(_) => "Select",
            Self::Multi(_) => "Multi",
            Self::Cycle(_) => "Cycle",
            Self::Boolean => "Boolean",
            Self::Number(_) => "Number",
            Self::Date(_) => "Date",
            Self::DateTime(_) => "DateTime",
            Self::Time(_) => "Time",
            Self::File(_) => "File",
            Self::MultiFile(_) => "MultiFile",
            Self::Media(_) => "Media",
            Self::MultiMedia(_) => "MultiMedia",
            Self::Lookup(_) => "Lookup",
            Self::Formula(_) => "Formula",
            Self::Canvas(_) => "Canvas",
            Self::CanvasGroup(_) => "CanvasGroup",
            Self::CanvasGroupLink(_) => "CanvasGroupLink",
            Self::Yaml => "YAML",
            Self::Json => "JSON",
            Self::Object(_) => "Object",
            Self::ObjectList(_) => "ObjectList",
        }
    }

    /// Options serialized back to a mapping (`null` for option-less kinds).
    pub fn options_value(&self) -> Value {
        let result = match self {
            Self::Input(o) => serde_yaml::to_value(o),
            Self::Select(o) | Self::Multi(o) | Self::Cycle(o) => serde_yaml::to_value(o),
            Self::Number(o) => serde_yaml::to_value(o),
            Self::Date(o) | Self::DateTime(o) | Self::Time(o) => serde_yaml::to_value(o),
            Self::File(o) | Self::MultiFile(o) | Self::Media(o) | Self::MultiMedia(o) => {
                serde_yaml::to_value(o)
            }
            Self::Lookup(o) => serde_yaml::to_value(o),
            Self::Formula(o) => serde_yaml::to_value(o),
            Self::Canvas(o) | Self::CanvasGroup(o) | Self::CanvasGroupLink(o) => {
                serde_yaml::to_value(o)
            }
            Self::Object(o) | Self::ObjectList(o) => serde_yaml::to_value(o),
            Self::Boolean | Self::Yaml | Self::Json => return Value::Null,
        };
        result.unwrap_or(Value::Null)
    }

    /// Lookup and Formula values are computed, never entered.
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Lookup(_) | Self::Formula(_))
    }

    /// Whether a derived field recomputes on every full pass.
    pub fn auto_update(&self) -> bool {
        match self {
            Self::Lookup(o) => o.auto_update,
            Self::Formula(o) => o.auto_update,
            _ => false,
        }
    }

    /// Whether values of this kind may hold several entries.
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            Self::Multi(_) | Self::MultiFile(_) | Self::MultiMedia(_) | Self::ObjectList(_)
        )
    }

    /// Whether fields may nest under this kind.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_) | Self::ObjectList(_))
    }

    pub fn output_kind(&self) -> Option<OutputKind> {
        match self {
            Self::Lookup(o) => Some(OutputKind::Lookup {
                output: o.output,
                builtin: match o.output {
                    LookupOutput::BuiltinSummarizingFunction => Some(o.builtin.unwrap_or_default()),
                    _ => None,
                },
            }),
            Self::Formula(_) => Some(OutputKind::Formula),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

fn opts<T: DeserializeOwned + Default>(type_name: &str, options: &Value) -> Result<T, FieldError> {
    match options {
        Value::Null => Ok(T::default()),
        Value::Mapping(m) if m.is_empty() => Ok(T::default()),
        other => serde_yaml::from_value(other.clone()).map_err(|e| FieldError::InvalidOptions {
            type_name: type_name.to_string(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[rstest]
    #[case("Input")]
    #[case("Select")]
    #[case("Multi")]
    #[case("Cycle")]
    #[case("Boolean")]
    #[case("Number")]
    #[case("Date")]
    #[case("DateTime")]
    #[case("Time")]
    #[case("File")]
    #[case("MultiFile")]
    #[case("Media")]
    #[case("MultiMedia")]
    #[case("Lookup")]
    #[case("Formula")]
    #[case("Canvas")]
    #[case("CanvasGroup")]
    #[case("CanvasGroupLink")]
    #[case("YAML")]
    #[case("JSON")]
    #[case("Object")]
    #[case("ObjectList")]
    fn every_type_name_maps_back_to_itself(#[case] name: &str) {
        let kind = FieldKind::from_parts(name, &Value::Null).unwrap();
        assert_eq!(kind.type_name(), name);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = FieldKind::from_parts("Rating", &Value::Null).unwrap_err();
        assert!(matches!(err, FieldError::UnknownType(t) if t == "Rating"));
    }

    #[test]
    fn lookup_options_accept_camel_case() {
        let kind = FieldKind::from_parts(
            "Lookup",
            &yaml(
                "autoUpdate: true\ndvQueryString: '\"Books\"'\ntargetFieldName: author\n\
                 outputType: BuiltinSummarizingFunction\nbuiltinSummarizingFunction: Sum\n\
                 builtinSummarizingFunctionField: pages",
            ),
        )
        .unwrap();
        let FieldKind::Lookup(o) = &kind else { panic!("expected lookup") };
        assert!(o.auto_update);
        assert_eq!(o.source, "\"Books\"");
        assert_eq!(o.target_field_name, "author");
        assert_eq!(o.builtin, Some(Summary::Sum));
        assert_eq!(o.summarized_field_name.as_deref(), Some("pages"));
        assert!(kind.auto_update());
        assert!(kind.is_derived());
    }

    #[test]
    fn malformed_options_error() {
        let err = FieldKind::from_parts("Number", &yaml("min: lots")).unwrap_err();
        assert!(matches!(err, FieldError::InvalidOptions { .. }));
    }

    #[test]
    fn output_kind_string_form() {
        let kinds = [
            OutputKind::Formula,
            OutputKind::Lookup { output: LookupOutput::LinksBulletList, builtin: None },
            OutputKind::Lookup {
                output: LookupOutput::BuiltinSummarizingFunction,
                builtin: Some(Summary::Average),
            },
        ];
        for k in kinds {
            assert_eq!(OutputKind::parse(&k.as_string()), Some(k));
        }
        assert_eq!(OutputKind::parse("Nonsense"), None);
    }

    #[test]
    fn options_value_keeps_settings() {
        let kind = FieldKind::from_parts("Formula", &yaml("formula: current.a + 1")).unwrap();
        let back = FieldKind::from_parts("Formula", &kind.options_value()).unwrap();
        assert_eq!(kind, back);
        assert_eq!(FieldKind::Boolean.options_value(), Value::Null);
    }
}
