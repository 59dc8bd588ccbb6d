//! Field model: definitions, the closed set of field kinds, and value
//! validation.

pub mod definition;
pub mod errors;
pub mod kind;
pub mod validation;

pub use definition::{Field, FieldOwner, PATH_SEPARATOR, RawField};
pub use errors::{FieldError, ValidationError, ValidationResult};
pub use kind::{
    CanvasOptions, ChoiceOptions, DateOptions, FieldKind, FileOptions, FormulaOptions,
    InputOptions, LookupOptions, LookupOutput, NumberOptions, ObjectOptions, OutputKind, Summary,
};
pub use validation::validate_values;
