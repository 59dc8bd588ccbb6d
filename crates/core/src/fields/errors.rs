//! Error types for field definitions and value validation.

use thiserror::Error;

/// Errors raised while turning a raw field definition into a [`super::Field`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("unknown field type: {0}")]
    UnknownType(String),

    #[error("invalid options for {type_name} field: {message}")]
    InvalidOptions { type_name: String, message: String },

    #[error("field definition is missing a name")]
    MissingName,

    #[error("malformed field definition: {0}")]
    Malformed(String),
}

/// A field value that does not fit its field kind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Field value has the wrong shape.
    #[error("invalid type for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Value outside the field's allowed choices.
    #[error("'{value}' is not an allowed value for '{field}' (allowed: {allowed:?})")]
    NotAllowed {
        field: String,
        value: String,
        allowed: Vec<String>,
    },
}

/// Outcome of validating a note's values against its fields.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    /// Non-fatal findings, e.g. values present for fields no template defines.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}
