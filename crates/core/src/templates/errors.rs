//! Error types for template loading and inheritance resolution.

use thiserror::Error;

use crate::fields::FieldError;
use crate::store::NotePath;

/// A template that could not be loaded or whose ancestry is broken.
///
/// Loading errors skip the affected template only; ancestry problems end the
/// chain at the offending link.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("malformed template {path}: {message}")]
    Malformed { path: NotePath, message: String },

    #[error("invalid field in template {template}: {source}")]
    InvalidField {
        template: String,
        #[source]
        source: FieldError,
    },

    #[error("failed to read template {path}: {message}")]
    Unreadable { path: NotePath, message: String },

    #[error("template {template} extends unknown template {parent}")]
    UnknownParent { template: String, parent: String },

    #[error("template {template} has a cyclic ancestry through {at}")]
    Cycle { template: String, at: String },

    #[error("duplicate template name {name} ({path})")]
    Duplicate { name: String, path: NotePath },
}
