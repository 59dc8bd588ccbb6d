//! Templates ("file classes"): reusable field schemas with single-parent
//! inheritance, loaded from notes inside the templates directory.

pub mod definition;
pub mod errors;
pub mod registry;

pub use definition::{RESERVED_KEYS, Template, TemplateDefinition};
pub use errors::TemplateError;
pub use registry::TemplateRegistry;
