#![allow(clippy::module_name_repetitions)]

//! Schema index and derived-field resolver for markdown vaults.
//!
//! Templates declare typed fields; every note is attributed the fields of
//! the templates it matches. Lookup and formula fields are computed from
//! other notes and tracked with a status telling whether the stored value
//! is current.

pub mod config;
pub mod engine;
pub mod fields;
pub mod frontmatter;
pub mod index;
pub mod query;
pub mod resolve;
pub mod scheduler;
pub mod scripting;
pub mod store;
pub mod templates;
pub mod vault;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
