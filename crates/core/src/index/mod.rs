//! Schema index and computed-value records.
//!
//! - [`SchemaIndex`]: per-note field lists from the five attribution tiers
//! - [`ComputationRecord`] and [`Status`]: last value and staleness of each
//!   lookup and formula
//! - [`ValueDb`]: SQLite persistence of those records between runs

pub mod attribution;
pub mod db;
pub mod schema;
pub mod types;

pub use attribution::{AttributionError, SchemaIndex, SchemaSettings, attribute, declared_templates};
pub use db::{ValueDb, ValueDbError};
pub use schema::{SCHEMA_VERSION, SchemaError};
pub use types::{AttributedField, ComputationRecord, FieldKey, SchemaEntry, Status, Tier};
