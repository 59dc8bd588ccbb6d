//! The `Index` aggregate: everything a pass produces, swapped in as one unit.

use std::collections::BTreeMap;

use crate::fields::Field;
use crate::index::{ComputationRecord, FieldKey, SchemaIndex, Status};
use crate::resolve::LinkResolver;
use crate::scheduler::PassKind;
use crate::store::NotePath;
use crate::templates::TemplateRegistry;

/// Registry, schema, link table and computation records of one pass.
///
/// Readers get an `Arc<Index>` snapshot; a pass builds a new `Index` and
/// replaces the shared one when it completes.
#[derive(Debug, Clone, Default)]
pub struct Index {
    pub registry: TemplateRegistry,
    pub schema: SchemaIndex,
    pub links: LinkResolver,
    pub records: BTreeMap<FieldKey, ComputationRecord>,
}

impl Index {
    /// Find a field of `note` by id or name.
    pub fn field(&self, note: &NotePath, field: &str) -> Option<&Field> {
        self.schema.entry(note)?.field_by_id_or_name(field)
    }

    pub fn record_for(&self, note: &NotePath, field: &str) -> Option<&ComputationRecord> {
        let field = self.field(note, field)?;
        self.records.get(&FieldKey::new(note.clone(), field.id.clone()))
    }

    pub fn value_for(&self, note: &NotePath, field: &str) -> Option<&serde_json::Value> {
        self.record_for(note, field)?.value.as_ref()
    }

    pub fn status_for(&self, note: &NotePath, field: &str) -> Option<&Status> {
        self.record_for(note, field).map(|r| &r.status)
    }

    /// Records of one note, in field-id order.
    pub fn records_of<'a>(
        &'a self,
        note: &'a NotePath,
    ) -> impl Iterator<Item = (&'a FieldKey, &'a ComputationRecord)> + 'a {
        self.records.iter().filter(move |(key, _)| &key.note == note)
    }

    /// Drop records whose note or field is no longer in the schema, and
    /// records of fields that are no longer derived.
    pub(crate) fn prune_records(&mut self) {
        let schema = &self.schema;
        self.records.retain(|key, _| {
            schema
                .entry(&key.note)
                .and_then(|e| e.fields().find(|f| f.id == key.field_id))
                .is_some_and(Field::is_derived)
        });
    }
}

/// Outcome of one completed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub kind: PassKind,
    /// Notes whose schema was (re)resolved.
    pub notes: usize,
    /// Derived fields computed.
    pub computed: usize,
    /// Derived fields flagged `MayHaveChanged`.
    pub marked: usize,
    /// Records left in `Changed`.
    pub changed: usize,
    pub errors: usize,
}

impl PassSummary {
    pub(crate) fn new(kind: PassKind) -> Self {
        Self { kind, notes: 0, computed: 0, marked: 0, changed: 0, errors: 0 }
    }

    pub(crate) fn count(&mut self, record: &ComputationRecord) {
        self.computed += 1;
        match record.status {
            Status::Changed => self.changed += 1,
            Status::Error(_) => self.errors += 1,
            _ => {}
        }
    }
}
