//! Full and partial passes.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use super::{Engine, EngineError, Index, PassSummary, ReverseUpdatePolicy};
use crate::fields::{Field, FieldKind, OutputKind};
use crate::index::{ComputationRecord, FieldKey, SchemaEntry, SchemaIndex, Status};
use crate::resolve::{
    LinkResolver, LookupSources, Mode, compute_formula, compute_lookup, current_view,
    mark_may_have_changed, settle,
};
use crate::scheduler::PassKind;
use crate::store::{self, FieldValues, NotePath};
use crate::templates::TemplateRegistry;

impl Engine {
    /// Reload templates, rebuild every schema entry, then seed manual
    /// lookups, commit auto lookups and commit auto formulas.
    pub(super) async fn full_pass(&self, previous: &Index) -> Result<(Index, PassSummary), EngineError> {
        let settings = &self.settings.schema;
        let store = self.store.as_ref();

        let registry = TemplateRegistry::load_all(store, &settings.templates_dir).await?;
        let schema = SchemaIndex::rebuild(store, self.queries.as_ref(), &registry, settings).await?;
        let notes = store.list_notes().await?;
        let links = LinkResolver::from_notes(&notes);

        let mut next = Index { registry, schema, links, records: previous.records.clone() };
        next.prune_records();

        let now = Utc::now();
        let mut summary = PassSummary::new(PassKind::Full);
        summary.notes = next.schema.len();

        let entries: Vec<(NotePath, SchemaEntry)> =
            next.schema.iter().map(|(n, e)| (n.clone(), e.clone())).collect();

        for (note, entry) in &entries {
            for field in entry.fields() {
                let FieldKind::Lookup(options) = &field.kind else { continue };
                let mode = if options.auto_update { Mode::Commit } else { Mode::Seed };
                let (key, record) = self.compute_record(&next, note, entry, field, mode, now).await;
                summary.count(&record);
                next.records.insert(key, record);
            }
        }

        for (note, entry) in &entries {
            self.formula_pass(&mut next, note, entry, false, now, &mut summary).await;
        }

        Ok((next, summary))
    }

    /// Re-resolve the changed notes, drop the deleted ones and flag what
    /// they link to. Returns `None` when a full pass was requested meanwhile.
    pub(super) async fn partial_pass(
        &self,
        previous: &Index,
        changed: &BTreeSet<NotePath>,
        deleted: &BTreeSet<NotePath>,
    ) -> Result<Option<(Index, PassSummary)>, EngineError> {
        let settings = &self.settings.schema;
        let mut next = previous.clone();
        let mut summary = PassSummary::new(PassKind::Partial);
        let now = Utc::now();

        let notes = self.store.list_notes().await?;
        next.links = LinkResolver::from_notes(&notes);

        // (note linked to, value name it is linked through)
        let mut targets: BTreeSet<(NotePath, String)> = BTreeSet::new();

        for note in deleted {
            if self.upgrade_requested() {
                return Ok(None);
            }
            if let Some(old) = next.schema.remove(note) {
                collect_targets(&old, &mut targets);
            }
            tracing::debug!(note = %note, "Dropped note");
        }

        let mut resolved = Vec::new();
        for note in changed {
            if self.upgrade_requested() {
                return Ok(None);
            }
            let old = next.schema.entry(note).cloned();
            let result = SchemaIndex::resolve_note(
                self.store.as_ref(),
                self.queries.as_ref(),
                &next.registry,
                settings,
                note,
            )
            .await;
            match result {
                Ok(Some(entry)) => {
                    collect_targets(&entry, &mut targets);
                    next.schema.insert(note.clone(), entry);
                    resolved.push(note.clone());
                    summary.notes += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(note = %note, error = %e, "Skipping note");
                    next.schema.mark_skipped(note.clone(), e.to_string());
                }
            }
            if let Some(old) = old {
                collect_targets(&old, &mut targets);
            }
        }
        next.prune_records();

        for note in &resolved {
            if self.upgrade_requested() {
                return Ok(None);
            }
            let Some(entry) = next.schema.entry(note).cloned() else { continue };
            self.formula_pass(&mut next, note, &entry, true, now, &mut summary).await;
        }

        let mut handled: HashSet<FieldKey> = HashSet::new();
        let mut touched: BTreeSet<NotePath> = BTreeSet::new();
        for (target, via) in &targets {
            let Some(entry) = next.schema.entry(target).cloned() else { continue };
            for field in entry.fields() {
                let FieldKind::Lookup(options) = &field.kind else { continue };
                if options.target_field_name != *via {
                    continue;
                }
                let key = FieldKey::new(target.clone(), field.id.clone());
                if !handled.insert(key.clone()) {
                    continue;
                }
                touched.insert(target.clone());

                let eager = self.settings.reverse_update_policy == ReverseUpdatePolicy::EagerAutoUpdate
                    && options.auto_update;
                if eager {
                    if self.upgrade_requested() {
                        return Ok(None);
                    }
                    let (key, record) =
                        self.compute_record(&next, target, &entry, field, Mode::Commit, now).await;
                    summary.count(&record);
                    next.records.insert(key, record);
                } else {
                    mark(&mut next, key, field, &mut summary);
                }
            }
        }

        for target in &touched {
            let Some(entry) = next.schema.entry(target).cloned() else { continue };
            match self.settings.reverse_update_policy {
                ReverseUpdatePolicy::MarkOnly => {
                    for field in entry.fields().filter(|f| matches!(f.kind, FieldKind::Formula(_))) {
                        let key = FieldKey::new(target.clone(), field.id.clone());
                        mark(&mut next, key, field, &mut summary);
                    }
                }
                ReverseUpdatePolicy::EagerAutoUpdate => {
                    if self.upgrade_requested() {
                        return Ok(None);
                    }
                    self.formula_pass(&mut next, target, &entry, true, now, &mut summary).await;
                }
            }
        }

        Ok(Some((next, summary)))
    }

    /// Commit the auto formulas of one note in field order, so later
    /// formulas see earlier results. Manual formulas are flagged when
    /// `mark_manual` is set and left alone otherwise.
    async fn formula_pass(
        &self,
        index: &mut Index,
        note: &NotePath,
        entry: &SchemaEntry,
        mark_manual: bool,
        now: DateTime<Utc>,
        summary: &mut PassSummary,
    ) {
        let formulas: Vec<&Field> =
            entry.fields().filter(|f| matches!(f.kind, FieldKind::Formula(_))).collect();
        if formulas.is_empty() {
            return;
        }
        let values = store::field_values(self.store.as_ref(), note).await.map_err(|e| e.to_string());

        for field in formulas {
            let key = FieldKey::new(note.clone(), field.id.clone());
            if !field.kind.auto_update() {
                if mark_manual {
                    mark(index, key, field, summary);
                }
                continue;
            }
            let outcome = match &values {
                Ok(values) => self.run_formula(index, note, entry, field, values).await,
                Err(message) => Err(message.clone()),
            };
            let record = settle(index.records.get(&key), OutputKind::Formula, outcome, Mode::Commit, now);
            log_outcome(&key, &record);
            summary.count(&record);
            index.records.insert(key, record);
        }
    }

    /// Compute one derived field and reconcile it with its stored record.
    pub(super) async fn compute_record(
        &self,
        index: &Index,
        note: &NotePath,
        entry: &SchemaEntry,
        field: &Field,
        mode: Mode,
        now: DateTime<Utc>,
    ) -> (FieldKey, ComputationRecord) {
        let key = FieldKey::new(note.clone(), field.id.clone());
        let output_kind = field.kind.output_kind().unwrap_or(OutputKind::Formula);
        let outcome = match &field.kind {
            FieldKind::Lookup(options) => {
                let sources = LookupSources {
                    store: self.store.as_ref(),
                    queries: self.queries.as_ref(),
                    sandbox: self.sandbox.as_ref(),
                    links: &index.links,
                };
                compute_lookup(sources, note, options).await.map_err(|e| e.to_string())
            }
            FieldKind::Formula(_) => {
                match store::field_values(self.store.as_ref(), note).await {
                    Ok(values) => self.run_formula(index, note, entry, field, &values).await,
                    Err(e) => Err(e.to_string()),
                }
            }
            other => Err(format!("{} fields are not computed", other.type_name())),
        };
        let record = settle(index.records.get(&key), output_kind, outcome, mode, now);
        log_outcome(&key, &record);
        (key, record)
    }

    async fn run_formula(
        &self,
        index: &Index,
        note: &NotePath,
        entry: &SchemaEntry,
        field: &Field,
        values: &FieldValues,
    ) -> Result<serde_json::Value, String> {
        let FieldKind::Formula(options) = &field.kind else {
            return Err(format!("'{}' is not a formula", field.name));
        };
        let derived = entry.fields().filter(|f| f.is_derived() && f.id != field.id).filter_map(|f| {
            index
                .records
                .get(&FieldKey::new(note.clone(), f.id.clone()))
                .and_then(|r| r.value.as_ref())
                .map(|v| (f.name.as_str(), v))
        });
        let current = current_view(note, values, derived);
        compute_formula(self.sandbox.as_ref(), options, current).await.map_err(|e| e.to_string())
    }

    fn upgrade_requested(&self) -> bool {
        self.scheduler().upgrade_requested()
    }
}

fn mark(index: &mut Index, key: FieldKey, field: &Field, summary: &mut PassSummary) {
    let output_kind = field.kind.output_kind().unwrap_or(OutputKind::Formula);
    let record = mark_may_have_changed(index.records.get(&key), output_kind);
    tracing::debug!(field = %key, status = %record.status, "Marked");
    summary.marked += 1;
    index.records.insert(key, record);
}

fn log_outcome(key: &FieldKey, record: &ComputationRecord) {
    match &record.status {
        Status::Error(message) => {
            tracing::debug!(field = %key, error = %message, "Computation failed");
        }
        status => tracing::debug!(field = %key, status = %status, "Computed"),
    }
}

/// Every (note, value name) pair `entry` links to.
fn collect_targets(entry: &SchemaEntry, targets: &mut BTreeSet<(NotePath, String)>) {
    for (via, notes) in &entry.references {
        for note in notes {
            targets.insert((note.clone(), via.clone()));
        }
    }
}
