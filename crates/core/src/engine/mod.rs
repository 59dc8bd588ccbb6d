//! The engine: owns the shared [`Index`], drives passes and answers reads.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mdfields_core::engine::{Engine, EngineSettings};
//! use mdfields_core::scheduler::ChangeSignal;
//! use mdfields_core::scripting::LuaSandbox;
//! use mdfields_core::store::MemoryStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let engine = Engine::new(store.clone(), store, Arc::new(LuaSandbox::default()), EngineSettings::default());
//! engine.on_change(&ChangeSignal::StoreReady);
//! engine.run_pending().await?;
//! # Ok(())
//! # }
//! ```

mod index;
mod pass;
mod update;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::fields::{Field, ValidationResult, validate_values};
use crate::index::{ComputationRecord, FieldKey, SchemaSettings, Status, ValueDb, ValueDbError};
use crate::scheduler::{Admission, ChangeSignal, DiscardReason, IndexScheduler, PassOutcome, PassPlan, SchedulerState};
use crate::scripting::ScriptSandbox;
use crate::store::{self, DocumentStore, NotePath, QueryEvaluator, StoreError};

pub use index::{Index, PassSummary};

/// What a partial pass does with lookups on notes an edited note links to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverseUpdatePolicy {
    /// Flag them `MayHaveChanged` and leave the update to the user.
    #[default]
    MarkOnly,
    /// Recompute auto-update lookups right away; mark the rest.
    EagerAutoUpdate,
}

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub schema: SchemaSettings,
    pub reverse_update_policy: ReverseUpdatePolicy,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("document store error: {0}")]
    Store(#[from] StoreError),

    #[error("value database error: {0}")]
    Database(#[from] ValueDbError),

    #[error("note not indexed: {0}")]
    UnknownNote(NotePath),

    #[error("note {note} has no field '{field}'")]
    UnknownField { note: NotePath, field: String },

    #[error("field '{field}' of {note} is not a lookup or formula")]
    NotDerived { note: NotePath, field: String },

    #[error("update of {0} was cancelled")]
    UpdateCancelled(FieldKey),
}

type InflightMap = HashMap<FieldKey, watch::Receiver<Option<ComputationRecord>>>;

/// Schema index and derived-field resolver over a document store.
pub struct Engine {
    store: Arc<dyn DocumentStore>,
    queries: Arc<dyn QueryEvaluator>,
    sandbox: Arc<dyn ScriptSandbox>,
    settings: EngineSettings,
    index: RwLock<Arc<Index>>,
    scheduler: Mutex<IndexScheduler>,
    /// Held for the whole of a pass or a field update.
    pass_lock: tokio::sync::Mutex<()>,
    inflight: Mutex<InflightMap>,
    db: Option<Mutex<ValueDb>>,
    /// `StoreReady` arrived while the evaluator was still loading.
    ready_deferred: AtomicBool,
}

impl Engine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        queries: Arc<dyn QueryEvaluator>,
        sandbox: Arc<dyn ScriptSandbox>,
        settings: EngineSettings,
    ) -> Self {
        let scheduler = IndexScheduler::new(Utc::now(), settings.schema.templates_dir.clone());
        Self {
            store,
            queries,
            sandbox,
            settings,
            index: RwLock::new(Arc::new(Index::default())),
            scheduler: Mutex::new(scheduler),
            pass_lock: tokio::sync::Mutex::new(()),
            inflight: Mutex::new(HashMap::new()),
            db: None,
            ready_deferred: AtomicBool::new(false),
        }
    }

    /// Persist computed values in `db`, starting from the records it holds.
    pub fn with_value_db(self, db: ValueDb) -> Result<Self, EngineError> {
        let records = db.load_all()?;
        tracing::debug!(records = records.len(), "Loaded previous values");
        let index = Index { records: records.into_iter().collect(), ..Index::default() };
        Ok(Self { index: RwLock::new(Arc::new(index)), db: Some(Mutex::new(db)), ..self })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The current index. Cheap; the snapshot never changes under the caller.
    pub fn snapshot(&self) -> Arc<Index> {
        self.index.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Admit a change signal. Work is queued; call [`Engine::run_pending`]
    /// to perform it.
    ///
    /// While the query evaluator reports not ready every signal is
    /// discarded. A `StoreReady` seen in that state is remembered and
    /// admitted once the evaluator is ready.
    pub fn on_change(&self, signal: &ChangeSignal) -> Admission {
        if !self.queries.is_ready() {
            if matches!(signal, ChangeSignal::StoreReady) {
                self.ready_deferred.store(true, Ordering::SeqCst);
            }
            tracing::trace!(signal = signal.kind(), "Query evaluator not ready, discarding signal");
            return Admission::Discarded(DiscardReason::NotReady);
        }
        let revision = self.queries.revision();
        let mut scheduler = self.scheduler();
        if self.ready_deferred.swap(false, Ordering::SeqCst) {
            scheduler.admit(&ChangeSignal::StoreReady, revision);
        }
        scheduler.admit(signal, revision)
    }

    /// Queue a full pass and run everything pending.
    pub async fn request_full_index(&self) -> Result<Vec<PassSummary>, EngineError> {
        self.scheduler().request_full();
        self.run_pending().await
    }

    /// Run queued passes until none is left.
    ///
    /// A pass that fails stays queued and the error is returned; the
    /// previous index stays in place.
    pub async fn run_pending(&self) -> Result<Vec<PassSummary>, EngineError> {
        let _pass = self.pass_lock.lock().await;
        let mut summaries = Vec::new();

        if self.queries.is_ready() && self.ready_deferred.swap(false, Ordering::SeqCst) {
            self.scheduler().admit(&ChangeSignal::StoreReady, self.queries.revision());
        }

        loop {
            let plan = self.scheduler().begin_pass(self.queries.revision());
            let Some(plan) = plan else { break };

            let previous = self.snapshot();
            let result = match &plan {
                PassPlan::Full => self.full_pass(&previous).await.map(Some),
                PassPlan::Partial { changed, deleted } => {
                    self.partial_pass(&previous, changed, deleted).await
                }
            };

            match result {
                Ok(Some((next, summary))) => {
                    self.persist_diff(&previous, &next);
                    self.swap(next);
                    self.scheduler().finish_pass(PassOutcome::Completed, self.queries.revision());
                    tracing::info!(
                        kind = ?summary.kind,
                        notes = summary.notes,
                        computed = summary.computed,
                        marked = summary.marked,
                        changed = summary.changed,
                        errors = summary.errors,
                        "Pass complete"
                    );
                    summaries.push(summary);
                }
                Ok(None) => {
                    tracing::debug!("Partial pass superseded by full pass");
                    self.scheduler().finish_pass(PassOutcome::Superseded, self.queries.revision());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Pass aborted");
                    self.scheduler().finish_pass(PassOutcome::Failed, self.queries.revision());
                    return Err(e);
                }
            }
        }
        Ok(summaries)
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler().state()
    }

    pub fn has_pending(&self) -> bool {
        self.scheduler().has_pending()
    }

    /// Fields attributed to `note`, in priority order.
    pub fn fields_for(&self, note: &NotePath) -> Vec<Field> {
        self.snapshot().schema.fields_for(note)
    }

    pub fn matched_templates(&self, note: &NotePath) -> Vec<String> {
        self.snapshot().schema.matched_templates(note).to_vec()
    }

    /// Last written value of a lookup or formula, by field id or name.
    pub fn value_for(&self, note: &NotePath, field: &str) -> Option<serde_json::Value> {
        self.snapshot().value_for(note, field).cloned()
    }

    pub fn status_for(&self, note: &NotePath, field: &str) -> Option<Status> {
        self.snapshot().status_for(note, field).cloned()
    }

    pub fn record_for(&self, note: &NotePath, field: &str) -> Option<ComputationRecord> {
        self.snapshot().record_for(note, field).cloned()
    }

    /// Check a note's stored values against its fields.
    ///
    /// The template key and `tags` are bookkeeping, not field values, and
    /// are left out.
    pub async fn validate_note(&self, note: &NotePath) -> Result<ValidationResult, EngineError> {
        let index = self.snapshot();
        let entry = index.schema.entry(note).ok_or_else(|| EngineError::UnknownNote(note.clone()))?;
        let fields: Vec<Field> = entry.fields().cloned().collect();

        let mut values = store::field_values(self.store.as_ref(), note).await?;
        values.remove(&self.settings.schema.template_alias);
        values.remove("tags");
        values.remove("tag");

        Ok(validate_values(&fields, &values))
    }

    fn scheduler(&self) -> std::sync::MutexGuard<'_, IndexScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn swap(&self, next: Index) {
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    /// Write records that differ between two indexes. Failures are logged;
    /// the in-memory index stays authoritative.
    fn persist_diff(&self, previous: &Index, next: &Index) {
        let changed = next
            .records
            .iter()
            .filter(|(key, record)| previous.records.get(*key) != Some(*record))
            .map(|(key, record)| (key, Some(record)));
        let removed = previous
            .records
            .keys()
            .filter(|key| !next.records.contains_key(*key))
            .map(|key| (key, None));
        let changes: Vec<_> = changed.chain(removed).collect();
        self.persist(changes);
    }

    fn persist<'a>(&self, changes: Vec<(&'a FieldKey, Option<&'a ComputationRecord>)>) {
        let Some(db) = &self.db else { return };
        if changes.is_empty() {
            return;
        }
        let db = db.lock().unwrap_or_else(PoisonError::into_inner);
        match db.apply(changes) {
            Ok(n) => tracing::debug!(records = n, "Persisted values"),
            Err(e) => tracing::error!(error = %e, "Failed to persist values"),
        }
    }
}
