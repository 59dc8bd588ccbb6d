//! Explicit single-field updates.

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::watch;

use super::{Engine, EngineError, InflightMap};
use crate::index::{ComputationRecord, FieldKey};
use crate::resolve::Mode;
use crate::store::NotePath;

/// Removes the in-flight entry when the leading request finishes or is
/// dropped.
struct InflightGuard<'a> {
    inflight: &'a Mutex<InflightMap>,
    key: FieldKey,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}

enum Role {
    Leader(watch::Sender<Option<ComputationRecord>>),
    Follower(watch::Receiver<Option<ComputationRecord>>),
}

impl Engine {
    /// Recompute one lookup or formula now and write the result.
    ///
    /// `field` is a field id or name. The record comes back `UpToDate`, or
    /// `Error` with the previous value kept. Concurrent requests for the same
    /// field share one computation.
    pub async fn request_field_update(
        &self,
        note: &NotePath,
        field: &str,
    ) -> Result<ComputationRecord, EngineError> {
        let key = self.derived_key(note, field)?;

        let role = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            match inflight.get(&key) {
                Some(rx) => Role::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.clone(), rx);
                    Role::Leader(tx)
                }
            }
        };

        let tx = match role {
            Role::Follower(mut rx) => {
                tracing::debug!(field = %key, "Joining in-flight update");
                let record = rx
                    .wait_for(Option::is_some)
                    .await
                    .map_err(|_| EngineError::UpdateCancelled(key.clone()))?
                    .clone();
                return record.ok_or(EngineError::UpdateCancelled(key));
            }
            Role::Leader(tx) => tx,
        };

        let _guard = InflightGuard { inflight: &self.inflight, key: key.clone() };
        let record = self.refresh(&key).await?;
        tx.send_replace(Some(record.clone()));
        Ok(record)
    }

    fn derived_key(&self, note: &NotePath, field: &str) -> Result<FieldKey, EngineError> {
        let index = self.snapshot();
        let found = index.field(note, field).ok_or_else(|| {
            if index.schema.entry(note).is_some() {
                EngineError::UnknownField { note: note.clone(), field: field.to_string() }
            } else {
                EngineError::UnknownNote(note.clone())
            }
        })?;
        if !found.is_derived() {
            return Err(EngineError::NotDerived { note: note.clone(), field: field.to_string() });
        }
        Ok(FieldKey::new(note.clone(), found.id.clone()))
    }

    async fn refresh(&self, key: &FieldKey) -> Result<ComputationRecord, EngineError> {
        let _pass = self.pass_lock.lock().await;

        // A pass may have run while waiting for the lock.
        let current = self.snapshot();
        let entry = current
            .schema
            .entry(&key.note)
            .ok_or_else(|| EngineError::UnknownNote(key.note.clone()))?;
        let field = entry.field_by_id_or_name(&key.field_id).ok_or_else(|| {
            EngineError::UnknownField { note: key.note.clone(), field: key.field_id.clone() }
        })?;

        let (key, record) =
            self.compute_record(&current, &key.note, entry, field, Mode::Refresh, Utc::now()).await;

        let mut next = (*current).clone();
        next.records.insert(key.clone(), record.clone());
        self.persist(vec![(&key, Some(&record))]);
        self.swap(next);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::engine::EngineSettings;
    use crate::index::Status;
    use crate::scheduler::ChangeSignal;
    use crate::scripting::{Bindings, ScriptError, ScriptSandbox};
    use crate::store::{MemoryNote, MemoryStore};

    /// Answers every expression with 42 after a delay, counting runs.
    #[derive(Default)]
    struct SlowSandbox {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl ScriptSandbox for SlowSandbox {
        async fn run(&self, _expression: &str, _bindings: &Bindings) -> Result<serde_json::Value, ScriptError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(json!(42))
        }
    }

    fn engine_with(sandbox: Arc<SlowSandbox>) -> Engine {
        let store = Arc::new(MemoryStore::new());
        store.insert(
            "templates/Calc.md",
            MemoryNote::new().with_field(
                "fields",
                serde_yaml::from_str::<serde_yaml::Value>(
                    "- name: answer\n  type: Formula\n  options:\n    formula: \"42\"\n",
                )
                .unwrap(),
            ),
        );
        store.insert("Sheet.md", MemoryNote::new().with_field("fileClass", "Calc"));
        Engine::new(store.clone(), store, sandbox, EngineSettings::default())
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_coalesced() {
        let sandbox = Arc::new(SlowSandbox::default());
        let engine = engine_with(sandbox.clone());
        engine.on_change(&ChangeSignal::StoreReady);
        engine.run_pending().await.unwrap();
        assert_eq!(sandbox.runs.load(Ordering::SeqCst), 0);

        let note = NotePath::new("Sheet.md");
        let (a, b) = tokio::join!(
            engine.request_field_update(&note, "answer"),
            engine.request_field_update(&note, "answer"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(sandbox.runs.load(Ordering::SeqCst), 1);
        assert_eq!(a, b);
        assert_eq!(a.value, Some(json!(42)));
        assert_eq!(a.status, Status::UpToDate);

        engine.request_field_update(&note, "answer").await.unwrap();
        assert_eq!(sandbox.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_targets() {
        let engine = engine_with(Arc::new(SlowSandbox::default()));
        engine.on_change(&ChangeSignal::StoreReady);
        engine.run_pending().await.unwrap();

        let note = NotePath::new("Sheet.md");
        assert!(matches!(
            engine.request_field_update(&NotePath::new("Nope.md"), "answer").await,
            Err(EngineError::UnknownNote(_))
        ));
        assert!(matches!(
            engine.request_field_update(&note, "missing").await,
            Err(EngineError::UnknownField { .. })
        ));
        assert!(engine.fields_for(&note).iter().any(|f| f.name == "answer"));
    }
}
