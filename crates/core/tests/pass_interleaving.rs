use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mdfields_core::engine::{Engine, EngineSettings};
use mdfields_core::scheduler::{Admission, PassKind, SchedulerState};
use mdfields_core::scripting::{Bindings, ScriptError, ScriptSandbox};
use mdfields_core::store::{MemoryNote, MemoryStore, NotePath};
use serde_json::json;

mod common;
use common::{changed, ready, template};

const SHEET: &str = "
- name: score
  type: Formula
  options:
    autoUpdate: true
    formula: '1'
";

/// Answers every formula with 1 after a delay. When armed, the first run
/// also edits the store.
struct SlowSandbox {
    store: Arc<MemoryStore>,
    runs: AtomicUsize,
    armed: AtomicBool,
}

#[async_trait]
impl ScriptSandbox for SlowSandbox {
    async fn run(&self, _expression: &str, _bindings: &Bindings) -> Result<serde_json::Value, ScriptError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.armed.swap(false, Ordering::SeqCst) {
            self.store.insert("Late.md", MemoryNote::new().with_field("fileClass", "Sheet"));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(json!(1))
    }
}

fn setup() -> (Arc<MemoryStore>, Arc<SlowSandbox>, Engine) {
    let store = Arc::new(MemoryStore::new());
    store.insert("templates/Sheet.md", template(SHEET));
    store.insert("A.md", MemoryNote::new().with_field("fileClass", "Sheet"));
    store.insert("B.md", MemoryNote::new().with_field("fileClass", "Sheet"));
    let sandbox = Arc::new(SlowSandbox {
        store: store.clone(),
        runs: AtomicUsize::new(0),
        armed: AtomicBool::new(false),
    });
    let engine = Engine::new(store.clone(), store.clone(), sandbox.clone(), EngineSettings::default());
    (store, sandbox, engine)
}

#[tokio::test]
async fn full_request_supersedes_running_partial_pass() {
    let (_store, _sandbox, engine) = setup();
    ready(&engine).await;

    engine.on_change(&changed("A.md"));
    engine.on_change(&changed("B.md"));

    let (summaries, admission) = tokio::join!(engine.run_pending(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(engine.scheduler_state(), SchedulerState::PartialPass);
        engine.on_change(&changed("templates/Sheet.md"))
    });

    assert_eq!(admission, Admission::Queued(PassKind::Full));
    let summaries = summaries.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].kind, PassKind::Full);
    assert_eq!(engine.scheduler_state(), SchedulerState::Idle);
    assert!(!engine.has_pending());
}

#[tokio::test]
async fn store_edit_during_pass_queues_full_pass() {
    let (_store, sandbox, engine) = setup();
    ready(&engine).await;
    assert!(engine.snapshot().schema.entry(&NotePath::new("Late.md")).is_none());

    sandbox.armed.store(true, Ordering::SeqCst);
    engine.on_change(&changed("A.md"));
    let summaries = engine.run_pending().await.unwrap();

    let kinds: Vec<PassKind> = summaries.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![PassKind::Partial, PassKind::Full]);
    assert_eq!(engine.value_for(&NotePath::new("Late.md"), "score"), Some(json!(1)));
    assert!(sandbox.runs.load(Ordering::SeqCst) >= 4);
}
