#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use mdfields_core::engine::{Engine, EngineSettings};
use mdfields_core::scheduler::ChangeSignal;
use mdfields_core::scripting::LuaSandbox;
use mdfields_core::store::{MemoryNote, MemoryStore, NotePath};
use serde_yaml::Value;

/// A template note declaring `fields` (YAML list).
pub fn template(fields: &str) -> MemoryNote {
    MemoryNote::new().with_field("fields", yaml(fields))
}

pub fn yaml(s: &str) -> Value {
    serde_yaml::from_str(s).unwrap()
}

pub fn link(target: &str) -> Value {
    Value::String(format!("[[{target}]]"))
}

pub fn engine(store: &Arc<MemoryStore>, settings: EngineSettings) -> Engine {
    Engine::new(store.clone(), store.clone(), Arc::new(LuaSandbox::default()), settings)
}

/// Signal readiness and run the initial full pass.
pub async fn ready(engine: &Engine) {
    engine.on_change(&ChangeSignal::StoreReady);
    engine.run_pending().await.unwrap();
}

pub fn changed(note: &str) -> ChangeSignal {
    ChangeSignal::MetadataChanged { note: NotePath::new(note), timestamp: Utc::now() }
}

pub fn deleted(note: &str) -> ChangeSignal {
    ChangeSignal::Deleted { note: NotePath::new(note), timestamp: Utc::now() }
}

pub fn renamed(from: &str, to: &str) -> ChangeSignal {
    ChangeSignal::Renamed { from: NotePath::new(from), to: NotePath::new(to), timestamp: Utc::now() }
}
