pub mod doctor;
pub mod fields;
pub mod index;
pub mod templates;
pub mod update;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use mdfields_core::config::{ConfigLoader, ResolvedConfig, default_config_path};
use mdfields_core::engine::{Engine, PassSummary};
use mdfields_core::index::ValueDb;
use mdfields_core::scheduler::ChangeSignal;
use mdfields_core::scripting::LuaSandbox;
use mdfields_core::store::{FsVault, NotePath};

use crate::logging;

/// Load the config and install logging, or exit with a `FAIL` line.
pub fn load_config(config: Option<&Path>, profile: Option<&str>, command: &str) -> ResolvedConfig {
    match ConfigLoader::load(config, profile) {
        Ok(rc) => {
            logging::init(&rc);
            rc
        }
        Err(e) => {
            println!("FAIL mdf {command}");
            println!("{e}");
            if config.is_none() {
                println!("looked for: {}", default_config_path().display());
            }
            std::process::exit(1);
        }
    }
}

pub fn open_vault(rc: &ResolvedConfig) -> Arc<FsVault> {
    match FsVault::open(&rc.vault_root, rc.excluded_folders.clone()) {
        Ok(vault) => Arc::new(vault),
        Err(e) => {
            eprintln!("Error opening vault: {e}");
            std::process::exit(1);
        }
    }
}

/// Open the vault and the value database, then run the initial full pass.
pub async fn open_engine(rc: &ResolvedConfig) -> (Arc<FsVault>, Engine, PassSummary) {
    let vault = open_vault(rc);
    let settings = match rc.engine_settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error in config: {e}");
            std::process::exit(1);
        }
    };
    let db = match ValueDb::open(&rc.values_db) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error opening value database: {e}");
            std::process::exit(1);
        }
    };

    let engine = Engine::new(vault.clone(), vault.clone(), Arc::new(LuaSandbox::default()), settings);
    let engine = match engine.with_value_db(db) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error loading stored values: {e}");
            std::process::exit(1);
        }
    };

    engine.on_change(&ChangeSignal::StoreReady);
    match engine.run_pending().await {
        Ok(summaries) => {
            let summary = summaries.last().copied().unwrap_or_else(|| {
                eprintln!("Error: no pass ran");
                std::process::exit(1);
            });
            (vault, engine, summary)
        }
        Err(e) => {
            eprintln!("Error during indexing: {e}");
            std::process::exit(1);
        }
    }
}

/// Accept a vault-relative path with or without `.md`.
pub fn note_path(raw: &str) -> NotePath {
    if raw.ends_with(".md") { NotePath::new(raw) } else { NotePath::new(format!("{raw}.md")) }
}

/// One-line rendering of a JSON value for tables.
pub fn display_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.replace('\n', " "),
        serde_json::Value::Array(items) => {
            items.iter().map(display_json).collect::<Vec<_>>().join(", ")
        }
        other => other.to_string(),
    }
}
