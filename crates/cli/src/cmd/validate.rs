//! Validate command implementation.

use std::path::Path;

use mdfields_core::store::NotePath;

use super::{load_config, note_path, open_engine};

pub async fn run(config: Option<&Path>, profile: Option<&str>, note: Option<&str>) {
    let rc = load_config(config, profile, "validate");
    let (_vault, engine, _) = open_engine(&rc).await;

    let notes: Vec<NotePath> = match note {
        Some(raw) => vec![note_path(raw)],
        None => engine.snapshot().schema.notes().cloned().collect(),
    };

    let mut invalid = 0usize;
    let mut checked = 0usize;
    for note in &notes {
        let result = match engine.validate_note(note).await {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        };
        checked += 1;
        for warning in &result.warnings {
            println!("WARN {note}: {warning}");
        }
        if !result.is_valid() {
            invalid += 1;
            for error in &result.errors {
                println!("FAIL {note}: {error}");
            }
        }
    }

    println!("-- {checked} notes checked, {invalid} invalid --");
    if invalid > 0 {
        std::process::exit(1);
    }
}
