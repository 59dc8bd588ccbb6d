use std::path::Path;

use mdfields_core::index::Status;

use super::{display_json, load_config, note_path, open_engine};

pub async fn run(config: Option<&Path>, profile: Option<&str>, note: &str, field: &str) {
    let rc = load_config(config, profile, "update");
    let (_vault, engine, _) = open_engine(&rc).await;
    let note = note_path(note);

    match engine.request_field_update(&note, field).await {
        Ok(record) => match &record.status {
            Status::Error(message) => {
                eprintln!("Error computing {field} on {note}: {message}");
                std::process::exit(1);
            }
            status => {
                let value = record.value.as_ref().map(display_json).unwrap_or_default();
                println!("{note} {field} = {value} ({status})");
            }
        },
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
