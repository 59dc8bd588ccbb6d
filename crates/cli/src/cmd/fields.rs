use std::path::Path;

use mdfields_core::resolve::yaml_to_json;
use mdfields_core::store::{self, DocumentStore};
use tabled::{Table, Tabled, settings::Style};

use super::{display_json, load_config, note_path, open_engine};

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "From")]
    source: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Status")]
    status: String,
}

pub async fn run(config: Option<&Path>, profile: Option<&str>, note: &str) {
    let rc = load_config(config, profile, "fields");
    let (vault, engine, _) = open_engine(&rc).await;
    let note = note_path(note);

    let index = engine.snapshot();
    let Some(entry) = index.schema.entry(&note) else {
        eprintln!("Error: note not indexed: {note}");
        std::process::exit(1);
    };

    let store: &dyn DocumentStore = vault.as_ref();
    let values = match store::field_values(store, &note).await {
        Ok(values) => values,
        Err(e) => {
            eprintln!("Error reading {note}: {e}");
            std::process::exit(1);
        }
    };

    let rows: Vec<FieldRow> = entry
        .fields
        .iter()
        .map(|attributed| {
            let field = &attributed.field;
            let (value, status) = if field.is_derived() {
                let record = index.record_for(&note, &field.id);
                (
                    record.and_then(|r| r.value.as_ref()).map(display_json).unwrap_or_default(),
                    record.map(|r| r.status.to_string()).unwrap_or_else(|| "-".to_string()),
                )
            } else {
                (
                    values.get(&field.name).map(|v| display_json(&yaml_to_json(v))).unwrap_or_default(),
                    String::new(),
                )
            };
            FieldRow {
                name: format!("{}{}", "  ".repeat(field.depth()), field.name),
                kind: field.kind.type_name().to_string(),
                source: format!("{} ({})", field.owner, attributed.tier),
                value,
                status,
            }
        })
        .collect();

    if entry.matched.is_empty() {
        println!("{note}: no template matched");
    } else {
        println!("{note}: {}", entry.matched.join(", "));
    }
    if rows.is_empty() {
        println!("(no fields)");
        return;
    }
    println!("{}", Table::new(&rows).with(Style::rounded()));

    let stale: Vec<&str> = index
        .records_of(&note)
        .filter(|(_, record)| record.status.needs_update())
        .filter_map(|(key, _)| entry.fields.iter().find(|a| a.field.id == key.field_id))
        .map(|a| a.field.name.as_str())
        .collect();
    if !stale.is_empty() {
        println!("Needs update: {} (run `mdf update {note} <field>`)", stale.join(", "));
    }
}
