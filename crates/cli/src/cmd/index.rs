//! Index command: one full pass with a summary.

use std::path::Path;
use std::time::Instant;

use super::{load_config, open_engine};

pub async fn run(config: Option<&Path>, profile: Option<&str>) {
    let rc = load_config(config, profile, "index");
    println!("Indexing vault: {}", rc.vault_root.display());

    let start = Instant::now();
    let (_vault, engine, summary) = open_engine(&rc).await;
    let index = engine.snapshot();

    println!();
    println!("Indexing complete:");
    println!("  Templates:      {}", index.registry.len());
    println!("  Notes indexed:  {}", summary.notes);
    if !index.schema.skipped().is_empty() {
        println!("  Notes skipped:  {}", index.schema.skipped().len());
    }
    println!("  Computed:       {}", summary.computed);
    println!("  Changed:        {}", summary.changed);
    println!("  Errors:         {}", summary.errors);
    println!("  Duration:       {}ms", start.elapsed().as_millis());
    println!();
    println!("Values stored at: {}", rc.values_db.display());

    for (note, reason) in index.schema.skipped() {
        println!("WARN skipped {note}: {reason}");
    }
}
