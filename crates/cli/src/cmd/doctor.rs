use std::path::Path;

use mdfields_core::config::default_config_path;
use mdfields_core::templates::TemplateRegistry;

use super::{load_config, open_vault};

pub async fn run(config: Option<&Path>, profile: Option<&str>) {
    let rc = load_config(config, profile, "doctor");

    println!("OK   mdf doctor");
    println!(
        "path: {}",
        config.map_or_else(
            || default_config_path().display().to_string(),
            |p| p.display().to_string()
        )
    );
    println!("profile: {}", rc.active_profile);
    println!("vault_root: {}", rc.vault_root.display());
    println!("templates_dir: {}", rc.templates_dir);
    println!("template_alias: {}", rc.template_alias);
    println!("global_template: {}", rc.global_template.as_deref().unwrap_or("(none)"));
    println!("values_db: {}", rc.values_db.display());
    println!("reverse_update_policy: {:?}", rc.engine.reverse_update_policy);

    if let Err(e) = rc.schema_settings() {
        println!("FAIL preset fields: {e}");
        std::process::exit(1);
    }

    let vault = open_vault(&rc);
    println!("notes: {}", vault.len());
    for (note, reason) in vault.broken_notes() {
        println!("WARN unreadable note {note}: {reason}");
    }

    match TemplateRegistry::load_all(vault.as_ref(), &rc.templates_dir).await {
        Ok(registry) => {
            println!("templates: {}", registry.len());
            for problem in registry.problems() {
                println!("WARN {problem}");
            }
        }
        Err(e) => {
            println!("FAIL templates: {e}");
            std::process::exit(1);
        }
    }
}
