use std::path::Path;

use mdfields_core::templates::TemplateRegistry;
use tabled::{Table, Tabled, settings::Style};

use super::{load_config, open_vault};

#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "Template")]
    name: String,
    #[tabled(rename = "Extends")]
    ancestors: String,
    #[tabled(rename = "Fields")]
    fields: usize,
    #[tabled(rename = "Tags")]
    tags: String,
    #[tabled(rename = "Queries")]
    queries: usize,
}

pub async fn run(config: Option<&Path>, profile: Option<&str>) {
    let rc = load_config(config, profile, "templates");
    let vault = open_vault(&rc);

    let registry = match TemplateRegistry::load_all(vault.as_ref(), &rc.templates_dir).await {
        Ok(registry) => registry,
        Err(e) => {
            println!("FAIL mdf templates");
            println!("{e}");
            std::process::exit(1);
        }
    };

    if registry.is_empty() {
        println!("(no templates found)");
        return;
    }

    let rows: Vec<TemplateRow> = registry
        .iter()
        .map(|t| TemplateRow {
            name: t.name().to_string(),
            ancestors: t.ancestors.join(" > "),
            fields: t.attributes.len(),
            tags: t.definition.tags.join(", "),
            queries: t.definition.queries.len(),
        })
        .collect();

    println!("{}", Table::new(&rows).with(Style::rounded()));
    println!("-- {} templates --", rows.len());
    for problem in registry.problems() {
        println!("WARN {problem}");
    }
}
