//! End-to-end runs of the vault commands against a small library vault.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::{TempDir, tempdir};

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

const BOOK: &str = r#"---
fields:
  - name: pages
    type: Number
    options:
      min: 1
  - name: double
    type: Formula
    options:
      autoUpdate: true
      formula: "current.pages * 2"
---
"#;

const AUTHOR: &str = r#"---
fields:
  - name: books
    type: Lookup
    options:
      source: '"Books"'
      targetFieldName: author
      outputType: LinksList
---
"#;

fn setup() -> (TempDir, PathBuf) {
    let tmp = tempdir().unwrap();
    let vault = tmp.path().join("vault");
    write(&vault.join("templates/Book.md"), BOOK);
    write(&vault.join("templates/Author.md"), AUTHOR);
    write(&vault.join("Authors/Herbert.md"), "---\nfileClass: Author\n---\n# Frank Herbert\n");
    write(
        &vault.join("Books/Dune.md"),
        "---\nfileClass: Book\npages: 412\nauthor: \"[[Authors/Herbert]]\"\n---\n",
    );

    let cfg = tmp.path().join("config.toml");
    write(
        &cfg,
        &format!(
            "version = 1\n\n[profiles.default]\nvault_root = \"{}\"\ntemplates_dir = \"templates\"\n\n[logging]\nlevel = \"error\"\n",
            vault.display()
        ),
    );
    (tmp, cfg)
}

fn mdf(cfg: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mdf"));
    cmd.env("NO_COLOR", "1");
    cmd.args(["--config", cfg.to_str().unwrap()]);
    cmd.args(args);
    cmd
}

#[test]
fn templates_lists_loaded_templates() {
    let (_tmp, cfg) = setup();
    mdf(&cfg, &["templates"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Author"))
        .stdout(predicate::str::contains("Book"))
        .stdout(predicate::str::contains("-- 2 templates --"));
}

#[test]
fn index_prints_summary_and_creates_value_db() {
    let (tmp, cfg) = setup();
    mdf(&cfg, &["index"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexing complete:"))
        .stdout(predicate::str::contains("Notes indexed:  2"));
    assert!(tmp.path().join("vault/.mdfields/values.db").exists());
}

#[test]
fn fields_shows_formula_value() {
    let (_tmp, cfg) = setup();
    mdf(&cfg, &["fields", "Books/Dune.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Books/Dune.md: Book"))
        .stdout(predicate::str::contains("double"))
        .stdout(predicate::str::contains("824"));
}

#[test]
fn update_computes_lookup_and_persists_it() {
    let (_tmp, cfg) = setup();
    mdf(&cfg, &["update", "Authors/Herbert", "books"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[[Books/Dune]]"))
        .stdout(predicate::str::contains("UpToDate"));

    // The stored value is picked up by the next run's seed pass.
    mdf(&cfg, &["fields", "Authors/Herbert.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[[Books/Dune]]"))
        .stdout(predicate::str::contains("UpToDate"))
        .stdout(predicate::str::contains("Needs update").not());
}

#[test]
fn fields_lists_lookups_waiting_for_an_update() {
    let (_tmp, cfg) = setup();
    mdf(&cfg, &["fields", "Authors/Herbert.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Needs update: books"));
}

#[test]
fn update_unknown_field_fails() {
    let (_tmp, cfg) = setup();
    mdf(&cfg, &["update", "Authors/Herbert.md", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no field 'nope'"));
}

#[test]
fn validate_reports_out_of_range_values() {
    let (tmp, cfg) = setup();
    mdf(&cfg, &["validate"]).assert().success().stdout(predicate::str::contains("0 invalid"));

    write(&tmp.path().join("vault/Books/Empty.md"), "---\nfileClass: Book\npages: 0\n---\n");
    mdf(&cfg, &["validate", "Books/Empty.md"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAIL Books/Empty.md"))
        .stdout(predicate::str::contains("pages"));
}
