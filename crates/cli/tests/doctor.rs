use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_file(path: &PathBuf, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn doctor_reads_provided_config_path() {
    let tmp = tempdir().unwrap();
    let vault = tmp.path().join("vault");
    write_file(&vault.join("templates/Book.md"), "---\nfields:\n  - name: pages\n    type: Number\n---\n");
    let cfg = tmp.path().join("config.toml");
    write_file(
        &cfg,
        &format!(
            r#"
version = 1
profile = "default"

[profiles.default]
vault_root = "{}"
templates_dir = "{{{{vault_root}}}}/templates"
global_template = "Book"
"#,
            vault.display()
        ),
    );

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mdf"));
    cmd.args(["doctor", "--config", cfg.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("OK   mdf doctor"))
        .stdout(predicate::str::contains("profile: default"))
        .stdout(predicate::str::contains("templates_dir: templates"))
        .stdout(predicate::str::contains("global_template: Book"))
        .stdout(predicate::str::contains("templates: 1"));
}

#[test]
fn doctor_fails_when_config_missing() {
    let tmp = tempdir().unwrap();
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mdf"));
    cmd.env("XDG_CONFIG_HOME", tmp.path());
    cmd.arg("doctor");
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("FAIL mdf doctor"))
        .stdout(predicate::str::contains("looked for:"));
}

#[test]
fn doctor_uses_xdg_default_when_present() {
    let tmp = tempdir().unwrap();
    let vault = tmp.path().join("vault");
    fs::create_dir_all(&vault).unwrap();
    write_file(
        &tmp.path().join("mdfields/config.toml"),
        &format!("version = 1\n[profiles.default]\nvault_root = \"{}\"\n", vault.display()),
    );

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mdf"));
    cmd.env("XDG_CONFIG_HOME", tmp.path());
    cmd.arg("doctor");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("templates_dir: templates"))
        .stdout(predicate::str::contains("template_alias: fileClass"))
        .stdout(predicate::str::contains("notes: 0"));
}
