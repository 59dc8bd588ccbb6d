use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::engine::ReverseUpdatePolicy;
use crate::fields::RawField;

#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub version: u32,
    pub profile: Option<String>,
    pub profiles: HashMap<String, Profile>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    pub vault_root: String,
    /// Folder holding template notes, relative to the vault root
    /// (`{{vault_root}}/...` is accepted too).
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
    /// Template applied to notes that match no other template.
    #[serde(default)]
    pub global_template: Option<String>,
    /// Front-matter key declaring a note's templates.
    #[serde(default = "default_template_alias")]
    pub template_alias: String,
    /// Folders to exclude from scanning (relative to vault_root).
    #[serde(default)]
    pub excluded_folders: Vec<String>,
    /// Where computed values are persisted. Defaults to
    /// `{{vault_root}}/.mdfields/values.db`.
    #[serde(default)]
    pub values_db: Option<String>,
    #[serde(default)]
    pub template_queries: Vec<TemplateQuery>,
    /// Fields applied to notes that no template covers.
    #[serde(default)]
    pub preset_fields: Vec<RawField>,
}

/// Binds a template to every note matching a query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateQuery {
    pub template: String,
    pub query: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file_level: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file_level: None, file: None }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct EngineConfig {
    #[serde(default)]
    pub reverse_update_policy: ReverseUpdatePolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

fn default_template_alias() -> String {
    "fileClass".to_string()
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub active_profile: String,
    pub vault_root: PathBuf,
    /// Vault-relative templates folder, `/` separated.
    pub templates_dir: String,
    pub global_template: Option<String>,
    pub template_alias: String,
    /// Folders to exclude from scanning (resolved to absolute paths).
    pub excluded_folders: Vec<PathBuf>,
    pub values_db: PathBuf,
    pub template_queries: Vec<TemplateQuery>,
    pub preset_fields: Vec<RawField>,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
}
