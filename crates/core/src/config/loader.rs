use std::path::{Path, PathBuf};
use std::{env, fs};

use dirs::home_dir;
use shellexpand::full;
use thiserror::Error;

use crate::config::types::{ConfigFile, EngineConfig, LoggingConfig, Profile, ResolvedConfig};
use crate::engine::EngineSettings;
use crate::fields::{Field, FieldError, FieldOwner};
use crate::index::SchemaSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0}")]
    NotFound(String),

    #[error("failed to read config file {0}: {1}")]
    ReadError(String, #[source] std::io::Error),

    #[error("failed to parse TOML in {0}: {1}")]
    ParseError(String, #[source] toml::de::Error),

    #[error("profile '{0}' not found")]
    ProfileNotFound(String),

    #[error("no profiles defined in config")]
    NoProfiles,

    #[error("version {0} is unsupported (expected 1)")]
    BadVersion(u32),

    #[error("home directory not available to expand '~'")]
    NoHome,

    #[error("templates_dir '{0}' is outside the vault")]
    TemplatesOutsideVault(String),

    #[error("invalid preset field: {0}")]
    InvalidPreset(#[source] FieldError),
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(
        config_path: Option<&Path>,
        profile_override: Option<&str>,
    ) -> Result<ResolvedConfig, ConfigError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };

        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let s = fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e))?;

        let cf: ConfigFile = toml::from_str(&s)
            .map_err(|e| ConfigError::ParseError(path.display().to_string(), e))?;

        if cf.version != 1 {
            return Err(ConfigError::BadVersion(cf.version));
        }
        if cf.profiles.is_empty() {
            return Err(ConfigError::NoProfiles);
        }

        let active = profile_override
            .map(ToOwned::to_owned)
            .or(cf.profile.clone())
            .unwrap_or_else(|| "default".to_string());

        let prof = cf
            .profiles
            .get(&active)
            .ok_or_else(|| ConfigError::ProfileNotFound(active.clone()))?;

        let resolved = Self::resolve_profile(&active, prof, &cf.logging, &cf.engine)?;
        tracing::debug!(profile = %active, vault = %resolved.vault_root.display(), "Loaded config");
        Ok(resolved)
    }

    fn resolve_profile(
        active: &str,
        prof: &Profile,
        log_cfg: &LoggingConfig,
        engine: &EngineConfig,
    ) -> Result<ResolvedConfig, ConfigError> {
        let vault_root = expand_path(&prof.vault_root)?;
        let sub = |s: &str| s.replace("{{vault_root}}", &vault_root.to_string_lossy());

        let templates_dir = vault_relative(&vault_root, &sub(&prof.templates_dir))?;
        let excluded_folders = prof
            .excluded_folders
            .iter()
            .map(|f| {
                let p = expand_path(&sub(f))?;
                Ok(if p.is_absolute() { p } else { vault_root.join(p) })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let values_db = match &prof.values_db {
            Some(db) => expand_path(&sub(db))?,
            None => vault_root.join(".mdfields").join("values.db"),
        };

        let logging = if let Some(ref file) = log_cfg.file {
            let expanded_file = expand_path(&sub(&file.to_string_lossy()))?;
            LoggingConfig {
                level: log_cfg.level.clone(),
                file_level: log_cfg.file_level.clone(),
                file: Some(expanded_file),
            }
        } else {
            log_cfg.clone()
        };

        Ok(ResolvedConfig {
            active_profile: active.to_string(),
            vault_root,
            templates_dir,
            global_template: prof.global_template.clone().filter(|g| !g.trim().is_empty()),
            template_alias: prof.template_alias.clone(),
            excluded_folders,
            values_db,
            template_queries: prof.template_queries.clone(),
            preset_fields: prof.preset_fields.clone(),
            logging,
            engine: engine.clone(),
        })
    }
}

impl ResolvedConfig {
    /// Attribution settings for this profile. Preset fields are parsed here.
    pub fn schema_settings(&self) -> Result<SchemaSettings, ConfigError> {
        let presets = self
            .preset_fields
            .iter()
            .map(|raw| Field::from_raw(raw, FieldOwner::Preset))
            .collect::<Result<Vec<_>, _>>()
            .map_err(ConfigError::InvalidPreset)?;
        Ok(SchemaSettings {
            templates_dir: self.templates_dir.clone(),
            template_alias: self.template_alias.clone(),
            global_template: self.global_template.clone(),
            presets,
            template_queries: self
                .template_queries
                .iter()
                .map(|b| (b.template.clone(), b.query.clone()))
                .collect(),
        })
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        Ok(EngineSettings {
            schema: self.schema_settings()?,
            reverse_update_policy: self.engine.reverse_update_policy,
        })
    }
}

pub fn default_config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("mdfields").join("config.toml");
    }
    let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
    home.join(".config").join("mdfields").join("config.toml")
}

fn expand_path(input: &str) -> Result<PathBuf, ConfigError> {
    let expanded = full(input).map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(expanded.to_string()))
}

/// Turn a configured folder into a `/`-separated vault-relative path.
fn vault_relative(vault_root: &Path, input: &str) -> Result<String, ConfigError> {
    let path = expand_path(input)?;
    let relative = if path.is_absolute() {
        path.strip_prefix(vault_root)
            .map_err(|_| ConfigError::TemplatesOutsideVault(input.to_string()))?
            .to_path_buf()
    } else {
        path
    };
    let joined: Vec<String> =
        relative.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    Ok(joined.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_relative() {
        let root = Path::new("/tmp/vault");
        assert_eq!(vault_relative(root, "/tmp/vault/meta/templates").unwrap(), "meta/templates");
        assert_eq!(vault_relative(root, "fileClasses").unwrap(), "fileClasses");
        assert!(matches!(
            vault_relative(root, "/elsewhere/templates"),
            Err(ConfigError::TemplatesOutsideVault(_))
        ));
    }
}
