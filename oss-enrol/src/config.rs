//! Configuration management for oss-enrol.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (OSS_ENROL_*)
//! 2. Config file (`--config`, OSS_ENROL_CONFIG, or the platform config dir)
//! 3. Default values
//!
//! The engine settings (`[directory]`, `[teachers]`, `[naming]`, `[enrol]`,
//! `[units]`) live at the top level of the same file as `[database]`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use oss_enrol_core::SyncConfig;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Local store settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Engine settings
    #[serde(flatten)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "openschoolserver", "oss-enrol")
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = project_dirs() {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".oss-enrol")
    }
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("enrol.db")
}

impl Config {
    /// Load configuration from `explicit`, or the default location, then
    /// apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = explicit.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else if explicit.is_some() {
            anyhow::bail!("Config file not found: {}", config_path.display());
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Apply OSS_ENROL_* overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("OSS_ENROL_DATABASE_PATH").filter(|p| !p.is_empty()) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(password) = lookup("OSS_ENROL_BIND_PASSWORD") {
            self.sync.directory.bind_password = Some(password);
        }
    }

    /// Get the default config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("OSS_ENROL_CONFIG") {
            return PathBuf::from(path);
        }
        match project_dirs() {
            Some(proj_dirs) => proj_dirs.config_dir().join("config.toml"),
            None => default_data_dir().join("config.toml"),
        }
    }

    /// Ensure the database directory exists.
    pub fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.database.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.sync.enabled);
        assert_eq!(config.sync.teachers.group, "teachers");
        assert!(config.database.path.ends_with("enrol.db"));
    }

    #[test]
    fn test_load_sections_from_file() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
enabled = true

[database]
path = "/var/lib/oss-enrol/enrol.db"

[directory]
url = "ldap://admin.schule.local"
contexts = ["ou=groups,dc=schule,dc=local"]

[teachers]
ignored = ["admin"]

[units]
teacher_root = "Lehrer"
"#,
        )
        .expect("Failed to write config");

        let config = Config::from_file(&path).expect("Failed to load config");

        assert_eq!(config.database.path, PathBuf::from("/var/lib/oss-enrol/enrol.db"));
        assert_eq!(config.sync.directory.url, "ldap://admin.schule.local");
        assert_eq!(config.sync.teachers.ignored, vec!["admin"]);
        assert_eq!(config.sync.units.teacher_root, "Lehrer");
        assert_eq!(config.sync.units.archive_root, "Archive");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OSS_ENROL_DATABASE_PATH", "/tmp/other.db"),
            ("OSS_ENROL_BIND_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.sync.directory.bind_password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp = tempdir().expect("Failed to create temp dir");
        assert!(Config::load(Some(&temp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_ensure_dirs_creates_directories() {
        let temp = tempdir().expect("Failed to create temp dir");
        let config = Config {
            database: DatabaseConfig {
                path: temp.path().join("data").join("enrol.db"),
            },
            ..Config::default()
        };

        assert!(!temp.path().join("data").exists());
        config.ensure_dirs().expect("Failed to create directories");
        assert!(temp.path().join("data").exists());
    }
}
