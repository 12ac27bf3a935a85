//! User settings
//!
//! A small YAML file holding the default database and export format, plus
//! the lookup order that picks the database a command opens.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::export::ExportFormat;

/// Environment variable overriding the settings file location
pub const SETTINGS_PATH_ENV: &str = "SYSREQ_CONFIG_PATH";

/// Environment variable naming the database to open
pub const DATABASE_ENV: &str = "SYSREQ_DB";

/// Database used when nothing else is configured
pub const DEFAULT_DATABASE: &str = "sysreq.db";

fn default_export_format() -> String {
    ExportFormat::Csv.to_string()
}

/// User settings stored as YAML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Database opened when neither `--db` nor `SYSREQ_DB` is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Format used by `export` when none is given
    #[serde(default = "default_export_format")]
    pub export_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: None,
            export_format: default_export_format(),
        }
    }
}

impl Settings {
    /// Loads the settings from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {:?}", path.as_ref()))
    }

    /// Loads the settings, falling back to defaults if the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the settings to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        // Ensure parent directories exist
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write settings to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// The configured export format, if it names a known one
    pub fn export_format(&self) -> Option<ExportFormat> {
        ExportFormat::parse(&self.export_format)
    }
}

/// Gets the path to the settings file
pub fn get_settings_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(SETTINGS_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }

    // Default to ~/.sysreq.config
    let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

    Ok(home_dir.join(".sysreq.config"))
}

/// Picks the database path: explicit option, then environment, then settings, then the default
pub fn resolve_database_path(
    db_option: Option<&Path>,
    env_value: Option<String>,
    settings: &Settings,
) -> PathBuf {
    if let Some(path) = db_option {
        return path.to_path_buf();
    }
    if let Some(path) = env_value.filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    if let Some(path) = &settings.database {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_DATABASE)
}

/// Determines the database path to use based on the available information
pub fn determine_database_path(db_option: Option<&Path>) -> Result<PathBuf> {
    let settings = Settings::load_or_default(get_settings_path()?)?;
    Ok(resolve_database_path(
        db_option,
        env::var(DATABASE_ENV).ok(),
        &settings,
    ))
}
