//! Application configuration management.
//!
//! Settings live in `<config_dir>/shavtzak/config.json`. Secrets are never
//! written there; they come from the environment (or a `.env` file loaded
//! at startup), which also overrides the Firebase API key.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::notify::SmtpSettings;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "shavtzak";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_SHEET_NAME: &str = "Sheet1";
const DEFAULT_SMTP_PORT: u16 = 587;

pub const ENV_SHEETS_ACCESS_TOKEN: &str = "SHEETS_ACCESS_TOKEN";
pub const ENV_SMTP_PASSWORD: &str = "SMTP_PASSWORD";
pub const ENV_FIREBASE_API_KEY: &str = "FIREBASE_API_KEY";

fn default_sheet_name() -> String {
    DEFAULT_SHEET_NAME.to_string()
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub spreadsheet_id: Option<String>,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    /// Google API key; enough for reading the roster
    pub sheets_api_key: Option<String>,
    pub firebase_api_key: Option<String>,
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_from: Option<String>,
    #[serde(default)]
    pub report_recipients: Vec<String>,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            sheet_name: default_sheet_name(),
            sheets_api_key: None,
            firebase_api_key: None,
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_user: None,
            smtp_from: None,
            report_recipients: Vec::new(),
            last_email: None,
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(env_var);
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Per-spreadsheet cache directory, so switching sheets never mixes rosters.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;

        let mut path = cache_dir.join(APP_NAME);
        if let Some(ref id) = self.spreadsheet_id {
            path = path.join(id);
        }
        Ok(path)
    }

    /// Where users and equipment templates are kept.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_FIREBASE_API_KEY) {
            self.firebase_api_key = Some(key);
        }
    }

    /// OAuth token that allows writing to the sheet, if one is provided.
    pub fn sheets_access_token(&self) -> Option<String> {
        env_var(ENV_SHEETS_ACCESS_TOKEN)
    }

    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        self.smtp_settings_with(env_var)
    }

    /// SMTP settings, or `None` when no host or sender is configured.
    pub fn smtp_settings_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<SmtpSettings> {
        let host = self.smtp_host.clone().filter(|h| !h.trim().is_empty())?;
        let from = self
            .smtp_from
            .clone()
            .or_else(|| self.smtp_user.clone())
            .filter(|f| !f.trim().is_empty())?;
        Some(SmtpSettings {
            host,
            port: self.smtp_port,
            username: self.smtp_user.clone(),
            password: lookup(ENV_SMTP_PASSWORD),
            from,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.spreadsheet_id
            .as_deref()
            .map(|id| !id.trim().is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.sheet_name, "Sheet1");
        assert_eq!(config.smtp_port, 587);
        assert!(!config.is_configured());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = Config {
            spreadsheet_id: Some("sheet-123".to_string()),
            report_recipients: vec!["cmd@unit.il".to_string()],
            last_email: Some("dana@unit.il".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"spreadsheet_id": "abc"}"#).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert!(config.is_configured());
        assert_eq!(config.sheet_name, "Sheet1");
        assert!(config.report_recipients.is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config {
            firebase_api_key: Some("from-file".to_string()),
            ..Config::default()
        };
        config.apply_overrides(|key| (key == ENV_FIREBASE_API_KEY).then(|| "from-env".to_string()));
        assert_eq!(config.firebase_api_key.as_deref(), Some("from-env"));

        config.apply_overrides(|_| None);
        assert_eq!(config.firebase_api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_smtp_settings() {
        let mut config = Config::default();
        assert!(config.smtp_settings_with(|_| None).is_none());

        config.smtp_host = Some("smtp.unit.il".to_string());
        config.smtp_user = Some("roster@unit.il".to_string());
        let settings = config
            .smtp_settings_with(|key| (key == ENV_SMTP_PASSWORD).then(|| "secret".to_string()))
            .unwrap();
        assert_eq!(settings.from, "roster@unit.il");
        assert_eq!(settings.port, 587);
        assert_eq!(settings.password.as_deref(), Some("secret"));
    }
}
