//! Configuration Management
//!
//! Loads configuration from TOML files with environment-variable
//! overrides. Configuration covers:
//! - the data directory and optional storage quota
//! - the auto-backup period
//! - generation API settings (endpoint, model, API key)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the key-value store files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Optional storage byte budget; writes past it fail.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: Option<u64>,

    /// Minutes between automatic backups while logged in.
    #[serde(default = "default_auto_backup_minutes")]
    pub auto_backup_minutes: u64,

    #[serde(default)]
    pub generator: GeneratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            quota_bytes: default_quota_bytes(),
            auto_backup_minutes: default_auto_backup_minutes(),
            generator: GeneratorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".quizforge")
        .join("data")
}

fn default_quota_bytes() -> Option<u64> {
    // Roughly the budget a browser origin store would get.
    Some(5 * 1024 * 1024)
}

fn default_auto_backup_minutes() -> u64 {
    5
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config: Config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config from {}", p))?;
                toml::from_str(&content).context("Failed to parse config")?
            }
            None => {
                // Try default locations - expand ~ to actual home directory
                let home_config = dirs::home_dir()
                    .map(|h| h.join(".config/quizforge/config.toml"))
                    .and_then(|p| p.to_str().map(String::from));

                let mut default_paths: Vec<&str> = vec!["quizforge.toml"];
                let home_config_str: String;
                if let Some(ref hc) = home_config {
                    home_config_str = hc.clone();
                    default_paths.push(&home_config_str);
                }

                let mut loaded = None;
                for p in &default_paths {
                    if let Ok(content) = std::fs::read_to_string(p) {
                        loaded = Some(toml::from_str(&content).context("Failed to parse config")?);
                        break;
                    }
                }
                loaded.unwrap_or_default()
            }
        };

        // Override with environment variables
        if let Ok(dir) = std::env::var("QUIZFORGE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(endpoint) = std::env::var("QUIZFORGE_ENDPOINT") {
            config.generator.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("QUIZFORGE_MODEL") {
            config.generator.model = model;
        }
        if let Ok(api_key) = std::env::var("QUIZFORGE_API_KEY") {
            config.generator.api_key = Some(api_key);
        } else if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            config.generator.api_key = Some(api_key);
        }
        if let Ok(minutes) = std::env::var("QUIZFORGE_AUTO_BACKUP_MINUTES") {
            if let Ok(n) = minutes.parse::<u64>() {
                config.auto_backup_minutes = n;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.data_dir.ends_with(".quizforge/data"));
        assert_eq!(config.quota_bytes, Some(5 * 1024 * 1024));
        assert_eq!(config.auto_backup_minutes, 5);
        assert_eq!(config.generator.model, "gemini-2.0-flash");
        assert!(config.generator.api_key.is_none());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/tmp/quiz"
auto_backup_minutes = 10

[generator]
model = "gemini-2.5-pro"
"#,
        )
        .unwrap();

        let config = Config::load(path.to_str()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/quiz"));
        assert_eq!(config.auto_backup_minutes, 10);
        assert_eq!(config.generator.model, "gemini-2.5-pro");
        // Unset sections keep their defaults.
        assert_eq!(config.generator.endpoint, default_endpoint());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        assert!(Config::load(Some("/definitely/not/here.toml")).is_err());
    }

    #[test]
    fn test_malformed_toml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "data_dir = [not toml").unwrap();
        assert!(Config::load(path.to_str()).is_err());
    }
}
