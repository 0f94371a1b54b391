//! Configuration for experiencestore

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::StoreOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the record log
    #[serde(default = "default_store_path", rename = "store-path")]
    pub store_path: PathBuf,

    /// Records kept before the oldest are evicted
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Records older than this many days are dropped by `prune`
    #[serde(default, rename = "max-age-days")]
    pub max_age_days: Option<u32>,
}

pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("experiencestore")
}

fn default_capacity() -> usize {
    crate::DEFAULT_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            capacity: default_capacity(),
            max_age_days: None,
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            let content = std::fs::read_to_string(config_path)
                .context(format!("Failed to read config {}", config_path.display()))?;
            let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;
            return Ok(config);
        }

        // Try default locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("experiencestore").join("config.yml")),
            Some(PathBuf::from("experiencestore.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Retention options for opening a store
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            capacity: self.capacity,
            max_age_days: self.max_age_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.capacity, 10_000);
        assert!(config.max_age_days.is_none());
        assert!(config.store_path.ends_with("experiencestore"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("max-age-days: 30\n").unwrap();
        assert_eq!(config.max_age_days, Some(30));
        assert_eq!(config.capacity, 10_000);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("xs.yml");
        let config = Config {
            store_path: temp.path().join("store"),
            capacity: 42,
            max_age_days: Some(7),
        };
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.capacity, 42);
        assert_eq!(loaded.store_options().max_age_days, Some(7));
    }
}
