use crate::error::{Error, Result};
use crate::templates::{save_json, RetryPolicy, TEMPLATES_DIR_NAME};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const APP_NAME: &str = "convert-skeleton-json";
const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_TEMPLATE: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder holding one subfolder per template. Defaults to the user data directory.
    pub templates_path: Option<PathBuf>,
    /// Template used by `convert` when none is given.
    pub selected_template: String,
    pub dir_wait_attempts: u32,
    pub dir_wait_initial_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            templates_path: None,
            selected_template: DEFAULT_TEMPLATE.to_string(),
            dir_wait_attempts: 10,
            dir_wait_initial_delay_ms: 10,
        }
    }
}

impl Settings {
    /// Reads a config file, falling back to defaults when it is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("failed to load config, using defaults: {}", err);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read(path).map_err(|err| Error::io(path, err))?;
        serde_json::from_slice(&content).map_err(|err| Error::parse(path, err))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
        }
        save_json(self, path)
    }

    pub fn templates_root(&self) -> PathBuf {
        match &self.templates_path {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_NAME))
                .unwrap_or_else(|| PathBuf::from("."))
                .join(TEMPLATES_DIR_NAME),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.dir_wait_attempts,
            initial_delay: Duration::from_millis(self.dir_wait_initial_delay_ms),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load_from(&temp.path().join("config.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"selected_template": "mixamo"}"#).unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.selected_template, "mixamo");
        assert_eq!(settings.dir_wait_attempts, 10);
    }

    #[test]
    fn test_broken_file_falls_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{").unwrap();
        assert!(Settings::load_from(&path).is_err());
        assert_eq!(Settings::load_or_default(&path), Settings::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.json");
        let settings = Settings {
            templates_path: Some(temp.path().join("templates")),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
        assert_eq!(settings.templates_root(), temp.path().join("templates"));
    }
}
