use dirs_next::config_dir;
use log::{info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::texture::{FilterMode, TextureUnit};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    pub width: u32,
    pub height: u32,
    pub filter: FilterMode,
    pub unit: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            filter: FilterMode::Linear,
            unit: 0,
        }
    }
}

impl StoreSettings {
    pub fn texture_unit(&self) -> TextureUnit {
        TextureUnit(self.unit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: String::from("info"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization/Deserialization Error: {0}")]
    Serde(#[from] toml::de::Error),

    #[error("Serialization Error: {0}")]
    SerdeSer(#[from] toml::ser::Error),

    #[error("Configuration Directory Not Found")]
    ConfigDirNotFound,
}

impl Settings {
    /// `<config dir>/texstore/settings.toml`
    pub fn settings_path() -> Result<PathBuf, SettingsError> {
        let config_dir = config_dir().ok_or(SettingsError::ConfigDirNotFound)?;
        Ok(config_dir.join("texstore").join("settings.toml"))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Saves settings to `path`, creating parent directories as needed.
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Loads `path`, writing the defaults there first if it does not exist.
    /// A file that exists but cannot be parsed is left alone and the
    /// defaults are returned.
    pub fn load_or_create(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            match Settings::load_from_file(path) {
                Ok(settings) => Ok(settings),
                Err(e) => {
                    warn!("Failed to load settings from {:?}: {}. Using defaults.", path, e);
                    Ok(Settings::default())
                }
            }
        } else {
            let settings = Settings::default();
            settings.save_to_file(path)?;
            info!("Default settings saved to {:?}", path);
            Ok(settings)
        }
    }

    /// Settings from the user config directory, or the defaults if that fails.
    pub fn load_user_settings() -> Self {
        match Settings::settings_path().and_then(|path| Settings::load_or_create(&path)) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Error initializing settings: {}", e);
                Settings::default()
            }
        }
    }

    /// Configured log level; unknown names fall back to `Info`.
    pub fn level_filter(&self) -> LevelFilter {
        self.logging.level.parse().unwrap_or(LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.store.width, 512);
        assert_eq!(settings.store.height, 512);
        assert_eq!(settings.store.filter, FilterMode::Linear);
        assert_eq!(settings.store.texture_unit(), TextureUnit(0));
        assert_eq!(settings.level_filter(), LevelFilter::Info);
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.store.width = 100;
        settings.store.filter = FilterMode::Nearest;
        settings.logging.level = String::from("debug");
        settings.save_to_file(&path).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn test_load_valid_file() {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let path = temp_dir.path().join("settings.toml");
        let content = r#"
            [store]
            width = 300
            height = 200
            filter = "nearest"
            unit = 2

            [logging]
            level = "trace"
        "#;
        fs::write(&path, content).unwrap();

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.store.width, 300);
        assert_eq!(settings.store.height, 200);
        assert_eq!(settings.store.filter, FilterMode::Nearest);
        assert_eq!(settings.store.texture_unit(), TextureUnit(2));
        assert_eq!(settings.level_filter(), LevelFilter::Trace);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let path = temp_dir.path().join("settings.toml");
        fs::write(&path, "[store]\nwidth = 64\n").unwrap();

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.store.width, 64);
        assert_eq!(settings.store.height, 512);
        assert_eq!(settings.logging, LoggingSettings::default());
    }

    #[test]
    fn test_invalid_file_is_serde_error() {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let path = temp_dir.path().join("settings.toml");
        fs::write(&path, "[store\nwidth = ").unwrap();

        let result = Settings::load_from_file(&path);
        assert!(matches!(result, Err(SettingsError::Serde(_))));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let path = temp_dir.path().join("texstore").join("settings.toml");
        assert!(!path.exists());

        let settings = Settings::load_or_create(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(Settings::load_from_file(&path).unwrap(), Settings::default());
    }

    #[test]
    fn test_load_or_create_keeps_corrupt_file() {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let path = temp_dir.path().join("settings.toml");
        fs::write(&path, "not = [valid").unwrap();

        let settings = Settings::load_or_create(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "not = [valid");
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let mut settings = Settings::default();
        settings.logging.level = String::from("loud");
        assert_eq!(settings.level_filter(), LevelFilter::Info);
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial_test::serial]
    fn test_settings_path_uses_config_dir() {
        use std::env;

        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let original = env::var_os("XDG_CONFIG_HOME");
        unsafe {
            env::set_var("XDG_CONFIG_HOME", temp_dir.path());
        }

        let path = Settings::settings_path().expect("Failed to get settings path");
        let settings = Settings::load_user_settings();

        unsafe {
            match original {
                Some(value) => env::set_var("XDG_CONFIG_HOME", value),
                None => env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        assert_eq!(path, temp_dir.path().join("texstore").join("settings.toml"));
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
    }
}
