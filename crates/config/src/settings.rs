// Client settings
// Loaded from ~/.config/sheetwire/settings.toml

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sheetwire_core::{LogicalWindow, Orientation};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config validation error: {0}")]
    Invalid(String),
}

/// Initial logical window of a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub row_start: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_stop: Option<u32>,
    pub col_start: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col_stop: Option<u32>,
    pub orientation: Orientation,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            row_start: 1,
            row_stop: None,
            col_start: 1,
            col_stop: None,
            orientation: Orientation::Rows,
        }
    }
}

impl WindowSettings {
    pub fn to_window(&self) -> LogicalWindow {
        LogicalWindow::new(self.row_start, self.row_stop, self.col_start, self.col_stop)
            .with_orientation(self.orientation)
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Cap on concurrently dispatched read/write requests. None = unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,
}

/// Remote grid executor endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL, e.g. "https://grid.example.com"
    pub endpoint: String,
    /// Bearer token
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window: WindowSettings,
    pub dispatch: DispatchSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteSettings>,
}

impl Settings {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(input)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.window;
        if w.row_start == 0 || w.col_start == 0 {
            return Err(ConfigError::Invalid("window starts are 1-based".into()));
        }
        if let Some(stop) = w.row_stop {
            if stop <= w.row_start {
                return Err(ConfigError::Invalid(format!(
                    "window.row_stop ({}) must be greater than row_start ({})",
                    stop, w.row_start
                )));
            }
        }
        if let Some(stop) = w.col_stop {
            if stop <= w.col_start {
                return Err(ConfigError::Invalid(format!(
                    "window.col_stop ({}) must be greater than col_start ({})",
                    stop, w.col_start
                )));
            }
        }
        if self.dispatch.max_in_flight == Some(0) {
            return Err(ConfigError::Invalid("dispatch.max_in_flight must be at least 1".into()));
        }
        if let Some(remote) = &self.remote {
            if remote.endpoint.trim().is_empty() {
                return Err(ConfigError::Invalid("remote.endpoint is empty".into()));
            }
        }
        Ok(())
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetwire")
            .join("settings.toml")
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Using default settings: {}", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.window.to_window(), LogicalWindow::default());
        assert!(settings.remote.is_none());
    }

    #[test]
    fn test_full_file() {
        let settings = Settings::from_toml(
            r#"
            [window]
            row_start = 2
            row_stop = 12
            col_stop = 11
            orientation = "columns"

            [dispatch]
            max_in_flight = 4

            [remote]
            endpoint = "https://grid.example.com"
            token = "secret"
            "#,
        )
        .unwrap();

        let window = settings.window.to_window();
        assert_eq!(window.row_start, 2);
        assert_eq!(window.row_stop, Some(12));
        assert_eq!(window.col_start, 1);
        assert_eq!(window.col_stop, Some(11));
        assert_eq!(window.orientation, Orientation::Columns);
        assert_eq!(settings.dispatch.max_in_flight, Some(4));

        let remote = settings.remote.unwrap();
        assert_eq!(remote.token, "secret");
        assert_eq!(remote.timeout_secs, 30);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let err = Settings::from_toml("[window]\nrow_start = 5\nrow_stop = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_in_flight_rejected() {
        let err = Settings::from_toml("[dispatch]\nmax_in_flight = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_in_flight"));
    }

    #[test]
    fn test_parse_error() {
        let err = Settings::from_toml("[window\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.window.row_stop = Some(40);
        settings.dispatch.max_in_flight = Some(2);
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }
}
