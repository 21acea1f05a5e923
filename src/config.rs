//! Configuration loading for msgrelay.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Get the msgrelay home directory (~/.msgrelay).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".msgrelay"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from an explicit path, or ~/.msgrelay/settings.json.
///
/// A missing file yields the defaults; a malformed or invalid one is an error.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => get_settings_path()?,
    };

    if !path.exists() {
        tracing::debug!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = serde_json::from_str(&content)?;
    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings or return default if they cannot be read.
pub fn load_settings_or_default(path: Option<&Path>) -> Settings {
    load_settings(path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings: {}, using defaults", e);
        Settings::default()
    })
}

/// Write settings as pretty JSON, creating parent directories.
pub fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    validate_settings(settings)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    tracing::info!("Wrote settings to {}", path.display());
    Ok(())
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    let q = &settings.queues;
    for (name, capacity) in [
        ("queues.outbound_capacity", q.outbound_capacity),
        ("queues.inbound_capacity", q.inbound_capacity),
        ("queues.relay_capacity", q.relay_capacity),
    ] {
        if capacity == 0 {
            return Err(Error::Config(format!("{} must be greater than zero", name)));
        }
    }
    if q.default_timeout_ms == 0 {
        return Err(Error::Config(
            "queues.default_timeout_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Queue capacities and wait defaults.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QueueSettings {
    #[serde(default = "default_capacity")]
    pub outbound_capacity: usize,
    #[serde(default = "default_capacity")]
    pub inbound_capacity: usize,
    #[serde(default = "default_capacity")]
    pub relay_capacity: usize,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

fn default_capacity() -> usize {
    256
}

fn default_timeout_ms() -> u64 {
    5000
}

impl QueueSettings {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: default_capacity(),
            inbound_capacity: default_capacity(),
            relay_capacity: default_capacity(),
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Parameters for the `simulate` command.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SimulationSettings {
    #[serde(default = "default_requests")]
    pub requests: usize,
    #[serde(default = "default_progress_events")]
    pub progress_events: usize,
    /// Artificial worker latency per request.
    #[serde(default)]
    pub worker_delay_ms: u64,
}

fn default_requests() -> usize {
    8
}

fn default_progress_events() -> usize {
    2
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            progress_events: default_progress_events(),
            worker_delay_ms: 0,
        }
    }
}

/// msgrelay settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub queues: QueueSettings,

    #[serde(default)]
    pub simulation: SimulationSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = load_settings(Some(&temp_dir.path().join("nope.json"))).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.queues.default_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"queues":{"relay_capacity":4}}"#).unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.queues.relay_capacity, 4);
        assert_eq!(settings.queues.outbound_capacity, 256);
        assert_eq!(settings.simulation.requests, 8);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"queues":{"inbound_capacity":0}}"#).unwrap();

        let err = load_settings(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(load_settings_or_default(Some(&path)), Settings::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.simulation.requests = 3;
        save_settings(&settings, &path).unwrap();

        assert_eq!(load_settings(Some(&path)).unwrap(), settings);
    }
}
