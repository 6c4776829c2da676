use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, RiseError};
use crate::types::{NewAlarm, DEFAULT_LABEL};

/// Top-level configuration for Rise.
///
/// Loaded from `~/.rise/config.toml` by default. Every section falls back to
/// its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiseConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub triggers: TriggerConfig,
    #[serde(default)]
    pub alarms: AlarmDefaultsConfig,
}

impl RiseConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RiseConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RiseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the alarm database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.rise/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Which persistence backend holds the alarm collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file name, relative to `general.data_dir`.
    pub database_file: String,
    /// Fixed key the whole alarm collection is stored under.
    pub storage_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_file: "rise.db".to_string(),
            storage_key: "@rise_alarms".to_string(),
        }
    }
}

/// Which trigger adapter is wired in at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerBackend {
    /// In-process timers that deliver fired triggers to the app.
    #[default]
    Timer,
    /// No platform capability: log what would be armed.
    Logging,
    /// Record triggers in memory only.
    Memory,
}

/// Trigger adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub backend: TriggerBackend,
    /// Notification channel every alarm trigger is posted to.
    pub channel_id: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            backend: TriggerBackend::Timer,
            channel_id: "rise-alarm-channel".to_string(),
        }
    }
}

/// What happens to a one-time alarm once it has fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneTimePolicy {
    /// Disable the alarm so it does not fire again.
    #[default]
    Disable,
    /// Leave it enabled and re-arm for the next day.
    Keep,
}

/// Defaults applied to newly created alarms, plus fire handling policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmDefaultsConfig {
    pub default_label: String,
    pub default_hour: u8,
    pub default_minute: u8,
    pub snooze_enabled: bool,
    pub snooze_duration_minutes: u32,
    pub one_time_after_fire: OneTimePolicy,
}

impl Default for AlarmDefaultsConfig {
    fn default() -> Self {
        Self {
            default_label: DEFAULT_LABEL.to_string(),
            default_hour: 7,
            default_minute: 0,
            snooze_enabled: true,
            snooze_duration_minutes: 5,
            one_time_after_fire: OneTimePolicy::Disable,
        }
    }
}

impl AlarmDefaultsConfig {
    /// Creation input pre-filled with these defaults.
    pub fn new_alarm(&self) -> NewAlarm {
        NewAlarm {
            hour: self.default_hour.min(23),
            minute: self.default_minute.min(59),
            label: self.default_label.clone(),
            snooze_enabled: self.snooze_enabled,
            snooze_duration_minutes: self.snooze_duration_minutes,
            ..NewAlarm::default()
        }
    }
}
