//! CLI argument definitions for the Rise application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

use rise_core::error::RiseError;
use rise_core::types::{AlarmId, DayOfWeek};

/// Rise: schedule and manage wake-up alarms.
#[derive(Parser, Debug)]
#[command(name = "rise", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory holding the alarm database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List all alarms ordered by time of day.
    List,
    /// Create an alarm.
    Add {
        /// Wall-clock time, `HH:MM` in 24-hour notation.
        time: ClockTime,
        #[arg(long)]
        label: Option<String>,
        /// Comma separated weekdays, e.g. `mon,wed,fri`. Omit for one-time.
        #[arg(long, value_delimiter = ',')]
        days: Vec<DayOfWeek>,
        /// Create the alarm switched off.
        #[arg(long)]
        disabled: bool,
        #[arg(long = "no-snooze")]
        no_snooze: bool,
        #[arg(long = "snooze-minutes")]
        snooze_minutes: Option<u32>,
    },
    /// Change fields of an existing alarm.
    Edit {
        id: AlarmId,
        #[arg(long)]
        time: Option<ClockTime>,
        #[arg(long)]
        label: Option<String>,
        /// Replace the repeat days. Pass `--once` to clear them instead.
        #[arg(long, value_delimiter = ',', conflicts_with = "once")]
        days: Option<Vec<DayOfWeek>>,
        #[arg(long)]
        once: bool,
        #[arg(long = "snooze-minutes")]
        snooze_minutes: Option<u32>,
    },
    /// Switch an alarm on or off.
    Toggle { id: AlarmId },
    /// Remove an alarm and its triggers.
    Delete { id: AlarmId },
    /// Snooze an alarm now and wait for the snooze to ring.
    Snooze { id: AlarmId },
    /// Show enabled alarms with their next fire time.
    Next,
    /// Request alert permission and show a notification right away.
    TestNotification,
    /// Rebuild triggers and deliver alarms until interrupted. Type `s` to
    /// snooze or `d` to dismiss the alarm that rang last.
    Run,
}

/// An `HH:MM` wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u8,
    pub minute: u8,
}

impl FromStr for ClockTime {
    type Err = RiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RiseError::InvalidInput(format!("{} (expected HH:MM)", s));
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > RISE_CONFIG env var > platform default (~/.rise/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("RISE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory path.
    ///
    /// Returns `None` if not overridden on the command line.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log level.
    ///
    /// Returns `None` if not overridden on the command line.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".rise").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".rise").join("config.toml");
    }
    PathBuf::from("config.toml")
}
