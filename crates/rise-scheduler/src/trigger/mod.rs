//! Trigger adapter contract and implementations.
//!
//! A trigger is a one-shot, timestamp-based platform notification keyed by
//! the owning alarm's id (or `<id>_snooze` for a snooze). At most one
//! trigger exists per key; `cancel` is idempotent.

pub mod logging;
pub mod memory;
pub mod timer;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rise_core::config::{TriggerBackend, TriggerConfig};
use rise_core::types::AlarmId;

use crate::error::TriggerError;

pub use logging::LoggingTriggerAdapter;
pub use memory::{ArmedTrigger, MemoryTriggerAdapter, TriggerCall};
pub use timer::TimerTriggerAdapter;

const SNOOZE_SUFFIX: &str = "_snooze";
const TEST_KEY: &str = "test-notification";

/// Identity of a platform trigger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerKey(String);

/// What a trigger key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// The alarm's own recurring trigger.
    Alarm(AlarmId),
    /// The derived snooze trigger for an alarm.
    Snooze(AlarmId),
}

impl TriggerKey {
    /// Key of an alarm's primary trigger.
    pub fn alarm(id: AlarmId) -> Self {
        Self(id.to_string())
    }

    /// Key of an alarm's snooze trigger.
    pub fn snooze(id: AlarmId) -> Self {
        Self(format!("{}{}", id, SNOOZE_SUFFIX))
    }

    /// Key used for one-off test notifications. Belongs to no alarm.
    pub fn test() -> Self {
        Self(TEST_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the key back into the alarm it belongs to.
    pub fn kind(&self) -> Option<TriggerKind> {
        match self.0.strip_suffix(SNOOZE_SUFFIX) {
            Some(id) => id.parse().ok().map(TriggerKind::Snooze),
            None => self.0.parse().ok().map(TriggerKind::Alarm),
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TriggerKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// A button offered on a fired trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerAction {
    pub id: String,
    pub title: String,
}

impl TriggerAction {
    pub fn dismiss() -> Self {
        Self {
            id: "dismiss".to_string(),
            title: "Dismiss".to_string(),
        }
    }

    pub fn snooze(minutes: u32) -> Self {
        Self {
            id: "snooze".to_string(),
            title: format!("Snooze ({}m)", minutes),
        }
    }
}

/// Content shown when a trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub title: String,
    pub body: String,
    pub channel_id: String,
    pub actions: Vec<TriggerAction>,
}

/// A trigger whose time has come, as delivered by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTrigger {
    pub key: TriggerKey,
    pub fire_at: DateTime<Utc>,
    pub payload: TriggerPayload,
}

/// Platform capability for one-shot timed triggers.
#[async_trait]
pub trait TriggerAdapter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Prepare the platform side, e.g. register the notification channel.
    async fn initialize(&self, _channel_id: &str) -> Result<(), TriggerError> {
        Ok(())
    }

    /// Ask the platform for permission to alert. Hosts without a permission
    /// model grant it.
    async fn request_permission(&self) -> Result<bool, TriggerError> {
        Ok(true)
    }

    /// Show `payload` right away under `key`.
    async fn display_now(
        &self,
        key: &TriggerKey,
        payload: &TriggerPayload,
    ) -> Result<(), TriggerError> {
        self.arm(key, Utc::now(), payload).await
    }

    /// Arm a single trigger for `key` at `fire_at`.
    async fn arm(
        &self,
        key: &TriggerKey,
        fire_at: DateTime<Utc>,
        payload: &TriggerPayload,
    ) -> Result<(), TriggerError>;

    /// Cancel the trigger for `key`. Succeeds when nothing is armed.
    async fn cancel(&self, key: &TriggerKey) -> Result<(), TriggerError>;

    /// Cancel every armed trigger.
    async fn cancel_all(&self) -> Result<(), TriggerError>;

    /// Keys of all currently armed triggers.
    async fn pending(&self) -> Result<Vec<TriggerKey>, TriggerError>;
}

/// Build the adapter selected in configuration.
///
/// The timer backend also hands back the receiver its fired triggers are
/// delivered on.
pub fn build_adapter(
    config: &TriggerConfig,
) -> (
    Arc<dyn TriggerAdapter>,
    Option<tokio::sync::mpsc::UnboundedReceiver<FiredTrigger>>,
) {
    match config.backend {
        TriggerBackend::Timer => {
            let (adapter, fired) = TimerTriggerAdapter::new();
            (Arc::new(adapter), Some(fired))
        }
        TriggerBackend::Logging => (Arc::new(LoggingTriggerAdapter::new()), None),
        TriggerBackend::Memory => (Arc::new(MemoryTriggerAdapter::new()), None),
    }
}
