//! Trigger adapter for hosts without the platform capability.
//!
//! Every call succeeds and only logs what would have happened.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TriggerError;
use crate::trigger::{TriggerAdapter, TriggerKey, TriggerPayload};

/// No-op adapter that logs instead of arming anything.
#[derive(Debug, Default)]
pub struct LoggingTriggerAdapter;

impl LoggingTriggerAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TriggerAdapter for LoggingTriggerAdapter {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn initialize(&self, channel_id: &str) -> Result<(), TriggerError> {
        tracing::info!(channel_id = %channel_id, "Trigger capability unavailable, channel setup skipped");
        Ok(())
    }

    async fn request_permission(&self) -> Result<bool, TriggerError> {
        tracing::info!("Permission request skipped, granting");
        Ok(true)
    }

    async fn display_now(
        &self,
        key: &TriggerKey,
        payload: &TriggerPayload,
    ) -> Result<(), TriggerError> {
        tracing::info!(key = %key, title = %payload.title, body = %payload.body, "Would display notification");
        Ok(())
    }

    async fn arm(
        &self,
        key: &TriggerKey,
        fire_at: DateTime<Utc>,
        payload: &TriggerPayload,
    ) -> Result<(), TriggerError> {
        tracing::info!(
            key = %key,
            fire_at = %fire_at,
            title = %payload.title,
            "Would arm trigger"
        );
        Ok(())
    }

    async fn cancel(&self, key: &TriggerKey) -> Result<(), TriggerError> {
        tracing::info!(key = %key, "Would cancel trigger");
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), TriggerError> {
        tracing::info!("Would cancel all triggers");
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<TriggerKey>, TriggerError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::TriggerAction;
    use rise_core::types::AlarmId;

    #[tokio::test]
    async fn test_logging_adapter_never_fails() {
        let adapter = LoggingTriggerAdapter::new();
        let key = TriggerKey::alarm(AlarmId::new());
        let payload = TriggerPayload {
            title: "Alarm".to_string(),
            body: "It's 7:00 AM - Time to wake up!".to_string(),
            channel_id: "rise-alarm-channel".to_string(),
            actions: vec![TriggerAction::dismiss()],
        };

        adapter.initialize("rise-alarm-channel").await.unwrap();
        assert!(adapter.request_permission().await.unwrap());
        adapter.display_now(&TriggerKey::test(), &payload).await.unwrap();
        adapter.arm(&key, Utc::now(), &payload).await.unwrap();
        adapter.cancel(&key).await.unwrap();
        adapter.cancel(&key).await.unwrap();
        adapter.cancel_all().await.unwrap();
        assert!(adapter.pending().await.unwrap().is_empty());
    }
}
