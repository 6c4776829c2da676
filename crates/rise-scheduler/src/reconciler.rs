//! Keeps platform triggers consistent with the alarm collection.
//!
//! Every operation awaits the adapter to completion before returning. Adapter
//! failures are logged and absorbed; none of the public operations fail.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use rise_core::types::{Alarm, AlarmId};

use crate::clock::Clock;
use crate::resolver::resolve_next_fire_time;
use crate::trigger::{TriggerAction, TriggerAdapter, TriggerKey, TriggerPayload};

/// Counts reported by [`Reconciler::rebuild_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub armed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Applies per-alarm trigger changes through a [`TriggerAdapter`].
pub struct Reconciler<C: Clock> {
    adapter: Arc<dyn TriggerAdapter>,
    clock: C,
    channel_id: String,
}

impl<C: Clock> Reconciler<C> {
    pub fn new(adapter: Arc<dyn TriggerAdapter>, clock: C, channel_id: impl Into<String>) -> Self {
        Self {
            adapter,
            clock,
            channel_id: channel_id.into(),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn TriggerAdapter> {
        &self.adapter
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Prepare the adapter. A failure leaves the engine usable without
    /// device alerts.
    pub async fn initialize(&self) -> bool {
        match self.adapter.initialize(&self.channel_id).await {
            Ok(()) => {
                info!(adapter = self.adapter.name(), channel = %self.channel_id, "Trigger adapter initialized");
                true
            }
            Err(e) => {
                warn!(adapter = self.adapter.name(), error = %e, "Trigger adapter initialization failed");
                false
            }
        }
    }

    /// Ask the adapter for alert permission. Errors count as a refusal.
    pub async fn request_permission(&self) -> bool {
        match self.adapter.request_permission().await {
            Ok(granted) => {
                info!(adapter = self.adapter.name(), granted, "Alert permission requested");
                granted
            }
            Err(e) => {
                warn!(adapter = self.adapter.name(), error = %e, "Alert permission request failed");
                false
            }
        }
    }

    /// Show a test notification immediately. Returns false if the adapter
    /// refused it.
    pub async fn display_test(&self) -> bool {
        let payload = test_payload(&self.channel_id);
        match self.adapter.display_now(&TriggerKey::test(), &payload).await {
            Ok(()) => {
                info!("Test notification displayed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to display test notification");
                false
            }
        }
    }

    /// Next fire time of `alarm` relative to the clock.
    pub fn next_fire_time(&self, alarm: &Alarm) -> DateTime<C::Tz> {
        resolve_next_fire_time(alarm, &self.clock.now())
    }

    /// Replace the trigger for `alarm` with one at its next occurrence.
    ///
    /// Returns the armed instant, or `None` when the alarm is disabled or the
    /// adapter refused the trigger.
    pub async fn schedule_one(&self, alarm: &Alarm) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        self.schedule_after(alarm, &now).await
    }

    /// Like [`schedule_one`](Self::schedule_one) but resolves the next
    /// occurrence strictly after `after`.
    pub async fn schedule_after(
        &self,
        alarm: &Alarm,
        after: &DateTime<C::Tz>,
    ) -> Option<DateTime<Utc>> {
        if !alarm.enabled {
            debug!(alarm_id = %alarm.id, "Alarm disabled, not scheduling");
            return None;
        }

        let key = TriggerKey::alarm(alarm.id);
        if let Err(e) = self.adapter.cancel(&key).await {
            warn!(alarm_id = %alarm.id, error = %e, "Failed to cancel previous trigger");
        }

        let fire_at = resolve_next_fire_time(alarm, after).with_timezone(&Utc);
        let payload = alarm_payload(alarm, &self.channel_id);

        match self.adapter.arm(&key, fire_at, &payload).await {
            Ok(()) => {
                info!(alarm_id = %alarm.id, fire_at = %fire_at, "Alarm trigger armed");
                Some(fire_at)
            }
            Err(e) => {
                warn!(
                    alarm_id = %alarm.id,
                    fire_at = %fire_at,
                    error = %e,
                    "Failed to arm alarm trigger; alarm will not fire"
                );
                None
            }
        }
    }

    /// Cancel the primary trigger for `id`. Returns false only when the
    /// adapter reported a failure.
    pub async fn cancel_one(&self, id: AlarmId) -> bool {
        self.cancel_key(&TriggerKey::alarm(id)).await
    }

    /// Cancel the snooze trigger for `id`, if any.
    pub async fn cancel_snooze(&self, id: AlarmId) -> bool {
        self.cancel_key(&TriggerKey::snooze(id)).await
    }

    pub(crate) async fn cancel_key(&self, key: &TriggerKey) -> bool {
        match self.adapter.cancel(key).await {
            Ok(()) => {
                info!(key = %key, "Trigger cancelled");
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to cancel trigger");
                false
            }
        }
    }

    /// Cancel every armed trigger, then arm one per enabled alarm.
    ///
    /// A full sweep rather than a diff: used on cold start only.
    pub async fn rebuild_all(&self, alarms: &[Alarm]) -> RebuildSummary {
        if let Err(e) = self.adapter.cancel_all().await {
            warn!(error = %e, "Failed to cancel existing triggers before rebuild");
        }

        let mut summary = RebuildSummary::default();
        for alarm in alarms {
            if !alarm.enabled {
                summary.skipped += 1;
                continue;
            }
            match self.schedule_one(alarm).await {
                Some(_) => summary.armed += 1,
                None => summary.failed += 1,
            }
        }

        info!(
            armed = summary.armed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Trigger rebuild complete"
        );
        summary
    }
}

/// Notification content for an alarm's primary trigger.
pub fn alarm_payload(alarm: &Alarm, channel_id: &str) -> TriggerPayload {
    let mut actions = vec![TriggerAction::dismiss()];
    if alarm.snooze_enabled {
        actions.push(TriggerAction::snooze(alarm.snooze_duration_minutes));
    }
    TriggerPayload {
        title: alarm.display_label().to_string(),
        body: format!("It's {} - Time to wake up!", alarm.formatted_time()),
        channel_id: channel_id.to_string(),
        actions,
    }
}

/// Notification content for a test notification.
pub fn test_payload(channel_id: &str) -> TriggerPayload {
    TriggerPayload {
        title: "Rise Test".to_string(),
        body: "Notifications are working correctly!".to_string(),
        channel_id: channel_id.to_string(),
        actions: Vec::new(),
    }
}
