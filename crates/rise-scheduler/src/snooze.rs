//! Snooze triggers.
//!
//! A snooze is a one-shot trigger keyed `<id>_snooze`, independent of the
//! alarm's recurring trigger and invisible to next-fire-time resolution.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{info, warn};

use rise_core::types::Alarm;

use crate::clock::Clock;
use crate::reconciler::Reconciler;
use crate::trigger::{TriggerAction, TriggerKey, TriggerPayload};

/// `now` plus the snooze duration. A zero duration counts as one minute.
pub fn snooze_fire_time<Tz: TimeZone>(now: &DateTime<Tz>, minutes: u32) -> DateTime<Tz> {
    now.clone() + Duration::minutes(i64::from(minutes.max(1)))
}

/// Notification content for a snooze trigger.
pub fn snooze_payload(alarm: &Alarm, channel_id: &str) -> TriggerPayload {
    TriggerPayload {
        title: format!("Snoozed: {}", alarm.display_label()),
        body: format!(
            "Originally {} - Wake up in {} minutes!",
            alarm.formatted_time(),
            alarm.snooze_duration_minutes.max(1)
        ),
        channel_id: channel_id.to_string(),
        actions: vec![TriggerAction::dismiss()],
    }
}

impl<C: Clock> Reconciler<C> {
    /// Arm a snooze trigger for `alarm`, replacing any pending snooze.
    ///
    /// Returns `None` when snoozing is turned off for the alarm or the
    /// adapter refused the trigger. The primary trigger is left alone.
    pub async fn snooze(&self, alarm: &Alarm) -> Option<DateTime<Utc>> {
        if !alarm.snooze_enabled {
            info!(alarm_id = %alarm.id, "Snooze disabled for alarm");
            return None;
        }

        let key = TriggerKey::snooze(alarm.id);
        if let Err(e) = self.adapter().cancel(&key).await {
            warn!(alarm_id = %alarm.id, error = %e, "Failed to cancel previous snooze");
        }

        let fire_at = snooze_fire_time(&self.clock().now(), alarm.snooze_duration_minutes)
            .with_timezone(&Utc);
        let payload = snooze_payload(alarm, self.channel_id());

        match self.adapter().arm(&key, fire_at, &payload).await {
            Ok(()) => {
                info!(alarm_id = %alarm.id, fire_at = %fire_at, "Snooze armed");
                Some(fire_at)
            }
            Err(e) => {
                warn!(alarm_id = %alarm.id, error = %e, "Failed to arm snooze");
                None
            }
        }
    }
}
