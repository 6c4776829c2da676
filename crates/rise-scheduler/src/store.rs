//! The alarm collection and its management API.
//!
//! Each mutation runs in order: change in memory, persist, reconcile the one
//! affected trigger, return. Persistence failures are logged and leave the
//! in-memory state authoritative.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use rise_core::config::OneTimePolicy;
use rise_core::types::{Alarm, AlarmId, AlarmPatch, NewAlarm, Timestamp};
use rise_storage::AlarmPersistence;

use crate::clock::{Clock, SystemClock};
use crate::reconciler::{RebuildSummary, Reconciler};
use crate::trigger::{FiredTrigger, TriggerKey, TriggerKind};

/// Result of handling a fired trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// The alarm was armed again for its next occurrence.
    Rearmed {
        id: AlarmId,
        next: Option<DateTime<Utc>>,
    },
    /// A one-time alarm was switched off.
    Disabled(AlarmId),
    /// A snooze trigger elapsed. Nothing to change.
    SnoozeElapsed(AlarmId),
    /// The key does not belong to a live, enabled alarm.
    Ignored,
}

/// Owns the alarm collection and keeps persistence and triggers in step.
pub struct AlarmStore<C: Clock = SystemClock> {
    alarms: Vec<Alarm>,
    persistence: Arc<dyn AlarmPersistence>,
    reconciler: Reconciler<C>,
    one_time_policy: OneTimePolicy,
    loading: bool,
}

impl<C: Clock> AlarmStore<C> {
    /// An empty store. Call [`hydrate`](Self::hydrate) before use.
    pub fn new(persistence: Arc<dyn AlarmPersistence>, reconciler: Reconciler<C>) -> Self {
        Self {
            alarms: Vec::new(),
            persistence,
            reconciler,
            one_time_policy: OneTimePolicy::default(),
            loading: true,
        }
    }

    pub fn with_one_time_policy(mut self, policy: OneTimePolicy) -> Self {
        self.one_time_policy = policy;
        self
    }

    pub fn reconciler(&self) -> &Reconciler<C> {
        &self.reconciler
    }

    /// True until the first hydration has finished.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Load the persisted collection and rebuild every trigger from it.
    ///
    /// A load failure leaves the store empty and the platform untouched. The
    /// unreadable blob is set aside first so the next save cannot lose it.
    pub async fn hydrate(&mut self) -> Option<RebuildSummary> {
        self.loading = true;
        let summary = match self.persistence.load().await {
            Ok(loaded) => {
                self.alarms = dedupe(loaded.unwrap_or_default());
                info!(count = self.alarms.len(), "Alarms loaded");
                Some(self.reconciler.rebuild_all(&self.alarms).await)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load alarms; starting empty");
                if let Err(e) = self.persistence.quarantine().await {
                    warn!(error = %e, "Failed to set aside unreadable alarms");
                }
                self.alarms.clear();
                None
            }
        };
        self.loading = false;
        summary
    }

    /// Create an alarm from `input` and arm it if enabled.
    pub async fn add(&mut self, input: NewAlarm) -> Alarm {
        let alarm = Alarm::from_new(input, AlarmId::new(), self.timestamp());
        self.alarms.push(alarm.clone());
        self.persist().await;
        if alarm.enabled {
            self.reconciler.schedule_one(&alarm).await;
        }
        info!(alarm_id = %alarm.id, time = %alarm.formatted_time(), "Alarm added");
        alarm
    }

    /// Merge `patch` into the alarm it names and re-derive its trigger.
    ///
    /// Returns `None` when no alarm has that id.
    pub async fn update(&mut self, patch: AlarmPatch) -> Option<Alarm> {
        let now = self.timestamp();
        let alarm = {
            let alarm = self.find_mut(patch.id)?;
            patch.apply_to(alarm);
            alarm.updated_at = now;
            alarm.clone()
        };
        self.persist().await;
        self.reconcile(&alarm).await;
        debug!(alarm_id = %alarm.id, "Alarm updated");
        Some(alarm)
    }

    /// Flip `enabled` on an alarm. Returns the updated alarm.
    pub async fn toggle(&mut self, id: AlarmId) -> Option<Alarm> {
        let now = self.timestamp();
        let alarm = {
            let alarm = self.find_mut(id)?;
            alarm.enabled = !alarm.enabled;
            alarm.updated_at = now;
            alarm.clone()
        };
        self.persist().await;
        self.reconcile(&alarm).await;
        info!(alarm_id = %id, enabled = alarm.enabled, "Alarm toggled");
        Some(alarm)
    }

    /// Remove an alarm along with its primary and snooze triggers.
    ///
    /// Returns false when no alarm has that id.
    pub async fn delete(&mut self, id: AlarmId) -> bool {
        let before = self.alarms.len();
        self.alarms.retain(|alarm| alarm.id != id);
        if self.alarms.len() == before {
            return false;
        }
        self.persist().await;
        self.reconciler.cancel_one(id).await;
        self.reconciler.cancel_snooze(id).await;
        info!(alarm_id = %id, "Alarm deleted");
        true
    }

    /// Arm a snooze for the alarm with `id`.
    pub async fn snooze(&self, id: AlarmId) -> Option<DateTime<Utc>> {
        let alarm = self.get(id)?;
        self.reconciler.snooze(alarm).await
    }

    /// React to a trigger delivered by the adapter.
    ///
    /// Repeating alarms are re-armed. One-time alarms follow the configured
    /// [`OneTimePolicy`]. The next occurrence is resolved after the later of
    /// the clock and the trigger's own fire time, so an early wake-up never
    /// re-arms the same instant.
    pub async fn handle_fired(&mut self, fired: &FiredTrigger) -> FireOutcome {
        let id = match fired.key.kind() {
            Some(TriggerKind::Alarm(id)) => id,
            Some(TriggerKind::Snooze(id)) => {
                info!(alarm_id = %id, "Snooze elapsed");
                return FireOutcome::SnoozeElapsed(id);
            }
            None if fired.key == TriggerKey::test() => {
                debug!("Test notification delivered");
                return FireOutcome::Ignored;
            }
            None => {
                warn!(key = %fired.key, "Fired trigger has an unknown key");
                return FireOutcome::Ignored;
            }
        };

        let alarm = match self.get(id) {
            Some(alarm) if alarm.enabled => alarm.clone(),
            _ => {
                debug!(alarm_id = %id, "Fired alarm no longer active");
                return FireOutcome::Ignored;
            }
        };
        info!(alarm_id = %id, label = %alarm.display_label(), "Alarm fired");

        if alarm.is_one_time() && self.one_time_policy == OneTimePolicy::Disable {
            let now = self.timestamp();
            if let Some(stored) = self.find_mut(id) {
                stored.enabled = false;
                stored.updated_at = now;
            }
            self.persist().await;
            self.reconciler.cancel_one(id).await;
            info!(alarm_id = %id, "One-time alarm disabled after firing");
            return FireOutcome::Disabled(id);
        }

        let now = self.reconciler.clock().now();
        let fired_local = fired.fire_at.with_timezone(&now.timezone());
        let after = if fired_local > now { fired_local } else { now };
        let next = self.reconciler.schedule_after(&alarm, &after).await;
        FireOutcome::Rearmed { id, next }
    }

    pub fn get(&self, id: AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| alarm.id == id)
    }

    /// All alarms in insertion order.
    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    /// Alarms ordered by time of day; equal times keep insertion order.
    pub fn sorted_alarms(&self) -> Vec<&Alarm> {
        let mut sorted: Vec<&Alarm> = self.alarms.iter().collect();
        sorted.sort_by_key(|alarm| alarm.minutes_of_day());
        sorted
    }

    /// Enabled alarms in insertion order.
    pub fn active_alarms(&self) -> Vec<&Alarm> {
        self.alarms.iter().filter(|alarm| alarm.enabled).collect()
    }

    /// Enabled alarms with their next fire time, soonest first.
    pub fn upcoming(&self) -> Vec<(&Alarm, DateTime<C::Tz>)> {
        let mut upcoming: Vec<(&Alarm, DateTime<C::Tz>)> = self
            .active_alarms()
            .into_iter()
            .map(|alarm| (alarm, self.reconciler.next_fire_time(alarm)))
            .collect();
        upcoming.sort_by(|a, b| a.1.cmp(&b.1));
        upcoming
    }

    fn find_mut(&mut self, id: AlarmId) -> Option<&mut Alarm> {
        self.alarms.iter_mut().find(|alarm| alarm.id == id)
    }

    fn timestamp(&self) -> Timestamp {
        Timestamp::from_datetime(self.reconciler.clock().now().with_timezone(&Utc))
    }

    async fn reconcile(&self, alarm: &Alarm) {
        if alarm.enabled {
            self.reconciler.schedule_one(alarm).await;
        } else {
            self.reconciler.cancel_one(alarm.id).await;
        }
    }

    async fn persist(&self) {
        if let Err(e) = self.persistence.save(&self.alarms).await {
            warn!(error = %e, count = self.alarms.len(), "Failed to persist alarms");
        }
    }
}

/// Drop alarms whose id was already seen, keeping the first.
fn dedupe(alarms: Vec<Alarm>) -> Vec<Alarm> {
    let mut seen = HashSet::new();
    alarms
        .into_iter()
        .filter(|alarm| {
            let fresh = seen.insert(alarm.id);
            if !fresh {
                warn!(alarm_id = %alarm.id, "Dropping duplicate persisted alarm");
            }
            fresh
        })
        .collect()
}
