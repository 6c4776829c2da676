//! End-to-end scenarios for the alarm store: persistence, reconciliation and
//! snoozing wired together the way the app wires them.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

use rise_core::types::{AlarmPatch, DayOfWeek, NewAlarm};
use rise_scheduler::trigger::TriggerCall;
use rise_scheduler::{
    AlarmStore, Clock, FireOutcome, FixedClock, MemoryTriggerAdapter, Reconciler, TimerTriggerAdapter,
    TriggerAdapter, TriggerKey,
};
use rise_storage::{AlarmPersistence, Database, MemoryPersistence, SqlitePersistence};

// =============================================================================
// Helpers
// =============================================================================

type TestClock = Arc<FixedClock<FixedOffset>>;

fn zone() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// 2024-01-01 is a Monday.
fn local(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    zone().with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
}

fn utc(local: DateTime<FixedOffset>) -> DateTime<Utc> {
    local.with_timezone(&Utc)
}

fn make_store(
    persistence: Arc<dyn AlarmPersistence>,
    now: DateTime<FixedOffset>,
) -> (AlarmStore<TestClock>, Arc<MemoryTriggerAdapter>, TestClock) {
    let adapter = Arc::new(MemoryTriggerAdapter::new());
    let clock = Arc::new(FixedClock::new(now));
    let reconciler = Reconciler::new(adapter.clone(), Arc::clone(&clock), "rise-alarm-channel");
    (AlarmStore::new(persistence, reconciler), adapter, clock)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn toggle_off_then_on_rearms_with_recomputed_time() {
    let (mut store, adapter, clock) = make_store(Arc::new(MemoryPersistence::new()), local(1, 8, 30));
    store.hydrate().await;

    let alarm = store.add(NewAlarm::at(9, 0)).await;
    let key = TriggerKey::alarm(alarm.id);
    assert_eq!(adapter.get(&key).unwrap().fire_at, utc(local(1, 9, 0)));

    adapter.clear_journal();
    let off = store.toggle(alarm.id).await.unwrap();
    assert!(!off.enabled);
    assert_eq!(adapter.journal(), vec![TriggerCall::Cancel(key.clone())]);
    assert!(store.active_alarms().is_empty());
    assert!(adapter.get(&key).is_none());

    // Re-enable after today's 09:00 has gone by.
    clock.set(local(1, 10, 0));
    let on = store.toggle(alarm.id).await.unwrap();
    assert!(on.enabled);
    assert_eq!(adapter.get(&key).unwrap().fire_at, utc(local(2, 9, 0)));
    assert_eq!(store.active_alarms().len(), 1);
}

#[tokio::test]
async fn snooze_at_seven_arms_five_minutes_later() {
    let (mut store, adapter, clock) = make_store(Arc::new(MemoryPersistence::new()), local(1, 6, 0));
    store.hydrate().await;
    let alarm = store
        .add(NewAlarm::at(7, 0).with_repeat_days([DayOfWeek::Mon, DayOfWeek::Tue]))
        .await;
    let primary = adapter.get(&TriggerKey::alarm(alarm.id)).unwrap();

    clock.set(local(1, 7, 0));
    let snoozed = store.snooze(alarm.id).await.unwrap();

    assert_eq!(snoozed, utc(local(1, 7, 5)));
    let snooze = adapter.get(&TriggerKey::snooze(alarm.id)).unwrap();
    assert_eq!(snooze.fire_at, utc(local(1, 7, 5)));
    assert_eq!(snooze.payload.title, "Snoozed: Alarm");
    assert_eq!(adapter.get(&TriggerKey::alarm(alarm.id)).unwrap(), primary);
}

#[tokio::test]
async fn cold_start_replaces_stale_platform_state() {
    let db = Arc::new(Database::in_memory().unwrap());
    let persistence: Arc<dyn AlarmPersistence> =
        Arc::new(SqlitePersistence::new(Arc::clone(&db), "@rise_alarms"));

    let saved = {
        let (mut store, _, _) = make_store(Arc::clone(&persistence), local(1, 8, 30));
        store.hydrate().await;
        let morning = store.add(NewAlarm::at(6, 45).with_label("Morning")).await;
        store.add(NewAlarm::at(22, 0).disabled()).await;
        morning
    };

    let (mut store, adapter, _) = make_store(persistence, local(3, 12, 0));
    adapter
        .arm(
            &TriggerKey::from("left-over".to_string()),
            utc(local(5, 0, 0)),
            &rise_scheduler::alarm_payload(&saved, "rise-alarm-channel"),
        )
        .await
        .unwrap();
    assert!(store.is_loading());

    let summary = store.hydrate().await.unwrap();

    assert!(!store.is_loading());
    assert_eq!(summary.armed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.alarms().len(), 2);
    assert_eq!(
        adapter.pending().await.unwrap(),
        vec![TriggerKey::alarm(saved.id)]
    );
    assert_eq!(
        adapter.get(&TriggerKey::alarm(saved.id)).unwrap().fire_at,
        utc(local(4, 6, 45))
    );
}

#[tokio::test]
async fn failing_adapter_keeps_store_usable() {
    let persistence = Arc::new(MemoryPersistence::new());
    let (mut store, adapter, _) = make_store(persistence.clone(), local(1, 8, 30));
    adapter.set_failing(true);
    store.hydrate().await;

    let alarm = store.add(NewAlarm::at(7, 0)).await;
    let mut patch = AlarmPatch::new(alarm.id);
    patch.label = Some("Wake".to_string());
    let updated = store.update(patch).await.unwrap();
    store.toggle(alarm.id).await.unwrap();
    assert!(store.snooze(alarm.id).await.is_none());

    assert_eq!(updated.label, "Wake");
    assert_eq!(persistence.load().await.unwrap().unwrap().len(), 1);
    assert!(adapter.live().is_empty());
    assert!(store.delete(alarm.id).await);
    assert!(store.alarms().is_empty());
}

#[tokio::test]
async fn persisted_blob_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rise.db");

    let added = {
        let db = Arc::new(Database::new(&path).unwrap());
        let (mut store, _, _) = make_store(
            Arc::new(SqlitePersistence::new(db, "@rise_alarms")),
            local(1, 8, 30),
        );
        store.hydrate().await;
        store
            .add(NewAlarm::at(5, 30).with_repeat_days([DayOfWeek::Sat, DayOfWeek::Sun]))
            .await
    };

    let db = Arc::new(Database::new(&path).unwrap());
    let (mut store, adapter, _) = make_store(
        Arc::new(SqlitePersistence::new(db, "@rise_alarms")),
        local(1, 8, 30),
    );
    store.hydrate().await;

    assert_eq!(store.get(added.id), Some(&added));
    assert_eq!(
        adapter.get(&TriggerKey::alarm(added.id)).unwrap().fire_at,
        utc(local(6, 5, 30))
    );
}

#[tokio::test(start_paused = true)]
async fn timer_adapter_delivers_snooze_to_store() {
    let (timer, mut fired) = TimerTriggerAdapter::new();
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let reconciler = Reconciler::new(Arc::new(timer), Arc::clone(&clock), "rise-alarm-channel");
    let mut store = AlarmStore::new(Arc::new(MemoryPersistence::new()), reconciler);
    store.hydrate().await;

    let alarm = store.add(NewAlarm::at(7, 0)).await;
    store.snooze(alarm.id).await.unwrap();

    let event = tokio::time::timeout(std::time::Duration::from_secs(600), fired.recv())
        .await
        .expect("snooze should fire within ten minutes")
        .unwrap();
    assert_eq!(event.key, TriggerKey::snooze(alarm.id));
    assert_eq!(
        store.handle_fired(&event).await,
        FireOutcome::SnoozeElapsed(alarm.id)
    );
    assert!(clock.now() <= event.fire_at - Duration::minutes(4));
}
