//! Alarm scheduling engine for Rise.
//!
//! Resolves the next fire time of each alarm, keeps one platform trigger
//! per enabled alarm through a pluggable [`TriggerAdapter`], derives snooze
//! triggers, and owns the alarm collection.

pub mod clock;
pub mod error;
pub mod reconciler;
pub mod resolver;
pub mod snooze;
pub mod store;
pub mod trigger;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::TriggerError;
pub use reconciler::{alarm_payload, test_payload, RebuildSummary, Reconciler};
pub use resolver::{next_occurrence, resolve_next_fire_time};
pub use snooze::{snooze_fire_time, snooze_payload};
pub use store::{AlarmStore, FireOutcome};
pub use trigger::{
    build_adapter, FiredTrigger, LoggingTriggerAdapter, MemoryTriggerAdapter,
    TimerTriggerAdapter, TriggerAdapter, TriggerKey, TriggerKind, TriggerPayload,
};
