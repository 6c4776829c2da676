//! In-process trigger adapter backed by tokio timers.
//!
//! Each armed key owns one sleeping task. When the sleep completes the task
//! removes its own entry and delivers a [`FiredTrigger`] on the channel
//! returned from [`TimerTriggerAdapter::new`]. Cancelling aborts the task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TriggerError;
use crate::trigger::{FiredTrigger, TriggerAdapter, TriggerKey, TriggerPayload};

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

type TimerMap = Arc<Mutex<HashMap<TriggerKey, ArmedTimer>>>;

/// Adapter that fires triggers from tokio tasks inside this process.
pub struct TimerTriggerAdapter {
    timers: TimerMap,
    generation: AtomicU64,
    fired_tx: mpsc::UnboundedSender<FiredTrigger>,
}

impl TimerTriggerAdapter {
    /// Create the adapter and the receiver fired triggers arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FiredTrigger>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let adapter = Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            fired_tx,
        };
        (adapter, fired_rx)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<TriggerKey, ArmedTimer>>, TriggerError> {
        self.timers
            .lock()
            .map_err(|e| TriggerError::LockPoisoned(e.to_string()))
    }
}

/// Sleep until `fire_at`, then hand the trigger over unless it was replaced.
async fn run_timer(
    timers: TimerMap,
    generation: u64,
    fired: FiredTrigger,
    fired_tx: mpsc::UnboundedSender<FiredTrigger>,
) {
    let delay = (fired.fire_at - Utc::now())
        .to_std()
        .unwrap_or(std::time::Duration::ZERO);
    tokio::time::sleep(delay).await;

    let still_current = match timers.lock() {
        Ok(mut map) => match map.get(&fired.key) {
            Some(timer) if timer.generation == generation => {
                map.remove(&fired.key);
                true
            }
            _ => false,
        },
        Err(_) => false,
    };

    if still_current {
        tracing::debug!(key = %fired.key, "Trigger fired");
        if fired_tx.send(fired).is_err() {
            tracing::warn!("Fired trigger dropped: receiver closed");
        }
    }
}

#[async_trait]
impl TriggerAdapter for TimerTriggerAdapter {
    fn name(&self) -> &'static str {
        "timer"
    }

    async fn arm(
        &self,
        key: &TriggerKey,
        fire_at: DateTime<Utc>,
        payload: &TriggerPayload,
    ) -> Result<(), TriggerError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let fired = FiredTrigger {
            key: key.clone(),
            fire_at,
            payload: payload.clone(),
        };

        let mut timers = self.lock()?;
        let handle = tokio::spawn(run_timer(
            Arc::clone(&self.timers),
            generation,
            fired,
            self.fired_tx.clone(),
        ));
        if let Some(previous) = timers.insert(key.clone(), ArmedTimer { generation, handle }) {
            previous.handle.abort();
        }
        Ok(())
    }

    async fn cancel(&self, key: &TriggerKey) -> Result<(), TriggerError> {
        if let Some(timer) = self.lock()?.remove(key) {
            timer.handle.abort();
        }
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), TriggerError> {
        let mut timers = self.lock()?;
        for (_, timer) in timers.drain() {
            timer.handle.abort();
        }
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<TriggerKey>, TriggerError> {
        let mut keys: Vec<TriggerKey> = self.lock()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

impl Drop for TimerTriggerAdapter {
    fn drop(&mut self) {
        if let Ok(mut timers) = self.timers.lock() {
            for (_, timer) in timers.drain() {
                timer.handle.abort();
            }
        }
    }
}
