//! In-memory trigger adapter.
//!
//! Keeps the set of live triggers plus an ordered journal of every call, so
//! reconciliation can be inspected without a platform. Can be switched into
//! a failing mode to simulate an unavailable capability.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TriggerError;
use crate::trigger::{TriggerAdapter, TriggerKey, TriggerPayload};

/// A trigger currently held by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedTrigger {
    pub key: TriggerKey,
    pub fire_at: DateTime<Utc>,
    pub payload: TriggerPayload,
}

/// One call made against the adapter, in the order received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerCall {
    Initialize(String),
    Arm(TriggerKey, DateTime<Utc>),
    Cancel(TriggerKey),
    CancelAll,
}

#[derive(Default)]
struct MemoryState {
    live: HashMap<TriggerKey, ArmedTrigger>,
    journal: Vec<TriggerCall>,
}

/// Adapter that records triggers in memory.
#[derive(Default)]
pub struct MemoryTriggerAdapter {
    state: Mutex<MemoryState>,
    failing: AtomicBool,
    denied: AtomicBool,
}

impl MemoryTriggerAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`TriggerError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Answer permission requests with a refusal.
    pub fn set_permission_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    /// Snapshot of all live triggers, soonest first.
    pub fn live(&self) -> Vec<ArmedTrigger> {
        let mut live: Vec<ArmedTrigger> = match self.lock() {
            Ok(state) => state.live.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        live.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.key.cmp(&b.key)));
        live
    }

    /// The live trigger for `key`, if any.
    pub fn get(&self, key: &TriggerKey) -> Option<ArmedTrigger> {
        self.lock().ok().and_then(|state| state.live.get(key).cloned())
    }

    /// Every call received so far.
    pub fn journal(&self) -> Vec<TriggerCall> {
        self.lock()
            .map(|state| state.journal.clone())
            .unwrap_or_default()
    }

    pub fn clear_journal(&self) {
        if let Ok(mut state) = self.lock() {
            state.journal.clear();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, TriggerError> {
        self.state
            .lock()
            .map_err(|e| TriggerError::LockPoisoned(e.to_string()))
    }

    fn check_available(&self) -> Result<(), TriggerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TriggerError::Unavailable(
                "memory adapter set to fail".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TriggerAdapter for MemoryTriggerAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self, channel_id: &str) -> Result<(), TriggerError> {
        self.check_available()?;
        self.lock()?
            .journal
            .push(TriggerCall::Initialize(channel_id.to_string()));
        Ok(())
    }

    async fn request_permission(&self) -> Result<bool, TriggerError> {
        self.check_available()?;
        Ok(!self.denied.load(Ordering::SeqCst))
    }

    async fn arm(
        &self,
        key: &TriggerKey,
        fire_at: DateTime<Utc>,
        payload: &TriggerPayload,
    ) -> Result<(), TriggerError> {
        self.check_available()?;
        let mut state = self.lock()?;
        state.journal.push(TriggerCall::Arm(key.clone(), fire_at));
        state.live.insert(
            key.clone(),
            ArmedTrigger {
                key: key.clone(),
                fire_at,
                payload: payload.clone(),
            },
        );
        Ok(())
    }

    async fn cancel(&self, key: &TriggerKey) -> Result<(), TriggerError> {
        self.check_available()?;
        let mut state = self.lock()?;
        state.journal.push(TriggerCall::Cancel(key.clone()));
        state.live.remove(key);
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), TriggerError> {
        self.check_available()?;
        let mut state = self.lock()?;
        state.journal.push(TriggerCall::CancelAll);
        state.live.clear();
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<TriggerKey>, TriggerError> {
        self.check_available()?;
        let state = self.lock()?;
        let mut keys: Vec<TriggerKey> = state.live.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
