//! # Session Store Module
//!
//! Keeps the in-progress [`FlowSession`] of every user and serializes access to it.
//! Each user owns a slot guarded by an async mutex; holding a [`SessionGuard`] means
//! no other transition for that user can run until the guard is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::dialogue::FlowSession;

type Slot = Arc<AsyncMutex<Option<FlowSession>>>;

/// Per-user session storage with per-user locking
///
/// Different users never contend with each other beyond the short map lookup.
/// Slots are created on demand and removed again once a guard drops with no
/// session left in it.
#[derive(Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<i64, Slot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to the session of `chat_id`
    ///
    /// Waits while another transition for the same user holds the guard.
    pub async fn lock(self: &Arc<Self>, chat_id: i64) -> SessionGuard {
        loop {
            let slot = {
                let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
                Arc::clone(slots.entry(chat_id).or_default())
            };
            let guard = Arc::clone(&slot).lock_owned().await;

            // The previous holder may have dropped the slot from the map while we waited
            let current = {
                let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
                slots.get(&chat_id).is_some_and(|s| Arc::ptr_eq(s, &slot))
            };
            if current {
                return SessionGuard {
                    chat_id,
                    slot,
                    guard: Some(guard),
                    store: Arc::clone(self),
                };
            }
            debug!(user_id = %chat_id, "Session slot replaced while waiting, retrying");
        }
    }

    /// Copy of the current session, if any
    pub async fn get(self: &Arc<Self>, chat_id: i64) -> Option<FlowSession> {
        self.lock(chat_id).await.clone()
    }

    /// Whether the user currently has a session
    pub async fn contains(self: &Arc<Self>, chat_id: i64) -> bool {
        self.lock(chat_id).await.is_some()
    }

    /// Drop the session of `chat_id`, returning it
    pub async fn remove(self: &Arc<Self>, chat_id: i64) -> Option<FlowSession> {
        self.lock(chat_id).await.take()
    }

    /// Number of users with an allocated slot
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive handle on one user's session slot
///
/// Dereferences to `Option<FlowSession>`; setting it to `None` ends the session.
pub struct SessionGuard {
    chat_id: i64,
    slot: Slot,
    guard: Option<OwnedMutexGuard<Option<FlowSession>>>,
    store: Arc<SessionStore>,
}

impl SessionGuard {
    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }
}

impl std::ops::Deref for SessionGuard {
    type Target = Option<FlowSession>;

    fn deref(&self) -> &Self::Target {
        // Only `Drop` takes the inner guard
        self.guard.as_deref().unwrap_or(&None)
    }
}

impl std::ops::DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.guard.as_deref_mut() {
            Some(session) => session,
            None => unreachable!("session guard used after release"),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        // Removal happens while the slot is still locked, so waiters re-check and retry
        if guard.is_none() {
            let mut slots = self.store.slots.lock().unwrap_or_else(|p| p.into_inner());
            if slots.get(&self.chat_id).is_some_and(|s| Arc::ptr_eq(s, &self.slot)) {
                slots.remove(&self.chat_id);
            }
        }
        drop(guard);
    }
}
