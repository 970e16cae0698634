//! Shared widget state.
//!
//! [`WidgetState`] is the single source of truth for what the UI draws: the
//! chat log (with highlight marks), the listening indicator and the "stop
//! speaking" affordance.  The assistant task mutates it; the egui update loop
//! reads it every frame.
//!
//! Every visible change bumps [`WidgetState::revision`], so a renderer can
//! tell whether anything happened since the last frame.  Setting a flag to
//! the value it already has is not a change.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::history::ChatLog;

// ---------------------------------------------------------------------------
// WidgetState
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct WidgetState {
    chat: ChatLog,
    listening: bool,
    stop_speaking_enabled: bool,
    /// A command is in flight.
    awaiting_reply: bool,
    revision: u64,
}

impl WidgetState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    /// Mutable access to the chat log.  Counts as one visible change.
    pub fn chat_mut(&mut self) -> &mut ChatLog {
        self.revision += 1;
        &mut self.chat
    }

    pub fn listening(&self) -> bool {
        self.listening
    }

    /// Returns `true` when the indicator actually changed.
    pub fn set_listening(&mut self, listening: bool) -> bool {
        if self.listening == listening {
            return false;
        }
        self.listening = listening;
        self.revision += 1;
        true
    }

    pub fn stop_speaking_enabled(&self) -> bool {
        self.stop_speaking_enabled
    }

    /// Returns `true` when the affordance actually changed.
    pub fn set_stop_speaking_enabled(&mut self, enabled: bool) -> bool {
        if self.stop_speaking_enabled == enabled {
            return false;
        }
        self.stop_speaking_enabled = enabled;
        self.revision += 1;
        true
    }

    pub fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    pub fn set_awaiting_reply(&mut self, awaiting: bool) {
        if self.awaiting_reply != awaiting {
            self.awaiting_reply = awaiting;
            self.revision += 1;
        }
    }

    /// Clear every highlight mark; bumps the revision only if one existed.
    pub fn clear_highlights(&mut self) {
        if self.chat.clear_highlights() {
            self.revision += 1;
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`WidgetState`].
///
/// Cheap to clone (`Arc` clone).  Lock with [`lock_state`] for a short
/// critical section; do **not** hold the lock across `.await` points.
pub type SharedState = Arc<Mutex<WidgetState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(WidgetState::new()))
}

/// Lock `state`, recovering the guard if a previous holder panicked.
///
/// The widget state holds no invariants that a panic could break halfway, so
/// a poisoned lock is still safe to use.
pub fn lock_state(state: &SharedState) -> MutexGuard<'_, WidgetState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
