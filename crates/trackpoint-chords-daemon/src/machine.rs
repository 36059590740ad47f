//! Activation state machine
//!
//! ```text
//!              idle timeout
//!   ┌──────────┐ ───────────────▶ ┌────────┐
//!   │ INACTIVE │                  │ ACTIVE │
//!   └──────────┘ ◀─────────────── └────────┘
//!      ▲    │      motion / shutdown    │
//!      └────┘                           │ button: diff -> key events
//!      motion: reset idle budget        ▼
//! ```
//!
//! While inactive the buttons click normally and button changes are only
//! tracked. Once the pointer has rested for the idle budget, native clicks are
//! disabled, the cursor is hidden and button chords become modifier keys.
//! Motion while active releases every held modifier before clicks come back.

use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use trackpoint_chords_config::TimingConfig;

use crate::chord::ButtonState;
use crate::diff::{apply_diff, KeySink};
use crate::input::DecodedEvent;
use crate::retry::retry_until_ok;

/// Toggles native button clicks and cursor visibility.
pub trait ModeSwitch {
    fn set_native_clicks_enabled(&mut self, enabled: bool) -> Result<()>;
    fn set_cursor_visible(&mut self, visible: bool) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationMode {
    /// Buttons behave as ordinary mouse buttons
    Inactive,
    /// Buttons produce modifiers, clicks disabled, cursor hidden
    Active,
}

pub struct Machine<K, M> {
    keys: K,
    switch: M,
    state: ButtonState,
    mode: ActivationMode,
    idle_budget: Duration,
    idle_deadline: Instant,
    retry_backoff: Duration,
}

impl<K: KeySink, M: ModeSwitch> Machine<K, M> {
    /// Start inactive, with the full idle budget ahead.
    pub fn new(keys: K, switch: M, timing: &TimingConfig) -> Self {
        Self {
            keys,
            switch,
            state: ButtonState::RELEASED,
            mode: ActivationMode::Inactive,
            idle_budget: timing.idle_timeout,
            idle_deadline: Instant::now() + timing.idle_timeout,
            retry_backoff: timing.retry_backoff,
        }
    }

    pub fn mode(&self) -> ActivationMode {
        self.mode
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// When the idle budget runs out, `None` while active.
    pub fn idle_deadline(&self) -> Option<Instant> {
        match self.mode {
            ActivationMode::Inactive => Some(self.idle_deadline),
            ActivationMode::Active => None,
        }
    }

    /// Feed one decoded device event.
    pub async fn handle(&mut self, event: DecodedEvent) {
        if event == DecodedEvent::Ignored {
            return;
        }

        let old = self.state;
        self.state = old.apply(event);

        if self.state.just_moved {
            match self.mode {
                ActivationMode::Active => self.deactivate().await,
                ActivationMode::Inactive => self.reset_idle_budget(),
            }
            return;
        }

        tracing::trace!("Buttons {} -> {} ({:?})", old, self.state, self.mode);

        if self.mode == ActivationMode::Active {
            apply_diff(old, self.state, &mut self.keys);
        }
    }

    /// Enter remap mode. Blocks until the mode switch has gone through.
    pub async fn activate(&mut self) {
        if self.mode == ActivationMode::Active {
            return;
        }

        self.switch_mode(ActivationMode::Active).await;
        self.mode = ActivationMode::Active;
        self.state.just_moved = false;

        tracing::info!("Pointer at rest, buttons {} now act as modifiers", self.state);
    }

    /// Leave remap mode: release every held modifier, then restore clicks.
    ///
    /// The button state is cleared and the idle budget restarts whether or not
    /// the machine was active, so calling this twice is harmless.
    pub async fn deactivate(&mut self) {
        let old = self.state;
        self.state = ButtonState::RELEASED;

        if self.mode == ActivationMode::Active {
            self.mode = ActivationMode::Inactive;

            let released = apply_diff(old, self.state, &mut self.keys);
            tracing::debug!("Released {} modifier(s) on deactivation", released);

            self.switch_mode(ActivationMode::Inactive).await;
            tracing::info!("Pointer moved, native clicks restored");
        }

        self.reset_idle_budget();
    }

    /// Forced deactivation before exit.
    pub async fn shutdown(&mut self) {
        tracing::debug!("Shutting down from {:?}", self.mode);
        self.deactivate().await;
    }

    async fn switch_mode(&mut self, target: ActivationMode) {
        let normal = target == ActivationMode::Inactive;
        let backoff = self.retry_backoff;
        let switch = &mut self.switch;

        let clicks = if normal {
            "enable native clicks"
        } else {
            "disable native clicks"
        };
        retry_until_ok(clicks, backoff, || switch.set_native_clicks_enabled(normal)).await;

        let cursor = if normal { "show cursor" } else { "hide cursor" };
        retry_until_ok(cursor, backoff, || switch.set_cursor_visible(normal)).await;
    }

    fn reset_idle_budget(&mut self) {
        self.idle_deadline = Instant::now() + self.idle_budget;
    }
}
