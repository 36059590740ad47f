//! Test doubles for the daemon's collaborators
//!
//! Key sink and mode switch write into one shared [`CallLog`], so tests can
//! assert the order of calls across both.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::time::Instant;

use crate::chord::ModifierKey;
use crate::diff::KeySink;
use crate::input::{InputSource, RawEvent};
use crate::machine::ModeSwitch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Press(ModifierKey),
    Release(ModifierKey),
    Clicks(bool),
    Cursor(bool),
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

pub struct RecordingKeys {
    log: CallLog,
    fail: bool,
}

impl RecordingKeys {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail: false,
        }
    }

    /// Record calls but report every one of them as failed.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn record(&mut self, call: Call) -> Result<()> {
        self.log.push(call);
        if self.fail {
            bail!("key sink unavailable");
        }
        Ok(())
    }
}

impl KeySink for RecordingKeys {
    fn press(&mut self, key: ModifierKey) -> Result<()> {
        self.record(Call::Press(key))
    }

    fn release(&mut self, key: ModifierKey) -> Result<()> {
        self.record(Call::Release(key))
    }
}

pub struct RecordingSwitch {
    log: CallLog,
    click_failures: u32,
    enable_failures: u32,
    cursor_failures: u32,
}

impl RecordingSwitch {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            click_failures: 0,
            enable_failures: 0,
            cursor_failures: 0,
        }
    }

    /// Fail the next `n` click mode changes.
    pub fn failing_clicks(mut self, n: u32) -> Self {
        self.click_failures = n;
        self
    }

    /// Fail the next `n` attempts to re-enable clicks.
    pub fn failing_enable(mut self, n: u32) -> Self {
        self.enable_failures = n;
        self
    }

    /// Fail the next `n` cursor visibility changes.
    pub fn failing_cursor(mut self, n: u32) -> Self {
        self.cursor_failures = n;
        self
    }
}

impl ModeSwitch for RecordingSwitch {
    fn set_native_clicks_enabled(&mut self, enabled: bool) -> Result<()> {
        self.log.push(Call::Clicks(enabled));
        if self.click_failures > 0 {
            self.click_failures -= 1;
            bail!("pointer mapping busy");
        }
        if enabled && self.enable_failures > 0 {
            self.enable_failures -= 1;
            bail!("pointer mapping busy");
        }
        Ok(())
    }

    fn set_cursor_visible(&mut self, visible: bool) -> Result<()> {
        self.log.push(Call::Cursor(visible));
        if self.cursor_failures > 0 {
            self.cursor_failures -= 1;
            bail!("cursor request rejected");
        }
        Ok(())
    }
}

/// Replays events at fixed offsets from its creation, then stays silent.
pub struct ScriptedInput {
    start: Instant,
    script: VecDeque<(Duration, io::Result<RawEvent>)>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            script: VecDeque::new(),
        }
    }

    pub fn event_at(mut self, at_ms: u64, event: RawEvent) -> Self {
        self.script.push_back((Duration::from_millis(at_ms), Ok(event)));
        self
    }

    pub fn error_at(mut self, at_ms: u64, kind: io::ErrorKind) -> Self {
        self.script
            .push_back((Duration::from_millis(at_ms), Err(io::Error::from(kind))));
        self
    }
}

impl InputSource for ScriptedInput {
    async fn next_event(&mut self) -> io::Result<RawEvent> {
        let Some((at, _)) = self.script.front() else {
            return std::future::pending().await;
        };

        // Pop only once due, so a cancelled wait keeps the event
        tokio::time::sleep_until(self.start + *at).await;
        match self.script.pop_front() {
            Some((_, result)) => result,
            None => std::future::pending().await,
        }
    }
}

pub const MOTION: RawEvent = RawEvent {
    kind: 2,
    code: 0,
    value: 3,
};

pub const SYN: RawEvent = RawEvent {
    kind: 0,
    code: 0,
    value: 0,
};

pub fn left(pressed: bool) -> RawEvent {
    RawEvent::new(1, 0x110, pressed as i32)
}

pub fn right(pressed: bool) -> RawEvent {
    RawEvent::new(1, 0x111, pressed as i32)
}

pub fn middle(pressed: bool) -> RawEvent {
    RawEvent::new(1, 0x112, pressed as i32)
}
