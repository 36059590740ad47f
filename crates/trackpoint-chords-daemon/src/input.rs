//! Raw device events and their decoding

use std::io;
use std::path::{Path, PathBuf};

use evdev::{Device, EventStream, EventType, Key};

use crate::error::DaemonError;

const EV_KEY: u16 = EventType::KEY.0;
const EV_REL: u16 = EventType::RELATIVE.0;
const BTN_LEFT: u16 = Key::BTN_LEFT.0;
const BTN_RIGHT: u16 = Key::BTN_RIGHT.0;
const BTN_MIDDLE: u16 = Key::BTN_MIDDLE.0;
const VALUE_DOWN: i32 = 1;

/// An undecoded `input_event` as read from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn new(kind: u16, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }
}

impl From<evdev::InputEvent> for RawEvent {
    fn from(event: evdev::InputEvent) -> Self {
        Self::new(event.event_type().0, event.code(), event.value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Middle,
    Right,
}

/// What a raw event means to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedEvent {
    /// Any relative axis movement
    Motion,
    ButtonChange { button: Button, pressed: bool },
    /// Sync reports, other keys, anything else
    Ignored,
}

pub fn decode(raw: RawEvent) -> DecodedEvent {
    let button = match (raw.kind, raw.code) {
        (EV_REL, _) => return DecodedEvent::Motion,
        (EV_KEY, BTN_LEFT) => Button::Left,
        (EV_KEY, BTN_RIGHT) => Button::Right,
        (EV_KEY, BTN_MIDDLE) => Button::Middle,
        _ => return DecodedEvent::Ignored,
    };

    DecodedEvent::ButtonChange {
        button,
        pressed: raw.value == VALUE_DOWN,
    }
}

/// A blocking stream of raw events.
///
/// Implementations must be cancel safe: dropping the future returned by
/// `next_event` must not lose an event.
pub trait InputSource {
    async fn next_event(&mut self) -> io::Result<RawEvent>;
}

/// The pointing device, read through evdev.
///
/// The device is not grabbed, so the pointer keeps driving the cursor.
pub struct EvdevSource {
    stream: EventStream,
    path: PathBuf,
}

impl EvdevSource {
    pub fn open(path: &Path) -> Result<Self, DaemonError> {
        let open_error = |source| DaemonError::DeviceOpen {
            path: path.to_path_buf(),
            source,
        };

        let device = Device::open(path).map_err(open_error)?;
        let name = device.name().unwrap_or("Unknown").to_string();
        let stream = device.into_event_stream().map_err(open_error)?;

        tracing::info!("Reading events from '{}' at {}", name, path.display());

        Ok(Self {
            stream,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InputSource for EvdevSource {
    async fn next_event(&mut self) -> io::Result<RawEvent> {
        self.stream.next_event().await.map(RawEvent::from)
    }
}
