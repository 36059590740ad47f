//! Button chords and the modifiers they stand for
//!
//! The three TrackPoint buttons are read as a chord. Each modifier has a fixed
//! boolean condition over (left, middle, right):
//!
//! ```text
//! modifier   left  middle  right
//! Control     1      0       -
//! Shift       -      0       1
//! Level3      0      1       1
//! Level5      1      1       0
//! ```
//!
//! The conditions overlap on purpose: left+right holds both Control and Shift.

use std::fmt;

use crate::input::{Button, DecodedEvent};

/// A modifier key the daemon can hold down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKey {
    Control,
    Shift,
    Level3,
    Level5,
}

impl ModifierKey {
    /// Every modifier, in the order they are evaluated on each state change.
    pub const ALL: [ModifierKey; 4] = [
        ModifierKey::Control,
        ModifierKey::Shift,
        ModifierKey::Level3,
        ModifierKey::Level5,
    ];
}

impl fmt::Display for ModifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifierKey::Control => write!(f, "Control"),
            ModifierKey::Shift => write!(f, "Shift"),
            ModifierKey::Level3 => write!(f, "Level3"),
            ModifierKey::Level5 => write!(f, "Level5"),
        }
    }
}

/// Physical state of the three buttons.
///
/// `just_moved` is set by a motion event and cleared by the next button event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub left: bool,
    pub middle: bool,
    pub right: bool,
    pub just_moved: bool,
}

impl ButtonState {
    /// No button held, no pending motion.
    pub const RELEASED: ButtonState = ButtonState {
        left: false,
        middle: false,
        right: false,
        just_moved: false,
    };

    pub fn new(left: bool, middle: bool, right: bool) -> Self {
        Self {
            left,
            middle,
            right,
            just_moved: false,
        }
    }

    /// The state after a decoded device event.
    pub fn apply(self, event: DecodedEvent) -> Self {
        match event {
            DecodedEvent::Motion => Self {
                just_moved: true,
                ..self
            },
            DecodedEvent::ButtonChange { button, pressed } => {
                let mut next = Self {
                    just_moved: false,
                    ..self
                };
                match button {
                    Button::Left => next.left = pressed,
                    Button::Middle => next.middle = pressed,
                    Button::Right => next.right = pressed,
                }
                next
            }
            DecodedEvent::Ignored => self,
        }
    }

    /// Modifiers this chord holds down.
    pub fn asserted(self) -> impl Iterator<Item = ModifierKey> {
        ModifierKey::ALL
            .into_iter()
            .filter(move |key| should_assert(self, *key))
    }
}

impl fmt::Display for ButtonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |held: bool, c: char| if held { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(self.left, 'L'),
            flag(self.middle, 'M'),
            flag(self.right, 'R')
        )
    }
}

/// Whether `key` should be held down for the given chord.
pub fn should_assert(state: ButtonState, key: ModifierKey) -> bool {
    let ButtonState {
        left,
        middle,
        right,
        ..
    } = state;

    match key {
        ModifierKey::Control => left && !middle,
        ModifierKey::Shift => !middle && right,
        ModifierKey::Level3 => !left && middle && right,
        ModifierKey::Level5 => left && middle && !right,
    }
}
