//! Edge-triggered modifier output
//!
//! Every button state change is compared against the previous state, and only
//! modifiers whose condition flipped produce an event. Events go straight to
//! the [`KeySink`] in evaluation order; nothing is buffered.

use anyhow::Result;

use crate::chord::{should_assert, ButtonState, ModifierKey};

/// Receives synthetic modifier key events.
pub trait KeySink {
    fn press(&mut self, key: ModifierKey) -> Result<()>;
    fn release(&mut self, key: ModifierKey) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Press,
    Release,
}

impl Direction {
    /// The edge between two evaluations of a condition, `None` when unchanged.
    pub fn between(was: bool, is: bool) -> Option<Self> {
        match (was, is) {
            (false, true) => Some(Direction::Press),
            (true, false) => Some(Direction::Release),
            _ => None,
        }
    }
}

/// One modifier transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEdge {
    pub key: ModifierKey,
    pub direction: Direction,
}

/// Modifier transitions between two button states, one per changed key at most.
pub fn diff(old: ButtonState, new: ButtonState) -> impl Iterator<Item = KeyEdge> {
    ModifierKey::ALL.into_iter().filter_map(move |key| {
        Direction::between(should_assert(old, key), should_assert(new, key))
            .map(|direction| KeyEdge { key, direction })
    })
}

/// Forward the transitions between `old` and `new` to `sink`.
///
/// A failing sink call is logged and does not stop the remaining keys from
/// being sent. Returns the number of edges emitted.
pub fn apply_diff<K: KeySink>(old: ButtonState, new: ButtonState, sink: &mut K) -> usize {
    let mut emitted = 0;

    for edge in diff(old, new) {
        let result = match edge.direction {
            Direction::Press => sink.press(edge.key),
            Direction::Release => sink.release(edge.key),
        };

        tracing::debug!("{:?} {} ({} -> {})", edge.direction, edge.key, old, new);

        if let Err(e) = result {
            tracing::warn!("Failed to send {:?} for {}: {:#}", edge.direction, edge.key, e);
        }
        emitted += 1;
    }

    emitted
}
