//! Decides what happens to raw input while the switcher owns the keyboard.

use crate::keyboard_monitor::{ChordKey, InputEvent};
use crate::window::Timestamp;

/// Session inputs that keys produce while the grab is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    /// Modifier released: commit.
    EndChord(Timestamp),
    /// Trigger pressed again: advance, direction from the live Shift state.
    Advance(Timestamp),
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No grab: the event belongs to whoever would normally get it.
    PassThrough,
    /// Swallowed; nothing else sees it.
    Consumed,
    /// Swallowed and handed to the session.
    Forward(SessionInput),
}

impl Verdict {
    pub fn is_consumed(&self) -> bool {
        !matches!(self, Verdict::PassThrough)
    }
}

/// Stateless: cheap enough to run on every event without touching the
/// candidate list.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventFilter;

impl EventFilter {
    pub fn handle(&self, grab_active: bool, event: &InputEvent) -> Verdict {
        if !grab_active {
            return Verdict::PassThrough;
        }

        match *event {
            InputEvent::Key {
                key: ChordKey::Modifier,
                pressed: false,
                time,
            } => Verdict::Forward(SessionInput::EndChord(time)),
            InputEvent::Key {
                key: ChordKey::Trigger,
                pressed: true,
                time,
            } => Verdict::Forward(SessionInput::Advance(time)),
            InputEvent::Key {
                key: ChordKey::Escape,
                pressed: true,
                ..
            } => Verdict::Forward(SessionInput::Cancel),
            InputEvent::Key { .. } | InputEvent::Button { .. } | InputEvent::Motion { .. } => {
                Verdict::Consumed
            }
        }
    }
}
