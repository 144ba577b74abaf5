//! Window identity and the attributes the switcher cares about.

use bitflags::bitflags;
use serde::Serialize;
use std::time::Instant;

/// Sway container id.
pub type WindowId = i64;

/// Milliseconds on the shell's monotonic clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp(pub u64);

/// Monotonic clock shared by the input thread and the window directory, so
/// that key-event stamps and "now" are directly comparable.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Clock {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed().as_millis() as u64)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Normal,
    Dialog,
    Dock,
    Desktop,
    OverrideRedirect,
    Other,
}

impl WindowKind {
    /// Map the `_NET_WM_WINDOW_TYPE` name sway reports for XWayland windows.
    /// Native Wayland toplevels carry no type and count as normal windows.
    pub fn from_window_type(window_type: Option<&str>) -> Self {
        match window_type.map(str::to_ascii_lowercase).as_deref() {
            None | Some("normal") | Some("unknown") => WindowKind::Normal,
            Some("dialog") => WindowKind::Dialog,
            Some("dock") => WindowKind::Dock,
            Some("desktop") => WindowKind::Desktop,
            Some("tooltip" | "popup_menu" | "dropdown_menu" | "notification" | "combo" | "dnd") => {
                WindowKind::OverrideRedirect
            }
            Some(_) => WindowKind::Other,
        }
    }
}

/// A window as seen by the switcher. The directory owns the real window;
/// this is a snapshot plus the id used for equality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowHandle {
    pub id: WindowId,
    pub kind: WindowKind,
    pub override_redirect: bool,
    pub is_sticky: bool,
    /// A dialog whose transient-for chain ends at itself.
    pub is_root_transient: bool,
    /// Workspace number; `None` for sticky windows.
    pub workspace: Option<i32>,
    pub last_user_time: Timestamp,
    pub title: String,
    pub app_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    /// Shift held means backward.
    pub fn from_reverse_held(reverse: bool) -> Self {
        if reverse {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }

    /// One cyclic step from `index` in a list of `len` entries.
    pub fn step(self, index: usize, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        match self {
            Direction::Forward => (index + 1) % len,
            Direction::Backward => (index + len - 1) % len,
        }
    }
}

bitflags! {
    /// Keys that make up the switcher chord.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChordMask: u8 {
        /// Alt
        const MODIFIER = 1 << 0;
        /// Tab
        const TRIGGER = 1 << 1;
        /// Shift
        const REVERSE = 1 << 2;
    }
}

impl Default for ChordMask {
    fn default() -> Self {
        ChordMask::empty()
    }
}
