//! Candidate list and selection cursor for one Alt+Tab session.

use crate::window::{Direction, WindowHandle, WindowId};

/// What happened when a destroyed window was pruned from the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The window was not a candidate.
    NotPresent,
    /// Removed; `cursor` is the clamped selection.
    Removed { cursor: usize },
    /// That was the last candidate.
    Emptied,
}

/// Manages the candidate list and current selection during an Alt+Tab session.
///
/// Created when the session turns interactive and dropped when it ends.
#[derive(Debug, Clone)]
pub struct WindowSwitcher {
    windows: Vec<WindowHandle>,
    current_index: usize,
}

impl WindowSwitcher {
    /// Create a switcher over an MRU-ordered list.
    ///
    /// If `start_at_next` is true and there are multiple windows, the initial
    /// selection is the second window (index 1): index 0 is the focused
    /// window, so the useful default is the previous one.
    pub fn new(windows: Vec<WindowHandle>, start_at_next: bool) -> Self {
        let current_index = if start_at_next && windows.len() > 1 {
            1
        } else {
            0
        };

        WindowSwitcher {
            windows,
            current_index,
        }
    }

    pub fn windows(&self) -> &[WindowHandle] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current(&self) -> Option<&WindowHandle> {
        self.windows.get(self.current_index)
    }

    /// Move the selection one step with wraparound. Returns the new index.
    pub fn cycle(&mut self, direction: Direction) -> usize {
        self.current_index = direction.step(self.current_index, self.windows.len());
        self.current_index
    }

    /// Jump straight to `index`. Out-of-range indices are refused.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.windows.len() {
            self.current_index = index;
            true
        } else {
            false
        }
    }

    /// Drop a window that no longer exists.
    ///
    /// The selection stays on the same window when an earlier entry goes
    /// away; when the selected window itself goes, the selection lands on
    /// its successor (or the new last entry).
    pub fn remove(&mut self, id: WindowId) -> Removal {
        let Some(pos) = self.windows.iter().position(|w| w.id == id) else {
            return Removal::NotPresent;
        };

        self.windows.remove(pos);

        if self.is_empty() {
            self.current_index = 0;
            return Removal::Emptied;
        }

        if pos < self.current_index {
            self.current_index -= 1;
        }
        self.current_index = self.current_index.min(self.windows.len() - 1);

        Removal::Removed {
            cursor: self.current_index,
        }
    }

    /// Consume the switcher and return the selected window.
    pub fn finalize(mut self) -> Option<WindowHandle> {
        if self.current_index < self.windows.len() {
            Some(self.windows.swap_remove(self.current_index))
        } else {
            None
        }
    }
}
