//! Candidate list builder: which windows Alt+Tab can cycle through, and in
//! what order.

use crate::window::WindowHandle;

/// An interactive session needs something to switch *to*.
pub const MIN_CANDIDATES: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum BuildResult {
    /// At least [`MIN_CANDIDATES`] windows, most recently used first.
    Ready(Vec<WindowHandle>),
    /// Fewer than [`MIN_CANDIDATES`] eligible windows.
    Insufficient { eligible: usize },
}

impl BuildResult {
    pub fn into_ready(self) -> Option<Vec<WindowHandle>> {
        match self {
            BuildResult::Ready(windows) => Some(windows),
            BuildResult::Insufficient { .. } => None,
        }
    }
}

/// Normal toplevels and root-transient dialogs; never docks, desktops,
/// override-redirect or sticky windows.
pub fn is_eligible(window: &WindowHandle) -> bool {
    use crate::window::WindowKind;

    if window.is_sticky || window.override_redirect {
        return false;
    }
    match window.kind {
        WindowKind::Normal => true,
        WindowKind::Dialog => window.is_root_transient,
        _ => false,
    }
}

/// Filter and MRU-sort the directory's windows.
///
/// The sort is stable, so windows with equal user times keep the order the
/// directory enumerated them in.
#[must_use]
pub fn build(windows: Vec<WindowHandle>) -> BuildResult {
    let mut eligible: Vec<WindowHandle> = windows.into_iter().filter(is_eligible).collect();

    if eligible.len() < MIN_CANDIDATES {
        return BuildResult::Insufficient {
            eligible: eligible.len(),
        };
    }

    eligible.sort_by(|a, b| b.last_user_time.cmp(&a.last_user_time));
    BuildResult::Ready(eligible)
}
