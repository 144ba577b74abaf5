use crate::session::Presenter;
use crate::window::WindowHandle;
use anyhow::{Context, Result};
use tokio::sync::mpsc;

/// Commands sent from daemon to UI
#[derive(Debug, Clone)]
pub enum UiCommand {
    /// Show the window switcher with a list of windows
    Show {
        windows: Vec<WindowHandle>,
        highlighted: usize,
    },
    /// Move the highlight to the given index
    /// (daemon owns the authoritative selection state)
    SetHighlighted { index: usize },
    /// Hide the window switcher
    Hide,
    /// Take (or give back) exclusive keyboard interactivity on the surface
    SetKeyboardGrab { exclusive: bool },
}

/// Pointer input on the switcher tiles, sent from UI to daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    /// Hover over tile `i`.
    Select(usize),
    /// Click on tile `i`.
    Activate(usize),
}

/// Presenter that forwards to the GTK thread.
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<UiCommand>,
}

impl ChannelPresenter {
    pub fn new(tx: mpsc::UnboundedSender<UiCommand>) -> Self {
        ChannelPresenter { tx }
    }

    fn send(&self, command: UiCommand) -> Result<()> {
        self.tx.send(command).ok().context("UI thread has gone away")
    }
}

impl Presenter for ChannelPresenter {
    fn show(&mut self, candidates: &[WindowHandle], highlighted: usize) -> Result<()> {
        self.send(UiCommand::Show {
            windows: candidates.to_vec(),
            highlighted,
        })
    }

    fn set_highlighted(&mut self, index: usize) -> Result<()> {
        self.send(UiCommand::SetHighlighted { index })
    }

    fn hide(&mut self) -> Result<()> {
        self.send(UiCommand::Hide)
    }
}
