use crate::timers::{
    DEFAULT_AUTOSCROLL_REPEAT_MS, DEFAULT_AUTOSCROLL_TRIGGER_MS, DEFAULT_DEBOUNCE_MS, Timings,
};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Presentation {
    /// Floating switcher centered on screen
    Overlay,
    /// Strip anchored along the top edge
    Panel,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run as daemon (default if no command specified)
    Daemon,
    /// Press the chord forwards (opens the switcher or advances it)
    Next,
    /// Press the chord backwards
    Prev,
    /// Release the chord: activate the selected window
    Select,
    /// Cancel switching without selecting
    Cancel,
    /// Query daemon status
    Status,
    /// Shutdown the daemon
    Shutdown,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "netbook-alttab")]
#[command(about = "Most-recently-used Alt+Tab window switcher for Sway", long_about = None)]
pub struct Config {
    /// How long the chord must be held before the switcher appears (ms)
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_MS)]
    pub debounce_ms: u64,

    /// Hold time before the selection starts advancing by itself (ms)
    #[arg(long, default_value_t = DEFAULT_AUTOSCROLL_TRIGGER_MS)]
    pub autoscroll_trigger_ms: u64,

    /// Interval between automatic advances (ms)
    #[arg(long, default_value_t = DEFAULT_AUTOSCROLL_REPEAT_MS)]
    pub autoscroll_repeat_ms: u64,

    /// Switcher placement
    #[arg(short, long, value_enum, default_value = "overlay")]
    pub presentation: Presentation,

    /// Keyboard device to read (default: first device with Alt, Shift and Tab)
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    /// Don't grab the keyboard exclusively while the switcher is open
    #[arg(long)]
    pub no_grab: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Config {
    pub fn parse() -> Self {
        <Config as Parser>::parse()
    }

    /// Get the command, defaulting to Daemon if none specified
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Daemon)
    }

    pub fn timings(&self) -> Result<Timings> {
        Timings::from_millis(
            self.debounce_ms,
            self.autoscroll_trigger_ms,
            self.autoscroll_repeat_ms,
        )
    }
}
