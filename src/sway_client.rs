//! Sway IPC abstraction for testability.

use anyhow::{Context, Result, bail};
use swayipc::{Connection, Node};

/// Trait for the Sway IPC operations the switcher needs.
pub trait SwayClient {
    /// Get the full window tree from Sway
    fn get_tree(&mut self) -> Result<Node>;

    /// Number of the focused workspace, if it has one
    fn focused_workspace(&mut self) -> Result<Option<i32>>;

    /// Run a sway command, failing if sway rejects it
    fn run_command(&mut self, command: &str) -> Result<()>;
}

/// Real implementation using swayipc
pub struct RealSwayClient {
    connection: Connection,
}

impl RealSwayClient {
    /// Create a new connection to Sway
    pub fn new() -> Result<Self> {
        let connection = Connection::new().context("Failed to connect to sway")?;
        Ok(RealSwayClient { connection })
    }
}

impl SwayClient for RealSwayClient {
    fn get_tree(&mut self) -> Result<Node> {
        Ok(self.connection.get_tree()?)
    }

    fn focused_workspace(&mut self) -> Result<Option<i32>> {
        let workspaces = self.connection.get_workspaces()?;
        Ok(workspaces.iter().find(|w| w.focused).map(|w| w.num))
    }

    fn run_command(&mut self, command: &str) -> Result<()> {
        for outcome in self.connection.run_command(command)? {
            if let Err(e) = outcome {
                bail!("sway rejected `{}`: {}", command, e);
            }
        }
        Ok(())
    }
}
