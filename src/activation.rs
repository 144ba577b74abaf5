//! Focus transfer for the window the user picked.

use crate::session::ActivationRequestor;
use crate::sway_client::{RealSwayClient, SwayClient};
use crate::window::{Timestamp, WindowHandle};
use anyhow::Result;
use tracing::debug;

/// Sway commands that bring `window` to the front, switching workspace first
/// when it lives somewhere other than `active_workspace`.
#[must_use]
pub fn activation_commands(window: &WindowHandle, active_workspace: Option<i32>) -> Vec<String> {
    let mut commands = Vec::with_capacity(2);

    if let (Some(target), Some(active)) = (window.workspace, active_workspace)
        && target >= 0
        && target != active
    {
        commands.push(format!("workspace number {}", target));
    }
    commands.push(format!("[con_id={}] focus", window.id));

    commands
}

pub struct SwayActivator<C: SwayClient = RealSwayClient> {
    client: C,
}

impl SwayActivator<RealSwayClient> {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(RealSwayClient::new()?))
    }
}

impl<C: SwayClient> SwayActivator<C> {
    pub fn with_client(client: C) -> Self {
        SwayActivator { client }
    }
}

impl<C: SwayClient> ActivationRequestor for SwayActivator<C> {
    fn activate(&mut self, window: &WindowHandle, timestamp: Timestamp) -> Result<()> {
        // Unknown active workspace: focusing the container alone lets sway
        // switch workspace for us.
        let active = self.client.focused_workspace().unwrap_or(None);

        for command in activation_commands(window, active) {
            debug!("Activation at {:?}: {}", timestamp, command);
            self.client.run_command(&command)?;
        }
        Ok(())
    }
}
