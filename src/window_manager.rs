use anyhow::Result;
use futures_lite::stream::StreamExt;
use std::collections::{HashMap, HashSet};
use swayipc::{Node, NodeType};
use swayipc_async::{Connection, Event, EventType, WindowChange};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::keyboard_monitor::SharedKeyboard;
use crate::session::WindowDirectory;
use crate::sway_client::{RealSwayClient, SwayClient};
use crate::window::{ChordMask, Clock, Timestamp, WindowHandle, WindowId, WindowKind};

/// Sway's hidden scratchpad workspace.
const SCRATCHPAD: &str = "__i3_scratch";

/// Window lifecycle notifications from sway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryEvent {
    Focused(WindowId),
    Closed(WindowId),
}

/// Per-window last-interaction stamps.
///
/// Stamps are strictly increasing across the whole table so two focus
/// changes inside the same millisecond still order correctly.
#[derive(Debug, Default)]
pub struct UserTimes {
    times: HashMap<WindowId, Timestamp>,
    latest: Timestamp,
}

impl UserTimes {
    pub fn stamp(&mut self, id: WindowId, now: Timestamp) -> Timestamp {
        let stamp = if self.times.is_empty() && self.latest == Timestamp::default() {
            now
        } else {
            now.max(Timestamp(self.latest.0 + 1))
        };
        self.latest = stamp;
        self.times.insert(id, stamp);
        stamp
    }

    /// Windows never focused since the daemon started sort last.
    pub fn get(&self, id: WindowId) -> Timestamp {
        self.times.get(&id).copied().unwrap_or_default()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.times.contains_key(&id)
    }

    pub fn forget(&mut self, id: WindowId) {
        self.times.remove(&id);
    }

    /// Drop stamps of windows that are no longer mapped.
    pub fn retain_present(&mut self, present: &HashSet<WindowId>) {
        self.times.retain(|id, _| present.contains(id));
    }
}

/// Window directory backed by the Sway tree plus focus events.
pub struct WindowManager<C: SwayClient = RealSwayClient> {
    client: C,
    keyboard: Option<SharedKeyboard>,
    clock: Clock,
    user_times: UserTimes,
    subscribed: HashSet<WindowId>,
}

impl WindowManager<RealSwayClient> {
    /// Create a new WindowManager with a real Sway connection
    pub fn new(keyboard: Option<SharedKeyboard>, clock: Clock) -> Result<Self> {
        let client = RealSwayClient::new()?;
        Ok(Self::with_client(client, keyboard, clock))
    }
}

impl<C: SwayClient> WindowManager<C> {
    pub fn with_client(client: C, keyboard: Option<SharedKeyboard>, clock: Clock) -> Self {
        WindowManager {
            client,
            keyboard,
            clock,
            user_times: UserTimes::default(),
            subscribed: HashSet::new(),
        }
    }

    /// Stamp a window as most recently used.
    pub fn on_focus(&mut self, window_id: WindowId) {
        let stamp = self.user_times.stamp(window_id, self.clock.now());
        debug!("Window {} focused at {:?}", window_id, stamp);
    }

    /// Forget a closed window. Returns true if a session asked to hear
    /// about it.
    pub fn on_closed(&mut self, window_id: WindowId) -> bool {
        self.user_times.forget(window_id);
        self.subscribed.remove(&window_id)
    }
}

impl<C: SwayClient> WindowDirectory for WindowManager<C> {
    fn list_windows(&mut self) -> Result<Vec<WindowHandle>> {
        let tree = self.client.get_tree()?;

        // Seed the focused window if no focus event has named it yet
        // (e.g. right after start-up).
        if let Some(focused) = find_focused_window(&tree)
            && !self.user_times.contains(focused)
        {
            self.on_focus(focused);
        }

        let windows = collect_windows(&tree, None, &self.user_times);
        let present: HashSet<WindowId> = windows.iter().map(|w| w.id).collect();
        self.user_times.retain_present(&present);

        debug!("Directory lists {} windows", windows.len());
        Ok(windows)
    }

    fn subscribe_destroyed(&mut self, id: WindowId) {
        self.subscribed.insert(id);
    }

    fn clear_subscriptions(&mut self) {
        self.subscribed.clear();
    }

    fn current_modifier_state(&self, mask: ChordMask) -> bool {
        self.keyboard
            .as_ref()
            .is_some_and(|keyboard| keyboard.held_keys().contains(mask))
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

/// Only actual windows (views) qualify; containers have no pid.
#[must_use]
fn handle_from_node(
    node: &Node,
    workspace: Option<i32>,
    last_user_time: Timestamp,
) -> Option<WindowHandle> {
    if !matches!(node.node_type, NodeType::Con | NodeType::FloatingCon) || node.pid.is_none() {
        return None;
    }

    let props = node.window_properties.as_ref();
    let kind = WindowKind::from_window_type(props.and_then(|p| p.window_type.as_deref()));
    let transient_for = props.and_then(|p| p.transient_for);

    Some(WindowHandle {
        id: node.id,
        kind,
        override_redirect: kind == WindowKind::OverrideRedirect,
        is_sticky: node.sticky,
        is_root_transient: kind == WindowKind::Dialog && transient_for.is_none(),
        workspace: if node.sticky { None } else { workspace },
        last_user_time,
        title: node.name.clone().unwrap_or_default(),
        app_id: node
            .app_id
            .clone()
            .or_else(|| props.and_then(|p| p.class.clone())),
    })
}

/// Recursively collect all windows from a Sway node tree, in tree order.
#[must_use]
fn collect_windows(node: &Node, workspace: Option<i32>, times: &UserTimes) -> Vec<WindowHandle> {
    if node.node_type == NodeType::Workspace && node.name.as_deref() == Some(SCRATCHPAD) {
        return Vec::new();
    }

    // Named workspaces report num -1; they cannot be addressed by number.
    let workspace = if node.node_type == NodeType::Workspace {
        node.num.filter(|num| *num >= 0)
    } else {
        workspace
    };

    let mut windows = Vec::new();
    if let Some(window) = handle_from_node(node, workspace, times.get(node.id)) {
        windows.push(window);
    }

    for child in node.nodes.iter().chain(&node.floating_nodes) {
        windows.extend(collect_windows(child, workspace, times));
    }

    windows
}

/// Find the currently focused window in a Sway node tree.
#[must_use]
fn find_focused_window(node: &Node) -> Option<WindowId> {
    if matches!(node.node_type, NodeType::Con | NodeType::FloatingCon)
        && node.focused
        && node.pid.is_some()
    {
        return Some(node.id);
    }

    node.nodes
        .iter()
        .chain(&node.floating_nodes)
        .find_map(find_focused_window)
}

/// Forward sway focus/close events through the channel.
pub async fn watch_window_events<E>(tx: mpsc::UnboundedSender<E>) -> Result<()>
where
    E: From<DirectoryEvent>,
{
    let subs = [EventType::Window];
    let mut events = Connection::new().await?.subscribe(subs).await?;

    info!("Subscribed to Sway window events");

    while let Some(event) = events.next().await {
        if let Event::Window(e) = event? {
            let forwarded = match e.change {
                WindowChange::Focus => Some(DirectoryEvent::Focused(e.container.id)),
                WindowChange::Close => Some(DirectoryEvent::Closed(e.container.id)),
                _ => None,
            };

            if let Some(forwarded) = forwarded {
                debug!("Sway window event: {:?}", forwarded);
                if tx.send(E::from(forwarded)).is_err() {
                    error!("Daemon gone, stopping window event watch");
                    break;
                }
            }
        }
    }

    Ok(())
}
