mod activation;
mod candidates;
mod config;
mod daemon;
mod event_filter;
mod grab;
mod ipc;
mod keyboard_monitor;
mod session;
mod socket_client;
mod socket_server;
mod sway_client;
mod timers;
mod ui;
mod ui_commands;
mod ui_handler;
mod window;
mod window_manager;
mod window_switcher;

use activation::SwayActivator;
use anyhow::{Context, Result};
use config::{Command, Config};
use daemon::{Daemon, DaemonEvent};
use grab::SurfaceGrab;
use gtk4::prelude::*;
use ipc::IpcCommand;
use keyboard_monitor::{KeyboardMonitor, SharedKeyboard};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use timers::Timings;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use ui::SwitcherWindow;
use ui_commands::{ChannelPresenter, UiCommand};
use window::Clock;
use window_manager::WindowManager;

/// Get the path to the pidfile
fn get_pidfile_path() -> Result<PathBuf> {
    // Try to use XDG_RUNTIME_DIR, fall back to ~/.cache
    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine runtime directory")?;

    Ok(runtime_dir.join("netbook-alttab.pid"))
}

/// Check if another instance is already running
fn check_pidfile() -> Result<()> {
    let pidfile = get_pidfile_path()?;

    if pidfile.exists() {
        let pid_str = fs::read_to_string(&pidfile).context("Failed to read pidfile")?;
        let pid: u32 = pid_str.trim().parse().context("Invalid PID in pidfile")?;

        if process_exists(pid) {
            anyhow::bail!(
                "Another instance of netbook-alttab is already running (PID: {}). \
                 If this is incorrect, remove the pidfile at: {}",
                pid,
                pidfile.display()
            );
        } else {
            info!("Removing stale pidfile (PID {} not found)", pid);
            if let Err(e) = fs::remove_file(&pidfile) {
                warn!("Failed to remove stale pidfile: {}", e);
            }
        }
    }

    Ok(())
}

/// Sway only runs on Linux, so /proc is always there.
fn process_exists(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{}", pid)).exists()
}

/// Create the pidfile
fn create_pidfile() -> Result<PidfileGuard> {
    let pidfile = get_pidfile_path()?;
    let pid = std::process::id();

    fs::write(&pidfile, pid.to_string()).context("Failed to write pidfile")?;

    info!("Created pidfile at {} with PID {}", pidfile.display(), pid);

    Ok(PidfileGuard { path: pidfile })
}

/// Guard that removes the pidfile when dropped
struct PidfileGuard {
    path: PathBuf,
}

impl Drop for PidfileGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            error!("Failed to remove pidfile: {}", e);
        } else {
            info!("Removed pidfile at {}", self.path.display());
        }
    }
}

fn main() -> Result<()> {
    let config = Config::parse();

    let log_level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let client_command = match config.command() {
        Command::Daemon => None,
        Command::Next => Some(IpcCommand::Next),
        Command::Prev => Some(IpcCommand::Prev),
        Command::Select => Some(IpcCommand::Select),
        Command::Cancel => Some(IpcCommand::Cancel),
        Command::Status => Some(IpcCommand::Status),
        Command::Shutdown => Some(IpcCommand::Shutdown),
    };
    if let Some(command) = client_command {
        socket_client::send_command_and_exit(command);
    }

    // Reject bad timings before touching any device.
    let timings = config.timings()?;

    info!("Starting netbook-alttab daemon ({:?})", config.presentation);

    check_pidfile()?;
    let _pidfile_guard = create_pidfile()?;

    keyboard_monitor::check_permissions(config.device.as_deref())?;

    gtk4::init()?;

    let app = gtk4::Application::builder()
        .application_id("io.github.netbook_alttab")
        .build();

    app.connect_activate(move |app| {
        ui::setup_css();

        // One ordered channel for everything the session reacts to.
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (ui_cmd_tx, ui_cmd_rx) = mpsc::unbounded_channel();

        let pointer_tx = event_tx.clone();
        let on_pointer: ui::PointerSink = Rc::new(move |event| {
            if pointer_tx.send(DaemonEvent::from(event)).is_err() {
                warn!("Daemon gone, dropping pointer event");
            }
        });

        let switcher = Rc::new(RefCell::new(SwitcherWindow::new(
            app,
            config.presentation,
            on_pointer,
        )));
        ui_handler::handle_ui_commands(app.clone(), switcher, ui_cmd_rx);

        let config_clone = config.clone();
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to create Tokio runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async move {
                match run_daemon(config_clone, timings, event_tx, event_rx, ui_cmd_tx).await {
                    Ok(()) => info!("Daemon exited normally"),
                    Err(e) => error!("Daemon error: {:#}", e),
                }
            });
        });
    });

    // Our own flags are not GTK's business.
    app.run_with_args::<&str>(&[]);

    Ok(())
}

/// Wire the input sources to the daemon and run it until shutdown.
async fn run_daemon(
    config: Config,
    timings: Timings,
    event_tx: mpsc::UnboundedSender<DaemonEvent>,
    event_rx: mpsc::UnboundedReceiver<DaemonEvent>,
    ui_cmd_tx: mpsc::UnboundedSender<UiCommand>,
) -> Result<()> {
    let clock = Clock::new();
    let keyboard = SharedKeyboard::open(config.device.as_deref())?;
    info!("Reading keyboard from {}", keyboard.path().display());

    // Dedicated blocking thread for evdev reads
    let monitor = KeyboardMonitor::new(keyboard.clone(), clock);
    let input_tx = event_tx.clone();
    std::thread::spawn(move || {
        if let Err(e) = monitor.monitor_blocking(input_tx.clone()) {
            error!("Keyboard monitor error: {}", e);
            let _ = input_tx.send(DaemonEvent::GrabLost);
        }
    });

    let window_tx = event_tx.clone();
    let sway_events = tokio::spawn(async move {
        if let Err(e) = window_manager::watch_window_events(window_tx).await {
            error!("Sway event monitoring error: {}", e);
        }
    });

    let _socket_guard = socket_server::start_server(event_tx.clone()).await?;

    let directory = WindowManager::new(Some(keyboard.clone()), clock)?;
    let grabs = SurfaceGrab::new(ui_cmd_tx.clone(), !config.no_grab);
    let presenter = ChannelPresenter::new(ui_cmd_tx);
    let activator = SwayActivator::new()?;

    let daemon = Daemon::new(timings, directory, grabs, presenter, activator, event_tx);
    daemon.run(event_rx).await;

    sway_events.abort();
    Ok(())
}
