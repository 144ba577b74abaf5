use crate::window::{ChordMask, Clock, Timestamp};
use anyhow::{Context, Result};
use evdev::{Device, InputEventKind, Key};
use std::fmt;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Keys the switcher distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordKey {
    Modifier,
    Trigger,
    Reverse,
    Escape,
    Other,
}

impl ChordKey {
    fn from_evdev(key: Key) -> Self {
        match key {
            Key::KEY_LEFTALT | Key::KEY_RIGHTALT => ChordKey::Modifier,
            Key::KEY_TAB => ChordKey::Trigger,
            Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT => ChordKey::Reverse,
            Key::KEY_ESC => ChordKey::Escape,
            _ => ChordKey::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key {
        key: ChordKey,
        pressed: bool,
        time: Timestamp,
    },
    Button {
        time: Timestamp,
    },
    Motion {
        time: Timestamp,
    },
}

impl InputEvent {
    pub fn time(&self) -> Timestamp {
        match *self {
            InputEvent::Key { time, .. }
            | InputEvent::Button { time }
            | InputEvent::Motion { time } => time,
        }
    }
}

/// The keyboard device, shared between the reader thread and live key-state
/// polls. It is only ever read, never grabbed.
#[derive(Clone)]
pub struct SharedKeyboard {
    device: Arc<Mutex<Device>>,
    path: PathBuf,
}

impl fmt::Debug for SharedKeyboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeyboard")
            .field("path", &self.path)
            .finish()
    }
}

impl SharedKeyboard {
    /// Open `path`, or the first device that can type Alt, Shift and Tab.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let (path, device) = match path {
            Some(path) => {
                let device = Device::open(path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                (path.to_path_buf(), device)
            }
            None => find_keyboard_device().context("Failed to find keyboard device")?,
        };

        set_nonblocking(&device)?;
        info!(
            "Using keyboard device {:?} at {}",
            device.name().unwrap_or("<unnamed>"),
            path.display()
        );

        Ok(SharedKeyboard {
            device: Arc::new(Mutex::new(device)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn with_device<R>(&self, f: impl FnOnce(&mut Device) -> R) -> R {
        let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut device)
    }

    /// Which chord keys are physically down right now, queried from the
    /// kernel rather than derived from events already seen.
    pub fn held_keys(&self) -> ChordMask {
        let state = match self.with_device(|device| device.get_key_state()) {
            Ok(state) => state,
            Err(e) => {
                debug!("Key state query failed, treating chord as released: {}", e);
                return ChordMask::empty();
            }
        };

        let mut held = ChordMask::empty();
        if state.contains(Key::KEY_LEFTALT) || state.contains(Key::KEY_RIGHTALT) {
            held |= ChordMask::MODIFIER;
        }
        if state.contains(Key::KEY_TAB) {
            held |= ChordMask::TRIGGER;
        }
        if state.contains(Key::KEY_LEFTSHIFT) || state.contains(Key::KEY_RIGHTSHIFT) {
            held |= ChordMask::REVERSE;
        }
        held
    }
}

pub struct KeyboardMonitor {
    keyboard: SharedKeyboard,
    clock: Clock,
}

impl KeyboardMonitor {
    pub fn new(keyboard: SharedKeyboard, clock: Clock) -> Self {
        KeyboardMonitor { keyboard, clock }
    }

    /// Read events and forward them through the channel.
    /// This runs in a blocking thread; the device is non-blocking so the
    /// lock is never held while idle.
    pub fn monitor_blocking<E>(self, tx: mpsc::UnboundedSender<E>) -> Result<()>
    where
        E: From<InputEvent>,
    {
        info!("Starting keyboard monitoring");

        loop {
            let batch = self.keyboard.with_device(|device| {
                device.fetch_events().map(|events| {
                    events
                        .filter_map(|event| self.translate(event))
                        .collect::<Vec<_>>()
                })
            });

            match batch {
                Ok(events) => {
                    for event in events {
                        if tx.send(E::from(event)).is_err() {
                            warn!("Failed to send input event, receiver dropped");
                            return Ok(());
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn translate(&self, event: evdev::InputEvent) -> Option<InputEvent> {
        let time = self.clock.now();
        match event.kind() {
            InputEventKind::Key(Key::BTN_LEFT | Key::BTN_RIGHT | Key::BTN_MIDDLE) => {
                Some(InputEvent::Button { time })
            }
            // 2 is autorepeat; the switcher does its own repeating.
            InputEventKind::Key(key) if event.value() != 2 => Some(InputEvent::Key {
                key: ChordKey::from_evdev(key),
                pressed: event.value() == 1,
                time,
            }),
            InputEventKind::RelAxis(_) => Some(InputEvent::Motion { time }),
            _ => None,
        }
    }
}

/// Find a suitable keyboard device from /dev/input/event*
fn find_keyboard_device() -> Result<(PathBuf, Device)> {
    for (path, device) in evdev::enumerate() {
        if let Some(keys) = device.supported_keys()
            && keys.contains(Key::KEY_LEFTALT)
            && keys.contains(Key::KEY_TAB)
            && keys.contains(Key::KEY_LEFTSHIFT)
        {
            debug!("Found suitable keyboard: {:?}", device.name());
            return Ok((path, device));
        }
    }

    anyhow::bail!(
        "No suitable keyboard device found. Make sure you have permission to read /dev/input/event* devices."
    )
}

fn set_nonblocking(device: &Device) -> Result<()> {
    let fd = device.as_raw_fd();
    // SAFETY: fd is owned by `device`, which outlives both calls.
    let rc = unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            flags
        } else {
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK)
        }
    };
    if rc < 0 {
        return Err(std::io::Error::last_os_error()).context("Failed to make keyboard non-blocking");
    }
    Ok(())
}

/// Check if the current user has permission to read keyboard devices
pub fn check_permissions(path: Option<&Path>) -> Result<()> {
    let probe = match path {
        Some(path) => Device::open(path)
            .map(|_| ())
            .with_context(|| format!("Failed to open {}", path.display())),
        None => find_keyboard_device().map(|_| ()),
    };

    match probe {
        Ok(()) => {
            info!("Keyboard device access OK");
            Ok(())
        }
        Err(e) => {
            eprintln!("ERROR: Cannot access keyboard devices.");
            eprintln!("This daemon needs permission to read /dev/input/event* devices.");
            eprintln!("\nTo fix this, add your user to the 'input' group:");
            eprintln!("  sudo usermod -aG input $USER");
            eprintln!("  (then log out and log back in)");
            Err(e)
        }
    }
}
