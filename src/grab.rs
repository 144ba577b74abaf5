//! Exclusive keyboard grab for the lifetime of an interactive session.
//!
//! The grab is taken in the compositor: the switcher's layer-shell surface
//! switches to exclusive keyboard interactivity, so focused clients stop
//! receiving keys while sway itself keeps tracking every press and release.
//! The daemon still reads the keyboard passively through evdev. Sway drops
//! the surface with the process, so a crash cannot leave input captured.
//!
//! Chord presses that arrive before the surface maps are kept away from
//! clients by a `nop` binding in the sway config (see README).

use crate::ui_commands::UiCommand;
use crate::window::{ChordMask, Timestamp};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("a keyboard grab is already held")]
    AlreadyHeld,
    #[error("grab timestamp {requested:?} is older than the last release at {last_release:?}")]
    StaleTimestamp {
        requested: Timestamp,
        last_release: Timestamp,
    },
    #[error("keyboard grab denied: {0}")]
    Denied(String),
}

/// Proof of an outstanding grab. Not `Clone`: exactly one owner.
#[derive(Debug, PartialEq, Eq)]
pub struct GrabHandle {
    serial: u64,
    mask: ChordMask,
    acquired_at: Timestamp,
}

impl GrabHandle {
    pub fn mask(&self) -> ChordMask {
        self.mask
    }

    pub fn acquired_at(&self) -> Timestamp {
        self.acquired_at
    }
}

pub trait GrabManager {
    /// Take the grab. `timestamp` must be fresh (no older than the last
    /// release), otherwise the request is denied as stale.
    fn acquire(&mut self, mask: ChordMask, timestamp: Timestamp)
    -> Result<GrabHandle, AcquireError>;

    /// Give the grab back. Releasing a handle that is no longer current is a
    /// no-op.
    fn release(&mut self, handle: GrabHandle, timestamp: Timestamp);

    fn is_held(&self) -> bool;
}

/// Bookkeeping shared by every grab backend: serial numbers, the stale
/// timestamp rule and idempotent release.
#[derive(Debug, Default)]
struct GrabLedger {
    next_serial: u64,
    held: Option<u64>,
    last_release: Timestamp,
}

impl GrabLedger {
    fn check(&self, timestamp: Timestamp) -> Result<(), AcquireError> {
        if self.held.is_some() {
            return Err(AcquireError::AlreadyHeld);
        }
        if timestamp < self.last_release {
            return Err(AcquireError::StaleTimestamp {
                requested: timestamp,
                last_release: self.last_release,
            });
        }
        Ok(())
    }

    fn issue(&mut self, mask: ChordMask, timestamp: Timestamp) -> GrabHandle {
        self.next_serial += 1;
        self.held = Some(self.next_serial);
        GrabHandle {
            serial: self.next_serial,
            mask,
            acquired_at: timestamp,
        }
    }

    /// True if `handle` was the live grab and is now released.
    fn retire(&mut self, handle: &GrabHandle, timestamp: Timestamp) -> bool {
        if self.held != Some(handle.serial) {
            return false;
        }
        self.held = None;
        self.last_release = self.last_release.max(timestamp);
        true
    }
}

/// Grab backed by the switcher surface on the GTK thread.
pub struct SurfaceGrab {
    tx: mpsc::UnboundedSender<UiCommand>,
    exclusive: bool,
    ledger: GrabLedger,
}

impl SurfaceGrab {
    /// With `exclusive` false the grab is tracked but the surface never
    /// takes the keyboard, so clients keep seeing keys (debugging aid).
    pub fn new(tx: mpsc::UnboundedSender<UiCommand>, exclusive: bool) -> Self {
        SurfaceGrab {
            tx,
            exclusive,
            ledger: GrabLedger::default(),
        }
    }
}

impl GrabManager for SurfaceGrab {
    fn acquire(
        &mut self,
        mask: ChordMask,
        timestamp: Timestamp,
    ) -> Result<GrabHandle, AcquireError> {
        self.ledger.check(timestamp)?;

        if self.exclusive {
            self.tx
                .send(UiCommand::SetKeyboardGrab { exclusive: true })
                .map_err(|_| AcquireError::Denied("UI thread has gone away".to_string()))?;
        }

        let handle = self.ledger.issue(mask, timestamp);
        debug!("Keyboard grab #{} acquired at {:?}", handle.serial, timestamp);
        Ok(handle)
    }

    fn release(&mut self, handle: GrabHandle, timestamp: Timestamp) {
        if !self.ledger.retire(&handle, timestamp) {
            debug!("Ignoring release of stale grab #{}", handle.serial);
            return;
        }

        // A closed channel means the surface is gone, which ends the grab anyway.
        if self.exclusive {
            let _ = self.tx.send(UiCommand::SetKeyboardGrab { exclusive: false });
        }
        debug!(
            "Keyboard grab #{} ({:?}) released at {:?}, held since {:?}",
            handle.serial,
            handle.mask(),
            timestamp,
            handle.acquired_at()
        );
    }

    fn is_held(&self) -> bool {
        self.ledger.held.is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory grab manager for session tests.
    #[derive(Debug, Default)]
    pub(crate) struct FakeGrabs {
        ledger: GrabLedger,
        pub deny: bool,
        pub acquired: usize,
        pub released: usize,
    }

    impl GrabManager for FakeGrabs {
        fn acquire(
            &mut self,
            mask: ChordMask,
            timestamp: Timestamp,
        ) -> Result<GrabHandle, AcquireError> {
            self.ledger.check(timestamp)?;
            if self.deny {
                return Err(AcquireError::Denied("denied by test".to_string()));
            }
            self.acquired += 1;
            Ok(self.ledger.issue(mask, timestamp))
        }

        fn release(&mut self, handle: GrabHandle, timestamp: Timestamp) {
            if self.ledger.retire(&handle, timestamp) {
                self.released += 1;
            }
        }

        fn is_held(&self) -> bool {
            self.ledger.held.is_some()
        }
    }

    #[test]
    fn test_second_acquire_is_refused() {
        let mut grabs = FakeGrabs::default();
        let _first = grabs.acquire(ChordMask::MODIFIER, Timestamp(5)).unwrap();
        assert_eq!(
            grabs.acquire(ChordMask::MODIFIER, Timestamp(6)),
            Err(AcquireError::AlreadyHeld)
        );
    }

    #[test]
    fn test_stale_timestamp_is_refused() {
        let mut grabs = FakeGrabs::default();
        let handle = grabs.acquire(ChordMask::MODIFIER, Timestamp(5)).unwrap();
        grabs.release(handle, Timestamp(20));

        assert_eq!(
            grabs.acquire(ChordMask::MODIFIER, Timestamp(10)),
            Err(AcquireError::StaleTimestamp {
                requested: Timestamp(10),
                last_release: Timestamp(20),
            })
        );
        assert!(grabs.acquire(ChordMask::MODIFIER, Timestamp(20)).is_ok());
    }

    #[test]
    fn test_release_of_old_handle_is_noop() {
        let mut grabs = FakeGrabs::default();
        let first = grabs.acquire(ChordMask::MODIFIER, Timestamp(1)).unwrap();
        let first_serial = first.serial;
        grabs.release(first, Timestamp(2));

        let second = grabs.acquire(ChordMask::MODIFIER, Timestamp(3)).unwrap();
        assert_ne!(second.serial, first_serial);

        // A forged handle carrying the old serial must not end the new grab.
        let stale = GrabHandle {
            serial: first_serial,
            mask: ChordMask::MODIFIER,
            acquired_at: Timestamp(1),
        };
        grabs.release(stale, Timestamp(4));
        assert!(grabs.is_held());
        assert_eq!(grabs.released, 1);

        grabs.release(second, Timestamp(5));
        assert!(!grabs.is_held());
        assert_eq!(grabs.released, 2);
    }

    #[test]
    fn test_surface_grab_toggles_exclusive_keyboard() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut grabs = SurfaceGrab::new(tx, true);

        let handle = grabs.acquire(ChordMask::MODIFIER, Timestamp(1)).unwrap();
        assert!(grabs.is_held());
        assert!(matches!(
            rx.try_recv().unwrap(),
            UiCommand::SetKeyboardGrab { exclusive: true }
        ));

        grabs.release(handle, Timestamp(2));
        assert!(!grabs.is_held());
        assert!(matches!(
            rx.try_recv().unwrap(),
            UiCommand::SetKeyboardGrab { exclusive: false }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_surface_grab_without_exclusive_sends_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut grabs = SurfaceGrab::new(tx, false);

        let handle = grabs.acquire(ChordMask::MODIFIER, Timestamp(1)).unwrap();
        assert!(grabs.is_held());
        grabs.release(handle, Timestamp(2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_surface_grab_denied_without_ui() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut grabs = SurfaceGrab::new(tx, true);

        assert!(matches!(
            grabs.acquire(ChordMask::MODIFIER, Timestamp(1)),
            Err(AcquireError::Denied(_))
        ));
        assert!(!grabs.is_held());
    }

    #[test]
    fn test_handle_reports_mask_and_time() {
        let mut grabs = FakeGrabs::default();
        let handle = grabs
            .acquire(ChordMask::MODIFIER | ChordMask::REVERSE, Timestamp(42))
            .unwrap();
        assert_eq!(handle.mask(), ChordMask::MODIFIER | ChordMask::REVERSE);
        assert_eq!(handle.acquired_at(), Timestamp(42));
    }
}
