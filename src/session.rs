//! The Alt+Tab session state machine.
//!
//! A session goes `Idle -> Debouncing -> Interactive -> Idle`. A quick tap
//! skips `Interactive`: the next window is activated straight from the
//! release without grabbing the keyboard or showing anything. Every way out
//! of a session (commit, cancel, the candidate list running dry, the grab
//! being revoked) goes through [`Session::teardown`], which stops both
//! timers, releases the grab and hides the UI regardless of which of those
//! were actually live.

use crate::candidates::{self, BuildResult};
use crate::grab::{GrabHandle, GrabManager};
use crate::timers::{TimerKind, TimerScheduler, Timings};
use crate::window::{ChordMask, Direction, Timestamp, WindowHandle, WindowId};
use crate::window_switcher::{Removal, WindowSwitcher};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Read-only view of the compositor's windows and input state.
pub trait WindowDirectory {
    fn list_windows(&mut self) -> Result<Vec<WindowHandle>>;

    /// Ask to be told (via the daemon's event channel) when `id` goes away.
    fn subscribe_destroyed(&mut self, id: WindowId);

    fn clear_subscriptions(&mut self);

    /// Live poll of the physical key state, never derived from cached events.
    fn current_modifier_state(&self, mask: ChordMask) -> bool;

    fn now(&self) -> Timestamp;
}

/// Renders the candidate list. Indices refer to the slice last passed to
/// [`Presenter::show`].
pub trait Presenter {
    fn show(&mut self, candidates: &[WindowHandle], highlighted: usize) -> Result<()>;
    fn set_highlighted(&mut self, index: usize) -> Result<()>;
    fn hide(&mut self) -> Result<()>;
}

/// Switches workspace if needed and focuses the window.
pub trait ActivationRequestor {
    fn activate(&mut self, window: &WindowHandle, timestamp: Timestamp) -> Result<()>;
}

/// Everything the session talks to, borrowed for the duration of one event.
pub struct Env<'a> {
    pub directory: &'a mut dyn WindowDirectory,
    pub grabs: &'a mut dyn GrabManager,
    pub presenter: &'a mut dyn Presenter,
    pub activator: &'a mut dyn ActivationRequestor,
    pub timers: &'a mut dyn TimerScheduler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Debouncing,
    Interactive,
    Committing,
}

/// What an input did to the session, for the host and for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed.
    Ignored,
    /// Chord accepted; waiting to tell a tap from a hold.
    Armed,
    /// The switcher is up with `cursor` highlighted.
    Opened { cursor: usize },
    /// The selection moved.
    Moved { cursor: usize },
    /// A window was activated and the session ended.
    Activated(WindowId),
    /// The session ended without activating anything.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: Phase,
    pub candidate_count: usize,
    pub cursor: Option<usize>,
}

/// Chord keys that must stay down for autoscroll to keep going.
const AUTOSCROLL_HOLD: ChordMask = ChordMask::MODIFIER.union(ChordMask::TRIGGER);

pub struct Session {
    phase: Phase,
    switcher: Option<WindowSwitcher>,
    grab: Option<GrabHandle>,
    ui_visible: bool,
    direction: Direction,
    started_at: Timestamp,
    grab_mask: ChordMask,
    timings: Timings,
}

impl Session {
    pub fn new(timings: Timings) -> Self {
        Session {
            phase: Phase::Idle,
            switcher: None,
            grab: None,
            ui_visible: false,
            direction: Direction::Forward,
            started_at: Timestamp::default(),
            grab_mask: ChordMask::MODIFIER,
            timings,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> Option<usize> {
        self.switcher.as_ref().map(WindowSwitcher::current_index)
    }

    pub fn candidates(&self) -> &[WindowHandle] {
        self.switcher.as_ref().map_or(&[], WindowSwitcher::windows)
    }

    pub fn has_grab(&self) -> bool {
        self.grab.is_some()
    }

    #[cfg(test)]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            phase: self.phase,
            candidate_count: self.candidates().len(),
            cursor: self.cursor(),
        }
    }

    /// The chord (or just its trigger key, while the switcher is up) was
    /// pressed.
    pub fn begin_chord(
        &mut self,
        env: &mut Env<'_>,
        direction: Direction,
        timestamp: Timestamp,
    ) -> Outcome {
        match self.phase {
            Phase::Idle => self.arm(env, direction, timestamp),
            Phase::Interactive => self.advance(env, direction),
            Phase::Debouncing | Phase::Committing => {
                debug!("Chord pressed during {:?}, ignoring", self.phase);
                Outcome::Ignored
            }
        }
    }

    /// The modifier was released.
    pub fn end_chord(&mut self, env: &mut Env<'_>, timestamp: Timestamp) -> Outcome {
        match self.phase {
            Phase::Debouncing => {
                env.timers.stop(TimerKind::Debounce);
                self.tap(env, timestamp)
            }
            Phase::Interactive => self.commit(env, timestamp),
            Phase::Idle | Phase::Committing => Outcome::Ignored,
        }
    }

    /// Abandon the session without activating anything. A no-op when idle.
    pub fn cancel(&mut self, env: &mut Env<'_>) -> Outcome {
        match self.phase {
            Phase::Idle => Outcome::Ignored,
            _ => {
                info!("Alt+Tab session cancelled");
                self.teardown(env);
                Outcome::Closed
            }
        }
    }

    /// The grab was taken away from under us.
    pub fn on_grab_lost(&mut self, env: &mut Env<'_>) -> Outcome {
        if self.grab.is_none() {
            return Outcome::Ignored;
        }
        warn!("Keyboard grab lost, closing switcher");
        self.teardown(env);
        Outcome::Closed
    }

    pub fn on_timer(&mut self, env: &mut Env<'_>, kind: TimerKind) -> Outcome {
        match (kind, self.phase) {
            (TimerKind::Debounce, Phase::Debouncing) => {
                if env.directory.current_modifier_state(ChordMask::MODIFIER) {
                    self.open(env)
                } else {
                    // The release event lost the race with the timer.
                    let now = env.directory.now();
                    self.tap(env, now)
                }
            }
            (TimerKind::AutoscrollTrigger, Phase::Interactive) => {
                if !env.directory.current_modifier_state(AUTOSCROLL_HOLD) {
                    return Outcome::Ignored;
                }
                self.refresh_direction(env);
                let outcome = self.step(env, self.direction);
                env.timers
                    .start_repeating(TimerKind::AutoscrollRepeat, self.timings.autoscroll_repeat);
                outcome
            }
            (TimerKind::AutoscrollRepeat, Phase::Interactive) => {
                if !env.directory.current_modifier_state(AUTOSCROLL_HOLD) {
                    debug!("Chord released, stopping autoscroll");
                    env.timers.stop(TimerKind::AutoscrollRepeat);
                    return Outcome::Ignored;
                }
                self.refresh_direction(env);
                self.step(env, self.direction)
            }
            (TimerKind::AutoscrollRepeat, _) => {
                env.timers.stop(TimerKind::AutoscrollRepeat);
                Outcome::Ignored
            }
            _ => {
                debug!("Ignoring {:?} timer in {:?}", kind, self.phase);
                Outcome::Ignored
            }
        }
    }

    /// A window went away. Prunes it from the candidates; the session is
    /// cancelled if nothing is left to switch to.
    pub fn on_window_destroyed(&mut self, env: &mut Env<'_>, id: WindowId) -> Outcome {
        if self.phase != Phase::Interactive {
            return Outcome::Ignored;
        }
        let Some(switcher) = self.switcher.as_mut() else {
            return Outcome::Ignored;
        };

        match switcher.remove(id) {
            Removal::NotPresent => Outcome::Ignored,
            Removal::Emptied => {
                info!("Last candidate {} destroyed, closing switcher", id);
                self.teardown(env);
                Outcome::Closed
            }
            Removal::Removed { cursor } => {
                debug!(
                    "Candidate {} destroyed, cursor now {} ({:?})",
                    id,
                    cursor,
                    switcher.current().map(|w| w.title.as_str())
                );
                if let Err(e) = env.presenter.show(switcher.windows(), cursor) {
                    warn!("Failed to refresh switcher: {}", e);
                }
                Outcome::Moved { cursor }
            }
        }
    }

    /// Pointer hovering over tile `index`.
    pub fn on_pointer_select(&mut self, env: &mut Env<'_>, index: usize) -> Outcome {
        if self.phase != Phase::Interactive {
            return Outcome::Ignored;
        }
        let Some(switcher) = self.switcher.as_mut() else {
            return Outcome::Ignored;
        };
        if switcher.current_index() == index || !switcher.select(index) {
            return Outcome::Ignored;
        }
        if let Err(e) = env.presenter.set_highlighted(index) {
            warn!("Failed to update highlight: {}", e);
        }
        Outcome::Moved { cursor: index }
    }

    /// Pointer click on tile `index`: select it and commit.
    pub fn on_pointer_activate(&mut self, env: &mut Env<'_>, index: usize) -> Outcome {
        if self.phase != Phase::Interactive {
            return Outcome::Ignored;
        }
        let selected = self
            .switcher
            .as_mut()
            .is_some_and(|switcher| switcher.select(index));
        if !selected {
            debug!("Click on stale tile {}, ignoring", index);
            return Outcome::Ignored;
        }
        let now = env.directory.now();
        self.commit(env, now)
    }

    fn arm(&mut self, env: &mut Env<'_>, direction: Direction, timestamp: Timestamp) -> Outcome {
        let windows = match env.directory.list_windows() {
            Ok(windows) => windows,
            Err(e) => {
                warn!("Failed to list windows: {}", e);
                return Outcome::Ignored;
            }
        };
        if let BuildResult::Insufficient { eligible } = candidates::build(windows) {
            debug!("Only {} eligible window(s), nothing to switch to", eligible);
            return Outcome::Ignored;
        }

        self.direction = direction;
        self.started_at = timestamp;
        self.phase = Phase::Debouncing;
        env.timers.start_once(TimerKind::Debounce, self.timings.debounce);
        debug!("Chord pressed ({:?}), debouncing", direction);
        Outcome::Armed
    }

    /// Hold detected: grab the keyboard and bring up the switcher.
    fn open(&mut self, env: &mut Env<'_>) -> Outcome {
        let built = env
            .directory
            .list_windows()
            .map(candidates::build)
            .unwrap_or_else(|e| {
                warn!("Failed to list windows: {}", e);
                BuildResult::Insufficient { eligible: 0 }
            });
        let Some(windows) = built.into_ready() else {
            debug!("Candidates vanished while debouncing");
            self.phase = Phase::Idle;
            return Outcome::Closed;
        };

        // The press timestamp may predate a grab released since; never ask
        // with anything older than now.
        let timestamp = env.directory.now().max(self.started_at);
        let grab = match env.grabs.acquire(self.grab_mask, timestamp) {
            Ok(grab) => grab,
            Err(e) => {
                warn!("Not opening switcher: {}", e);
                self.phase = Phase::Idle;
                return Outcome::Closed;
            }
        };
        self.grab = Some(grab);

        let switcher = WindowSwitcher::new(windows, true);
        let cursor = switcher.current_index();
        for window in switcher.windows() {
            env.directory.subscribe_destroyed(window.id);
        }

        self.ui_visible = true;
        if let Err(e) = env.presenter.show(switcher.windows(), cursor) {
            warn!("Failed to show switcher: {}", e);
        }
        info!("Switcher open with {} candidates", switcher.len());

        self.switcher = Some(switcher);
        self.phase = Phase::Interactive;
        self.restart_autoscroll(env);
        Outcome::Opened { cursor }
    }

    /// Manual advance.
    fn advance(&mut self, env: &mut Env<'_>, direction: Direction) -> Outcome {
        self.direction = direction;
        let outcome = self.step(env, direction);
        self.restart_autoscroll(env);
        outcome
    }

    fn step(&mut self, env: &mut Env<'_>, direction: Direction) -> Outcome {
        let Some(switcher) = self.switcher.as_mut() else {
            return Outcome::Ignored;
        };
        let cursor = switcher.cycle(direction);
        if let Err(e) = env.presenter.set_highlighted(cursor) {
            warn!("Failed to update highlight: {}", e);
        }
        debug!("Selection moved {:?} to {}", direction, cursor);
        Outcome::Moved { cursor }
    }

    fn refresh_direction(&mut self, env: &mut Env<'_>) {
        self.direction =
            Direction::from_reverse_held(env.directory.current_modifier_state(ChordMask::REVERSE));
    }

    fn restart_autoscroll(&mut self, env: &mut Env<'_>) {
        env.timers.stop(TimerKind::AutoscrollRepeat);
        env.timers
            .start_once(TimerKind::AutoscrollTrigger, self.timings.autoscroll_trigger);
    }

    /// Quick tap: activate one step from the focused window in the recorded
    /// direction, against a freshly built list, without any UI.
    fn tap(&mut self, env: &mut Env<'_>, timestamp: Timestamp) -> Outcome {
        self.phase = Phase::Committing;

        let target = env
            .directory
            .list_windows()
            .map(candidates::build)
            .ok()
            .and_then(BuildResult::into_ready)
            .map(|windows| {
                let index = self.direction.step(0, windows.len());
                windows[index].clone()
            });

        let outcome = match target {
            Some(window) => self.activate(env, &window, timestamp),
            None => {
                debug!("Nothing to switch to on tap");
                Outcome::Closed
            }
        };

        self.phase = Phase::Idle;
        outcome
    }

    fn commit(&mut self, env: &mut Env<'_>, timestamp: Timestamp) -> Outcome {
        self.phase = Phase::Committing;
        let target = self.switcher.take().and_then(WindowSwitcher::finalize);
        self.teardown(env);

        let Some(window) = target else {
            return Outcome::Closed;
        };

        // A destroy notification may still be queued behind this release.
        let alive = match env.directory.list_windows() {
            Ok(windows) => windows.iter().any(|w| w.id == window.id),
            Err(e) => {
                warn!("Failed to revalidate {}: {}", window.id, e);
                false
            }
        };
        if !alive {
            info!("Selected window {} is gone, not activating", window.id);
            return Outcome::Closed;
        }

        self.activate(env, &window, timestamp)
    }

    fn activate(&mut self, env: &mut Env<'_>, window: &WindowHandle, timestamp: Timestamp) -> Outcome {
        info!("Activating {} ({:?})", window.id, window.title);
        if let Err(e) = env.activator.activate(window, timestamp) {
            warn!("Failed to activate window {}: {}", window.id, e);
            return Outcome::Closed;
        }
        Outcome::Activated(window.id)
    }

    /// Shared exit path. Each step runs whether or not the previous ones had
    /// anything to do.
    fn teardown(&mut self, env: &mut Env<'_>) {
        env.timers.stop(TimerKind::Debounce);
        env.timers.stop(TimerKind::AutoscrollTrigger);
        env.timers.stop(TimerKind::AutoscrollRepeat);

        if let Some(grab) = self.grab.take() {
            let now = env.directory.now();
            env.grabs.release(grab, now);
        }

        if self.ui_visible {
            self.ui_visible = false;
            if let Err(e) = env.presenter.hide() {
                warn!("Failed to hide switcher: {}", e);
            }
        }

        env.directory.clear_subscriptions();
        self.switcher = None;
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::candidates::tests::make_window;
    use crate::grab::tests::FakeGrabs;
    use crate::timers::tests::ManualTimers;
    use crate::window::WindowKind;
    use anyhow::anyhow;
    use std::collections::HashSet;

    #[derive(Debug, Default)]
    pub(crate) struct FakeDirectory {
        pub windows: Vec<WindowHandle>,
        pub held: ChordMask,
        pub now: u64,
        pub subscribed: HashSet<WindowId>,
        pub fail_listing: bool,
    }

    impl WindowDirectory for FakeDirectory {
        fn list_windows(&mut self) -> Result<Vec<WindowHandle>> {
            if self.fail_listing {
                return Err(anyhow!("sway went away"));
            }
            Ok(self.windows.clone())
        }

        fn subscribe_destroyed(&mut self, id: WindowId) {
            self.subscribed.insert(id);
        }

        fn clear_subscriptions(&mut self) {
            self.subscribed.clear();
        }

        fn current_modifier_state(&self, mask: ChordMask) -> bool {
            self.held.contains(mask)
        }

        fn now(&self) -> Timestamp {
            Timestamp(self.now)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum UiCall {
        Show(Vec<WindowId>, usize),
        Highlight(usize),
        Hide,
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingPresenter {
        pub calls: Vec<UiCall>,
        pub fail: bool,
    }

    impl Presenter for RecordingPresenter {
        fn show(&mut self, candidates: &[WindowHandle], highlighted: usize) -> Result<()> {
            self.calls.push(UiCall::Show(
                candidates.iter().map(|w| w.id).collect(),
                highlighted,
            ));
            if self.fail {
                return Err(anyhow!("ui thread gone"));
            }
            Ok(())
        }

        fn set_highlighted(&mut self, index: usize) -> Result<()> {
            self.calls.push(UiCall::Highlight(index));
            Ok(())
        }

        fn hide(&mut self) -> Result<()> {
            self.calls.push(UiCall::Hide);
            if self.fail {
                return Err(anyhow!("ui thread gone"));
            }
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingActivator {
        pub activated: Vec<(WindowId, Timestamp)>,
    }

    impl ActivationRequestor for RecordingActivator {
        fn activate(&mut self, window: &WindowHandle, timestamp: Timestamp) -> Result<()> {
            self.activated.push((window.id, timestamp));
            Ok(())
        }
    }

    const W1: WindowId = 1;
    const W2: WindowId = 2;
    const W3: WindowId = 3;

    struct Harness {
        session: Session,
        directory: FakeDirectory,
        grabs: FakeGrabs,
        presenter: RecordingPresenter,
        activator: RecordingActivator,
        timers: ManualTimers,
    }

    impl Harness {
        /// Scenario A's directory: W1(t=10), W2(t=30), W3(t=20).
        fn new() -> Self {
            let directory = FakeDirectory {
                windows: vec![make_window(W1, 10), make_window(W2, 30), make_window(W3, 20)],
                now: 100,
                ..Default::default()
            };
            Harness {
                session: Session::new(Timings::default()),
                directory,
                grabs: FakeGrabs::default(),
                presenter: RecordingPresenter::default(),
                activator: RecordingActivator::default(),
                timers: ManualTimers::default(),
            }
        }

        fn run<R>(&mut self, f: impl FnOnce(&mut Session, &mut Env<'_>) -> R) -> R {
            let mut env = Env {
                directory: &mut self.directory,
                grabs: &mut self.grabs,
                presenter: &mut self.presenter,
                activator: &mut self.activator,
                timers: &mut self.timers,
            };
            f(&mut self.session, &mut env)
        }

        fn press(&mut self, direction: Direction) -> Outcome {
            self.directory.held |= ChordMask::MODIFIER | ChordMask::TRIGGER;
            let now = self.directory.now();
            self.run(|s, env| s.begin_chord(env, direction, now))
        }

        fn release(&mut self) -> Outcome {
            self.directory.held = ChordMask::empty();
            let now = self.directory.now();
            self.run(|s, env| s.end_chord(env, now))
        }

        /// Fire `kind` if armed, the way the daemon would.
        fn fire(&mut self, kind: TimerKind) -> Outcome {
            assert!(self.timers.is_running(kind), "{:?} is not armed", kind);
            if kind != TimerKind::AutoscrollRepeat {
                self.timers.stop(kind);
            }
            self.run(|s, env| s.on_timer(env, kind))
        }

        fn open(&mut self) -> Outcome {
            assert_eq!(self.press(Direction::Forward), Outcome::Armed);
            self.fire(TimerKind::Debounce)
        }

        fn cursor_id(&self) -> Option<WindowId> {
            let cursor = self.session.cursor()?;
            Some(self.session.candidates()[cursor].id)
        }

        fn activated_ids(&self) -> Vec<WindowId> {
            self.activator.activated.iter().map(|(id, _)| *id).collect()
        }

        fn assert_torn_down(&self) {
            assert_eq!(self.session.phase(), Phase::Idle);
            assert!(!self.session.has_grab());
            assert!(!self.grabs.is_held());
            assert!(self.session.cursor().is_none());
            assert!(self.directory.subscribed.is_empty());
            assert!(!self.timers.is_running(TimerKind::Debounce));
            assert!(!self.timers.is_running(TimerKind::AutoscrollTrigger));
            assert!(!self.timers.is_running(TimerKind::AutoscrollRepeat));
        }
    }

    #[test]
    fn test_scenario_a_opens_on_previous_window() {
        let mut h = Harness::new();
        assert_eq!(h.open(), Outcome::Opened { cursor: 1 });

        assert_eq!(h.session.phase(), Phase::Interactive);
        let ids: Vec<_> = h.session.candidates().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![W2, W3, W1]);
        assert_eq!(h.cursor_id(), Some(W3));
        assert_eq!(h.presenter.calls, vec![UiCall::Show(vec![W2, W3, W1], 1)]);
        assert!(h.timers.is_running(TimerKind::AutoscrollTrigger));
        assert_eq!(h.directory.subscribed, HashSet::from([W1, W2, W3]));
    }

    #[test]
    fn test_scenario_b_tap_activates_without_ui() {
        let mut h = Harness::new();
        assert_eq!(h.press(Direction::Forward), Outcome::Armed);
        assert_eq!(h.session.phase(), Phase::Debouncing);
        assert!(h.timers.is_running(TimerKind::Debounce));

        assert_eq!(h.release(), Outcome::Activated(W3));

        assert_eq!(h.activated_ids(), vec![W3]);
        assert_eq!(h.grabs.acquired, 0);
        assert!(h.presenter.calls.is_empty());
        h.assert_torn_down();
    }

    #[test]
    fn test_tap_backward_takes_least_recent() {
        let mut h = Harness::new();
        h.press(Direction::Backward);
        assert_eq!(h.release(), Outcome::Activated(W1));
    }

    #[test]
    fn test_tap_when_release_loses_race_with_timer() {
        let mut h = Harness::new();
        h.press(Direction::Forward);
        // Released physically, but the release event is still queued.
        h.directory.held = ChordMask::empty();

        assert_eq!(h.fire(TimerKind::Debounce), Outcome::Activated(W3));
        assert_eq!(h.grabs.acquired, 0);
        assert!(h.presenter.calls.is_empty());

        // The late release event is harmless.
        assert_eq!(h.release(), Outcome::Ignored);
        assert_eq!(h.activated_ids(), vec![W3]);
    }

    #[test]
    fn test_tap_revalidates_candidates() {
        let mut h = Harness::new();
        h.press(Direction::Forward);
        h.directory.windows.retain(|w| w.id != W3);

        assert_eq!(h.release(), Outcome::Activated(W1));
    }

    #[test]
    fn test_scenario_c_hold_advance_and_commit() {
        let mut h = Harness::new();
        h.open();
        assert_eq!(h.grabs.acquired, 1);

        assert_eq!(h.press(Direction::Forward), Outcome::Moved { cursor: 2 });
        assert_eq!(h.cursor_id(), Some(W1));
        assert_eq!(h.presenter.calls.last(), Some(&UiCall::Highlight(2)));

        assert_eq!(h.release(), Outcome::Activated(W1));
        assert_eq!(h.activated_ids(), vec![W1]);
        assert_eq!(h.grabs.released, 1);
        assert_eq!(h.presenter.calls.last(), Some(&UiCall::Hide));
        h.assert_torn_down();
    }

    #[test]
    fn test_scenario_d_single_candidate_is_noop() {
        let mut h = Harness::new();
        h.directory.windows = vec![make_window(W1, 10)];

        assert_eq!(h.press(Direction::Forward), Outcome::Ignored);
        assert_eq!(h.session.phase(), Phase::Idle);
        assert!(h.timers.started.is_empty());
        assert_eq!(h.release(), Outcome::Ignored);
        assert_eq!(h.grabs.acquired, 0);
        assert!(h.presenter.calls.is_empty());
        assert!(h.activator.activated.is_empty());
    }

    #[test]
    fn test_zero_candidates_is_noop() {
        let mut h = Harness::new();
        h.directory.windows.clear();
        assert_eq!(h.press(Direction::Forward), Outcome::Ignored);
        assert_eq!(h.session.phase(), Phase::Idle);
    }

    #[test]
    fn test_scenario_e_selected_window_destroyed() {
        let mut h = Harness::new();
        h.open();
        assert_eq!(h.cursor_id(), Some(W3));

        h.directory.windows.retain(|w| w.id != W3);
        let outcome = h.run(|s, env| s.on_window_destroyed(env, W3));

        assert_eq!(outcome, Outcome::Moved { cursor: 1 });
        assert_eq!(h.cursor_id(), Some(W1));
        assert_eq!(h.presenter.calls.last(), Some(&UiCall::Show(vec![W2, W1], 1)));

        assert_eq!(h.release(), Outcome::Activated(W1));
        assert!(!h.activated_ids().contains(&W3));
    }

    #[test]
    fn test_destroying_every_candidate_force_cancels() {
        let mut h = Harness::new();
        h.open();

        for id in [W1, W2] {
            h.directory.windows.retain(|w| w.id != id);
            h.run(|s, env| s.on_window_destroyed(env, id));
        }
        assert_eq!(h.session.phase(), Phase::Interactive);

        h.directory.windows.clear();
        let outcome = h.run(|s, env| s.on_window_destroyed(env, W3));
        assert_eq!(outcome, Outcome::Closed);
        assert_eq!(h.presenter.calls.last(), Some(&UiCall::Hide));
        assert_eq!(h.grabs.released, 1);
        h.assert_torn_down();
        assert!(h.activator.activated.is_empty());
    }

    #[test]
    fn test_destroyed_notification_for_unrelated_window() {
        let mut h = Harness::new();
        h.open();
        let outcome = h.run(|s, env| s.on_window_destroyed(env, 99));
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(h.session.candidates().len(), 3);
    }

    #[test]
    fn test_commit_skips_window_destroyed_but_not_yet_notified() {
        let mut h = Harness::new();
        h.open();
        h.directory.windows.retain(|w| w.id != W3);

        assert_eq!(h.release(), Outcome::Closed);
        assert!(h.activator.activated.is_empty());
        h.assert_torn_down();
    }

    #[test]
    fn test_scenario_f_autoscroll() {
        let mut h = Harness::new();
        h.open();
        h.directory.held = ChordMask::MODIFIER | ChordMask::TRIGGER;

        assert_eq!(h.fire(TimerKind::AutoscrollTrigger), Outcome::Moved { cursor: 2 });
        assert!(h.timers.is_running(TimerKind::AutoscrollRepeat));
        assert_eq!(
            h.timers.armed.get(&TimerKind::AutoscrollRepeat),
            Some(&Timings::default().autoscroll_repeat)
        );

        assert_eq!(h.fire(TimerKind::AutoscrollRepeat), Outcome::Moved { cursor: 0 });
        assert_eq!(h.fire(TimerKind::AutoscrollRepeat), Outcome::Moved { cursor: 1 });

        // Tab let go (Alt still down): the next tick stops the repeat.
        h.directory.held = ChordMask::MODIFIER;
        assert_eq!(h.fire(TimerKind::AutoscrollRepeat), Outcome::Ignored);
        assert!(!h.timers.is_running(TimerKind::AutoscrollRepeat));
        assert_eq!(h.session.cursor(), Some(1));
        assert_eq!(h.session.phase(), Phase::Interactive);
    }

    #[test]
    fn test_autoscroll_follows_live_shift() {
        let mut h = Harness::new();
        h.open();
        h.directory.held = ChordMask::MODIFIER | ChordMask::TRIGGER | ChordMask::REVERSE;

        assert_eq!(h.fire(TimerKind::AutoscrollTrigger), Outcome::Moved { cursor: 0 });
        assert_eq!(h.session.direction(), Direction::Backward);
    }

    #[test]
    fn test_autoscroll_trigger_after_release_does_nothing() {
        let mut h = Harness::new();
        h.open();
        h.directory.held = ChordMask::MODIFIER;

        assert_eq!(h.fire(TimerKind::AutoscrollTrigger), Outcome::Ignored);
        assert!(!h.timers.is_running(TimerKind::AutoscrollRepeat));
        assert_eq!(h.session.cursor(), Some(1));
    }

    #[test]
    fn test_manual_advance_restarts_autoscroll() {
        let mut h = Harness::new();
        h.open();
        h.directory.held = ChordMask::MODIFIER | ChordMask::TRIGGER;
        h.fire(TimerKind::AutoscrollTrigger);
        assert!(h.timers.is_running(TimerKind::AutoscrollRepeat));

        h.press(Direction::Backward);
        assert!(!h.timers.is_running(TimerKind::AutoscrollRepeat));
        assert!(h.timers.is_running(TimerKind::AutoscrollTrigger));
    }

    #[test]
    fn test_commit_stops_all_timers() {
        let mut h = Harness::new();
        h.open();
        h.directory.held = ChordMask::MODIFIER | ChordMask::TRIGGER;
        h.fire(TimerKind::AutoscrollTrigger);

        h.release();
        h.assert_torn_down();
    }

    #[test]
    fn test_stale_timer_ticks_are_ignored() {
        let mut h = Harness::new();
        for kind in [
            TimerKind::Debounce,
            TimerKind::AutoscrollTrigger,
            TimerKind::AutoscrollRepeat,
        ] {
            assert_eq!(h.run(|s, env| s.on_timer(env, kind)), Outcome::Ignored);
        }
        assert_eq!(h.session.phase(), Phase::Idle);
    }

    #[test]
    fn test_second_chord_while_debouncing_is_noop() {
        let mut h = Harness::new();
        h.press(Direction::Forward);
        assert_eq!(h.press(Direction::Backward), Outcome::Ignored);
        assert_eq!(h.session.direction(), Direction::Forward);
        assert_eq!(h.timers.started, vec![TimerKind::Debounce]);
    }

    #[test]
    fn test_cancel_interactive() {
        let mut h = Harness::new();
        h.open();
        assert_eq!(h.run(|s, env| s.cancel(env)), Outcome::Closed);
        assert_eq!(h.presenter.calls.last(), Some(&UiCall::Hide));
        assert_eq!(h.grabs.released, 1);
        assert!(h.activator.activated.is_empty());
        h.assert_torn_down();
    }

    #[test]
    fn test_cancel_while_debouncing() {
        let mut h = Harness::new();
        h.press(Direction::Forward);
        assert_eq!(h.run(|s, env| s.cancel(env)), Outcome::Closed);
        assert!(h.presenter.calls.is_empty());
        h.assert_torn_down();

        // The release that follows must not turn into a tap.
        assert_eq!(h.release(), Outcome::Ignored);
        assert!(h.activator.activated.is_empty());
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let mut h = Harness::new();
        let before = h.session.status();
        assert_eq!(h.run(|s, env| s.cancel(env)), Outcome::Ignored);
        assert_eq!(h.run(|s, env| s.cancel(env)), Outcome::Ignored);
        assert_eq!(h.run(|s, env| s.on_grab_lost(env)), Outcome::Ignored);
        assert_eq!(h.session.status(), before);
        assert_eq!(h.session.direction(), Direction::Forward);
        assert!(h.presenter.calls.is_empty());
        assert_eq!(h.grabs.released, 0);
    }

    #[test]
    fn test_grab_denied_aborts_silently() {
        let mut h = Harness::new();
        h.grabs.deny = true;

        assert_eq!(h.open(), Outcome::Closed);
        assert_eq!(h.session.phase(), Phase::Idle);
        assert!(h.presenter.calls.is_empty());
        assert!(h.activator.activated.is_empty());
        assert!(h.directory.subscribed.is_empty());
        assert!(!h.timers.is_running(TimerKind::AutoscrollTrigger));
    }

    #[test]
    fn test_candidates_vanish_during_debounce() {
        let mut h = Harness::new();
        h.press(Direction::Forward);
        h.directory.windows.truncate(1);

        assert_eq!(h.fire(TimerKind::Debounce), Outcome::Closed);
        assert_eq!(h.session.phase(), Phase::Idle);
        assert_eq!(h.grabs.acquired, 0);
        assert!(h.presenter.calls.is_empty());
    }

    #[test]
    fn test_listing_failure_is_not_fatal() {
        let mut h = Harness::new();
        h.directory.fail_listing = true;
        assert_eq!(h.press(Direction::Forward), Outcome::Ignored);
        assert_eq!(h.session.phase(), Phase::Idle);
    }

    #[test]
    fn test_grab_uses_fresh_timestamp() {
        let mut h = Harness::new();
        h.press(Direction::Forward);
        h.directory.now = 250;
        h.fire(TimerKind::Debounce);

        let grab = h.session.grab.as_ref().unwrap();
        assert_eq!(grab.acquired_at(), Timestamp(250));
        assert_eq!(grab.mask(), ChordMask::MODIFIER);
    }

    #[test]
    fn test_pointer_hover_and_click() {
        let mut h = Harness::new();
        h.open();

        assert_eq!(
            h.run(|s, env| s.on_pointer_select(env, 0)),
            Outcome::Moved { cursor: 0 }
        );
        assert_eq!(h.presenter.calls.last(), Some(&UiCall::Highlight(0)));
        assert_eq!(h.run(|s, env| s.on_pointer_select(env, 0)), Outcome::Ignored);
        assert_eq!(h.run(|s, env| s.on_pointer_select(env, 7)), Outcome::Ignored);

        assert_eq!(h.run(|s, env| s.on_pointer_activate(env, 7)), Outcome::Ignored);
        assert_eq!(h.session.phase(), Phase::Interactive);

        assert_eq!(
            h.run(|s, env| s.on_pointer_activate(env, 2)),
            Outcome::Activated(W1)
        );
        h.assert_torn_down();
    }

    #[test]
    fn test_pointer_events_outside_session_are_ignored() {
        let mut h = Harness::new();
        assert_eq!(h.run(|s, env| s.on_pointer_activate(env, 1)), Outcome::Ignored);
        assert_eq!(h.run(|s, env| s.on_pointer_select(env, 1)), Outcome::Ignored);
        assert!(h.activator.activated.is_empty());
    }

    #[test]
    fn test_grab_lost_closes_switcher() {
        let mut h = Harness::new();
        h.open();
        assert_eq!(h.run(|s, env| s.on_grab_lost(env)), Outcome::Closed);
        assert!(h.activator.activated.is_empty());
        h.assert_torn_down();
    }

    #[test]
    fn test_teardown_continues_past_ui_failure() {
        let mut h = Harness::new();
        h.open();
        h.presenter.fail = true;

        assert_eq!(h.run(|s, env| s.cancel(env)), Outcome::Closed);
        assert_eq!(h.grabs.released, 1);
        h.assert_torn_down();
    }

    #[test]
    fn test_dialog_candidates_and_cross_workspace_target() {
        let mut h = Harness::new();
        let mut dialog = make_window(4, 25);
        dialog.kind = WindowKind::Dialog;
        dialog.is_root_transient = true;
        dialog.workspace = Some(3);
        h.directory.windows.push(dialog);

        h.open();
        assert_eq!(h.cursor_id(), Some(4));
        let now = h.directory.now();
        assert_eq!(h.release(), Outcome::Activated(4));
        assert_eq!(h.activator.activated, vec![(4, now)]);
    }

    #[test]
    fn test_cursor_stays_valid_through_interactive() {
        let mut h = Harness::new();
        h.open();
        for step in 0..10 {
            let direction = if step % 3 == 0 {
                Direction::Backward
            } else {
                Direction::Forward
            };
            h.press(direction);
            let cursor = h.session.cursor().unwrap();
            assert!(cursor < h.session.candidates().len());
        }
    }
}
