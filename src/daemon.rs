//! The daemon's event loop.
//!
//! Every input source (keyboard thread, timers, sway window events, pointer
//! clicks on the switcher, IPC clients, grab loss) posts onto one channel.
//! The loop handles events strictly one at a time in arrival order, so the
//! session never sees two events interleave.

use crate::event_filter::{EventFilter, SessionInput, Verdict};
use crate::grab::GrabManager;
use crate::ipc::{IpcCommand, IpcRequest, IpcResponse};
use crate::keyboard_monitor::{ChordKey, InputEvent};
use crate::session::{ActivationRequestor, Env, Outcome, Presenter, Session, WindowDirectory};
use crate::sway_client::SwayClient;
use crate::timers::{TimerTick, Timings, TokioTimers};
use crate::ui_commands::PointerEvent;
use crate::window::{ChordMask, Direction, WindowId};
use crate::window_manager::{DirectoryEvent, WindowManager};
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug)]
pub enum DaemonEvent {
    Input(InputEvent),
    Timer(TimerTick),
    Window(DirectoryEvent),
    Pointer(PointerEvent),
    Ipc(IpcRequest),
    /// The keyboard device went away; the chord can no longer be tracked.
    GrabLost,
}

impl From<InputEvent> for DaemonEvent {
    fn from(event: InputEvent) -> Self {
        DaemonEvent::Input(event)
    }
}

impl From<TimerTick> for DaemonEvent {
    fn from(tick: TimerTick) -> Self {
        DaemonEvent::Timer(tick)
    }
}

impl From<DirectoryEvent> for DaemonEvent {
    fn from(event: DirectoryEvent) -> Self {
        DaemonEvent::Window(event)
    }
}

impl From<PointerEvent> for DaemonEvent {
    fn from(event: PointerEvent) -> Self {
        DaemonEvent::Pointer(event)
    }
}

impl From<IpcRequest> for DaemonEvent {
    fn from(request: IpcRequest) -> Self {
        DaemonEvent::Ipc(request)
    }
}

/// A window directory that also learns from compositor notifications.
pub trait TrackedDirectory: WindowDirectory {
    fn on_focus(&mut self, id: WindowId);

    /// Returns true if the session subscribed to `id`.
    fn on_closed(&mut self, id: WindowId) -> bool;
}

impl<C: SwayClient> TrackedDirectory for WindowManager<C> {
    fn on_focus(&mut self, id: WindowId) {
        WindowManager::on_focus(self, id);
    }

    fn on_closed(&mut self, id: WindowId) -> bool {
        WindowManager::on_closed(self, id)
    }
}

/// Chord keys as seen in the event stream. Only used to recognise the
/// chord; the session polls live key state for its own decisions.
#[derive(Debug, Default, Clone, Copy)]
struct ChordTracker {
    modifier: bool,
    reverse: bool,
}

impl ChordTracker {
    fn observe(&mut self, event: &InputEvent) {
        if let InputEvent::Key { key, pressed, .. } = *event {
            match key {
                ChordKey::Modifier => self.modifier = pressed,
                ChordKey::Reverse => self.reverse = pressed,
                _ => {}
            }
        }
    }
}

pub struct Daemon<D, G, P, A> {
    session: Session,
    directory: D,
    grabs: G,
    presenter: P,
    activator: A,
    timers: TokioTimers<DaemonEvent>,
    filter: EventFilter,
    chord: ChordTracker,
}

impl<D, G, P, A> Daemon<D, G, P, A>
where
    D: TrackedDirectory,
    G: GrabManager,
    P: Presenter,
    A: ActivationRequestor,
{
    /// Timer ticks are posted on `tx`, which must feed the channel passed
    /// to [`Daemon::run`].
    pub fn new(
        timings: Timings,
        directory: D,
        grabs: G,
        presenter: P,
        activator: A,
        tx: mpsc::UnboundedSender<DaemonEvent>,
    ) -> Self {
        Daemon {
            session: Session::new(timings),
            directory,
            grabs,
            presenter,
            activator,
            timers: TokioTimers::new(tx),
            filter: EventFilter,
            chord: ChordTracker::default(),
        }
    }

    /// Main event loop
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<DaemonEvent>) {
        info!("Starting daemon event loop");

        while let Some(event) = rx.recv().await {
            if self.handle_event(event).is_break() {
                info!("Shutdown requested");
                break;
            }
        }

        // Leave nothing grabbed or on screen behind us.
        self.with_session(|session, env| session.cancel(env));
        info!("Daemon event loop finished");
    }

    pub fn handle_event(&mut self, event: DaemonEvent) -> ControlFlow<()> {
        let outcome = match event {
            DaemonEvent::Input(input) => self.handle_input(input),
            DaemonEvent::Timer(tick) => {
                if !self.timers.accept(&tick) {
                    return ControlFlow::Continue(());
                }
                self.with_session(|session, env| session.on_timer(env, tick.kind))
            }
            DaemonEvent::Window(DirectoryEvent::Focused(id)) => {
                self.directory.on_focus(id);
                Outcome::Ignored
            }
            DaemonEvent::Window(DirectoryEvent::Closed(id)) => {
                if !self.directory.on_closed(id) {
                    return ControlFlow::Continue(());
                }
                self.with_session(|session, env| session.on_window_destroyed(env, id))
            }
            DaemonEvent::Pointer(PointerEvent::Select(index)) => {
                self.with_session(|session, env| session.on_pointer_select(env, index))
            }
            DaemonEvent::Pointer(PointerEvent::Activate(index)) => {
                self.with_session(|session, env| session.on_pointer_activate(env, index))
            }
            DaemonEvent::GrabLost => self.with_session(|session, env| session.on_grab_lost(env)),
            DaemonEvent::Ipc(request) => return self.handle_ipc(request),
        };

        self.after(outcome);
        ControlFlow::Continue(())
    }

    fn handle_input(&mut self, event: InputEvent) -> Outcome {
        self.chord.observe(&event);

        let verdict = self.filter.handle(self.session.has_grab(), &event);
        if verdict.is_consumed() {
            debug!("Input at {:?} taken by the switcher: {:?}", event.time(), verdict);
        }

        match verdict {
            Verdict::Forward(SessionInput::EndChord(time)) => {
                self.with_session(|session, env| session.end_chord(env, time))
            }
            Verdict::Forward(SessionInput::Advance(time)) => {
                let direction = Direction::from_reverse_held(
                    self.directory.current_modifier_state(ChordMask::REVERSE),
                );
                self.with_session(|session, env| session.begin_chord(env, direction, time))
            }
            Verdict::Forward(SessionInput::Cancel) => {
                self.with_session(|session, env| session.cancel(env))
            }
            Verdict::Consumed => Outcome::Ignored,
            Verdict::PassThrough => match event {
                InputEvent::Key {
                    key: ChordKey::Trigger,
                    pressed: true,
                    time,
                } if self.chord.modifier => {
                    let direction = Direction::from_reverse_held(self.chord.reverse);
                    self.with_session(|session, env| session.begin_chord(env, direction, time))
                }
                InputEvent::Key {
                    key: ChordKey::Modifier,
                    pressed: false,
                    time,
                } => self.with_session(|session, env| session.end_chord(env, time)),
                _ => Outcome::Ignored,
            },
        }
    }

    fn handle_ipc(&mut self, request: IpcRequest) -> ControlFlow<()> {
        let IpcRequest { command, reply } = request;
        let now = self.directory.now();

        let (outcome, response, flow) = match command {
            IpcCommand::Next | IpcCommand::Prev => {
                let direction = if command == IpcCommand::Next {
                    Direction::Forward
                } else {
                    Direction::Backward
                };
                let outcome =
                    self.with_session(|session, env| session.begin_chord(env, direction, now));
                (outcome, IpcResponse::Ok, ControlFlow::Continue(()))
            }
            IpcCommand::Select => {
                let outcome = self.with_session(|session, env| session.end_chord(env, now));
                (outcome, IpcResponse::Ok, ControlFlow::Continue(()))
            }
            IpcCommand::Cancel => {
                let outcome = self.with_session(|session, env| session.cancel(env));
                (outcome, IpcResponse::Ok, ControlFlow::Continue(()))
            }
            IpcCommand::Status => (
                Outcome::Ignored,
                IpcResponse::Status(self.session.status()),
                ControlFlow::Continue(()),
            ),
            IpcCommand::Shutdown => (Outcome::Ignored, IpcResponse::Ok, ControlFlow::Break(())),
        };

        self.after(outcome);
        if reply.send(response).is_err() {
            debug!("IPC client for {} went away before the reply", command);
        }
        flow
    }

    fn after(&mut self, outcome: Outcome) {
        if outcome != Outcome::Ignored {
            debug!("Session {:?} -> {:?}", outcome, self.session.phase());
        }
        // Stamp now rather than waiting for sway's focus event, so a quick
        // second Alt+Tab already sees the new order.
        if let Outcome::Activated(id) = outcome {
            self.directory.on_focus(id);
        }
    }

    fn with_session<R>(&mut self, f: impl FnOnce(&mut Session, &mut Env<'_>) -> R) -> R {
        let Daemon {
            session,
            directory,
            grabs,
            presenter,
            activator,
            timers,
            ..
        } = self;
        let mut env = Env {
            directory,
            grabs,
            presenter,
            activator,
            timers,
        };
        f(session, &mut env)
    }
}
