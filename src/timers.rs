//! Debounce and autoscroll timers.
//!
//! Timers never call into the session directly. A fired timer posts a
//! [`TimerTick`] onto the daemon's event channel, so timer callbacks are
//! ordered with key presses and window notifications like any other event.

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_AUTOSCROLL_TRIGGER_MS: u64 = 500;
pub const DEFAULT_AUTOSCROLL_REPEAT_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Tap-or-hold decision after the chord is first pressed.
    Debounce,
    /// Delay before autoscroll starts.
    AutoscrollTrigger,
    /// Autoscroll advance interval.
    AutoscrollRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub debounce: Duration,
    pub autoscroll_trigger: Duration,
    pub autoscroll_repeat: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            autoscroll_trigger: Duration::from_millis(DEFAULT_AUTOSCROLL_TRIGGER_MS),
            autoscroll_repeat: Duration::from_millis(DEFAULT_AUTOSCROLL_REPEAT_MS),
        }
    }
}

impl Timings {
    pub fn from_millis(debounce: u64, trigger: u64, repeat: u64) -> Result<Self> {
        if debounce == 0 || repeat == 0 {
            bail!("debounce and autoscroll repeat intervals must be non-zero");
        }
        if trigger <= debounce {
            bail!(
                "autoscroll trigger ({}ms) must be longer than the debounce delay ({}ms)",
                trigger,
                debounce
            );
        }
        if repeat >= trigger {
            bail!(
                "autoscroll repeat ({}ms) must be shorter than the trigger delay ({}ms)",
                repeat,
                trigger
            );
        }

        Ok(Timings {
            debounce: Duration::from_millis(debounce),
            autoscroll_trigger: Duration::from_millis(trigger),
            autoscroll_repeat: Duration::from_millis(repeat),
        })
    }
}

/// Arms and disarms the session's timers. Starting a running timer restarts
/// it; stopping a stopped timer does nothing.
pub trait TimerScheduler {
    fn start_once(&mut self, kind: TimerKind, after: Duration);
    fn start_repeating(&mut self, kind: TimerKind, every: Duration);
    fn stop(&mut self, kind: TimerKind);
    fn is_running(&self, kind: TimerKind) -> bool;
}

/// A timer firing, as delivered through the event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub kind: TimerKind,
    generation: u64,
}

struct Running {
    generation: u64,
    repeating: bool,
    task: JoinHandle<()>,
}

/// Tokio-backed scheduler. Each timer is a task that sleeps and posts ticks.
pub struct TokioTimers<E> {
    tx: mpsc::UnboundedSender<E>,
    next_generation: u64,
    running: HashMap<TimerKind, Running>,
}

impl<E> TokioTimers<E>
where
    E: From<TimerTick> + Send + 'static,
{
    pub fn new(tx: mpsc::UnboundedSender<E>) -> Self {
        TokioTimers {
            tx,
            next_generation: 0,
            running: HashMap::new(),
        }
    }

    /// Filter out ticks from timers that were stopped or restarted after the
    /// tick was queued. Returns true if the tick should be handled.
    pub fn accept(&mut self, tick: &TimerTick) -> bool {
        let Some(running) = self.running.get(&tick.kind) else {
            debug!("Dropping tick for stopped timer {:?}", tick.kind);
            return false;
        };
        if running.generation != tick.generation {
            debug!("Dropping stale tick for {:?}", tick.kind);
            return false;
        }
        if !running.repeating {
            self.running.remove(&tick.kind);
        }
        true
    }

    fn arm(&mut self, kind: TimerKind, repeating: bool, task: impl FnOnce(TimerTick) -> JoinHandle<()>) {
        self.stop(kind);
        self.next_generation += 1;
        let tick = TimerTick {
            kind,
            generation: self.next_generation,
        };
        self.running.insert(
            kind,
            Running {
                generation: tick.generation,
                repeating,
                task: task(tick),
            },
        );
    }
}

impl<E> TimerScheduler for TokioTimers<E>
where
    E: From<TimerTick> + Send + 'static,
{
    fn start_once(&mut self, kind: TimerKind, after: Duration) {
        let tx = self.tx.clone();
        self.arm(kind, false, |tick| {
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let _ = tx.send(E::from(tick));
            })
        });
    }

    fn start_repeating(&mut self, kind: TimerKind, every: Duration) {
        let tx = self.tx.clone();
        self.arm(kind, true, |tick| {
            tokio::spawn(async move {
                let start = tokio::time::Instant::now() + every;
                let mut interval = tokio::time::interval_at(start, every);
                loop {
                    interval.tick().await;
                    if tx.send(E::from(tick)).is_err() {
                        break;
                    }
                }
            })
        });
    }

    fn stop(&mut self, kind: TimerKind) {
        if let Some(running) = self.running.remove(&kind) {
            running.task.abort();
        }
    }

    fn is_running(&self, kind: TimerKind) -> bool {
        self.running.contains_key(&kind)
    }
}

impl<E> Drop for TokioTimers<E> {
    fn drop(&mut self) {
        for (_, running) in self.running.drain() {
            running.task.abort();
        }
    }
}
