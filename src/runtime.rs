use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};
use tracing::{debug, trace};

use crate::scores::SaveReport;

/// Identifies one countdown. Ticks carrying an older generation are stale.
pub type Generation = u64;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    /// One countdown second elapsed for the given timer generation
    Tick(Generation),
    /// A background score save finished
    Saved(SaveReport),
    /// Nothing arrived within the poll interval
    Redraw,
}

/// Source of application events (keyboard, timer, background work)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Event source reading from a channel that every producer shares
pub struct ChannelEventSource {
    rx: Receiver<AppEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Forward crossterm key and resize events into `tx` until the channel closes
pub fn spawn_terminal_reader(tx: Sender<AppEvent>) {
    thread::spawn(move || loop {
        let sent = match event::read() {
            Ok(CtEvent::Key(key)) => tx.send(AppEvent::Key(key)),
            Ok(CtEvent::Resize(_, _)) => tx.send(AppEvent::Resize),
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "terminal reader stopped");
                break;
            }
        };
        if sent.is_err() {
            break;
        }
    });
}

/// How long the runner waits before asking for a redraw
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Runner that advances the application one event at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to the ticker interval and returns the next event, or Redraw on timeout
    pub fn step(&self) -> AppEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                AppEvent::Redraw
            }
        }
    }
}

/// Handle to a running countdown. Dropping it stops the countdown.
pub struct TimerLease {
    generation: Generation,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerLease {
    pub fn new(generation: Generation, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            generation,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

impl Drop for TimerLease {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerLease")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Starts one-second countdowns that deliver [`AppEvent::Tick`]
pub trait Scheduler {
    fn start(&mut self, generation: Generation) -> TimerLease;
}

/// Scheduler backed by one sleeping thread per countdown
#[derive(Debug, Clone)]
pub struct ThreadScheduler {
    events: Sender<AppEvent>,
    period: Duration,
}

impl ThreadScheduler {
    pub fn new(events: Sender<AppEvent>) -> Self {
        Self::with_period(events, Duration::from_secs(1))
    }

    pub fn with_period(events: Sender<AppEvent>, period: Duration) -> Self {
        Self { events, period }
    }
}

impl Scheduler for ThreadScheduler {
    fn start(&mut self, generation: Generation) -> TimerLease {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        let events = self.events.clone();
        let period = self.period;

        thread::spawn(move || loop {
            thread::sleep(period);
            if flag.load(Ordering::SeqCst) {
                break;
            }
            trace!(generation, "tick");
            if events.send(AppEvent::Tick(generation)).is_err() {
                break;
            }
        });

        debug!(generation, "countdown started");
        TimerLease::new(generation, move || {
            stopped.store(true, Ordering::SeqCst);
            debug!(generation, "countdown cancelled");
        })
    }
}

/// Scheduler that never ticks on its own; callers feed ticks by hand.
/// Counts how many countdowns were started and released.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    started: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Countdowns started but not yet released
    pub fn active(&self) -> usize {
        self.started() - self.cancelled()
    }
}

impl Scheduler for ManualScheduler {
    fn start(&mut self, generation: Generation) -> TimerLease {
        self.started.fetch_add(1, Ordering::SeqCst);
        let cancelled = Arc::clone(&self.cancelled);
        TimerLease::new(generation, move || {
            cancelled.fetch_add(1, Ordering::SeqCst);
        })
    }
}
