//! One-second tick scheduling and the timer title projection.

use crate::models::TimerState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Title shown while no timer is running.
pub const IDLE_TITLE: &str = "Pomodoro";

/// A cancellable repeating timer.
///
/// Each `start` begins a new generation and cancels the previous one. Fires
/// carry their generation so that a fire queued just before a cancel can be
/// recognised as stale.
pub trait Ticker {
    /// Arms the ticker, cancelling any previous run. Returns the new generation.
    fn start(&mut self) -> u64;

    /// Cancels the current run, if any.
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// Returns true if a fire from `generation` belongs to the active run.
    fn is_current(&self, generation: u64) -> bool;
}

/// Ticker backed by a background thread that sends one message per period.
pub struct ThreadTicker<M: Send + 'static> {
    tx: Sender<M>,
    wrap: fn(u64) -> M,
    period: Duration,
    generation: u64,
    cancel: Option<Arc<AtomicBool>>,
}

impl<M: Send + 'static> ThreadTicker<M> {
    /// `wrap` turns a generation into the message sent on every fire.
    pub fn new(tx: Sender<M>, period: Duration, wrap: fn(u64) -> M) -> Self {
        Self {
            tx,
            wrap,
            period,
            generation: 0,
            cancel: None,
        }
    }
}

impl<M: Send + 'static> Ticker for ThreadTicker<M> {
    fn start(&mut self) -> u64 {
        self.stop();
        self.generation += 1;

        let generation = self.generation;
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let tx = self.tx.clone();
        let wrap = self.wrap;
        let period = self.period;

        thread::spawn(move || loop {
            thread::sleep(period);
            if flag.load(Ordering::SeqCst) {
                break;
            }
            if tx.send(wrap(generation)).is_err() {
                break;
            }
        });

        self.cancel = Some(cancel);
        trace!(generation, "ticker started");
        generation
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::SeqCst);
            trace!(generation = self.generation, "ticker stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_active() && generation == self.generation
    }
}

impl<M: Send + 'static> Drop for ThreadTicker<M> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ticker that tracks its generations but never fires on its own.
///
/// Used where nothing counts down (one-shot commands) and by tests, which
/// drive the timer by calling `tick` directly.
#[derive(Debug, Default)]
pub struct DetachedTicker {
    generation: u64,
    active: bool,
}

impl DetachedTicker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ticker for DetachedTicker {
    fn start(&mut self) -> u64 {
        self.generation += 1;
        self.active = true;
        self.generation
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active && generation == self.generation
    }
}

/// Formats the window title: remaining time and label while running.
pub fn format_title(state: &TimerState, label: &str) -> String {
    match state {
        TimerState::Running { remaining_secs, .. } => {
            format!("{} — {}", format_time(*remaining_secs), label)
        }
        _ => IDLE_TITLE.to_string(),
    }
}

/// Formats time in MM:SS format.
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
