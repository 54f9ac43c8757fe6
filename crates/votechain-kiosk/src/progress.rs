//! Cancellable progress animation for long network calls
//!
//! The reporter is cosmetic. It runs as its own task, redrawing an elapsed-time
//! progress bar and spinner until its [`CancelSignal`] is set. Stopping it is
//! bounded: the caller waits at most a short grace period and then abandons
//! the task, which exits on its own at its next frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::devices::{lock_display, SharedDisplay};
use crate::policy::Ticker;

pub const SPINNER_FRAMES: [char; 4] = ['|', '/', '-', '\\'];

/// One-shot cancellation flag, set once and never cleared
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the reporter hands to its updater on each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressFrame {
    /// Elapsed share of the budget, capped at 1.0
    pub fraction: f64,
    pub spinner: char,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct ProgressReporter {
    budget: Duration,
    cadence: Duration,
}

impl ProgressReporter {
    pub fn new(budget: Duration, cadence: Duration) -> Self {
        Self { budget, cadence }
    }

    /// Start animating; `update` runs on the reporter task
    pub fn start<F>(&self, cancel: CancelSignal, mut update: F) -> ReporterHandle
    where
        F: FnMut(ProgressFrame) + Send + 'static,
    {
        let budget = self.budget;
        let cadence = self.cadence;
        let signal = cancel.clone();
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = Ticker::new(cadence);
            let mut frames = 0usize;
            loop {
                ticker.tick().await;
                if signal.is_cancelled() {
                    break;
                }
                let elapsed = started.elapsed();
                let fraction = if budget.is_zero() {
                    1.0
                } else {
                    (elapsed.as_secs_f64() / budget.as_secs_f64()).min(1.0)
                };
                update(ProgressFrame {
                    fraction,
                    spinner: SPINNER_FRAMES[frames % SPINNER_FRAMES.len()],
                    elapsed,
                });
                frames += 1;
            }
            frames
        });
        ReporterHandle { cancel, task }
    }

    /// Start animating onto a shared display
    pub fn start_on(&self, cancel: CancelSignal, display: SharedDisplay) -> ReporterHandle {
        self.start(cancel, move |frame| {
            let mut display = lock_display(&display);
            display.draw_progress(frame.fraction, frame.spinner);
            if let Err(e) = display.flush() {
                debug!("Progress draw failed: {}", e);
            }
        })
    }
}

pub struct ReporterHandle {
    cancel: CancelSignal,
    task: JoinHandle<usize>,
}

impl ReporterHandle {
    /// Signal the reporter and wait up to `grace` for it to exit
    ///
    /// Returns the number of frames drawn, or `None` if the task was
    /// abandoned.
    pub async fn stop(self, grace: Duration) -> Option<usize> {
        self.cancel.cancel();
        match time::timeout(grace, self.task).await {
            Ok(Ok(frames)) => Some(frames),
            Ok(Err(e)) => {
                warn!("Progress reporter task failed: {}", e);
                None
            }
            Err(_) => {
                warn!("Progress reporter did not stop within {:?}; abandoning it", grace);
                None
            }
        }
    }
}
