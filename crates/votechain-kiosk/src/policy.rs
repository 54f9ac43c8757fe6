//! Deadlines and bounded attempts
//!
//! Every blocking wait in the kiosk is one of two shapes: a polling loop
//! driven by a [`Ticker`] that gives up at a [`Deadline`], or a single future
//! wrapped in [`bounded`]. Neither retries; retry counts belong to the
//! session machine.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use votechain_core::{Fault, Outcome};

/// A hard point in time after which a wait gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(duration: Duration) -> Self {
        Self(Instant::now() + duration)
    }

    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.0
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// The sooner of two deadlines
    pub fn earliest(self, other: Deadline) -> Deadline {
        self.min(other)
    }
}

/// Fixed-period ticker for polling loops
///
/// The first tick completes immediately. A tick that could not be taken on
/// time is delayed rather than bursted, so a slow device read never causes
/// back-to-back samples.
pub struct Ticker {
    interval: Interval,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Run one attempt with a hard timeout
pub async fn bounded<T, F>(timeout: Duration, action: F) -> Outcome<T>
where
    F: Future<Output = Result<T, Fault>>,
{
    match time::timeout(timeout, action).await {
        Ok(result) => result.into(),
        Err(_) => Outcome::TimedOut,
    }
}
