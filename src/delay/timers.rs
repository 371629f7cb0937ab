//! The controller's timer set.
//!
//! All three timers live in one owning structure so that a single
//! [`Timers::clear`] tears every one of them down. Timers are plain tokio
//! futures polled by the controller's loop; clearing drops them, so nothing
//! can fire afterwards.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};

/// Which timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    /// The idle timer elapsed; carries its configured duration.
    Timeout(Duration),
    InitialDelay,
    Tick,
}

#[derive(Debug, Default)]
pub struct Timers {
    timeout: Option<(Pin<Box<Sleep>>, Duration)>,
    initial_delay: Option<(Pin<Box<Sleep>>, Duration)>,
    poll: Option<Interval>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the idle timer. Replaces any previous one.
    pub fn arm_timeout(&mut self, after: Duration) {
        self.timeout = Some((Box::pin(tokio::time::sleep(after)), after));
    }

    /// Arms the one-shot that precedes the heartbeat; once it fires the
    /// heartbeat interval starts with period `interval`.
    pub fn arm_initial_delay(&mut self, delay: Duration, interval: Duration) {
        self.poll = None;
        self.initial_delay = Some((Box::pin(tokio::time::sleep(delay)), interval));
    }

    fn begin_poll(&mut self, from: Instant, interval: Duration) {
        // tokio rejects a zero period
        let interval = interval.max(Duration::from_millis(1));
        let first = from.checked_add(interval).unwrap_or_else(|| far_future(from));
        let mut ticker = tokio::time::interval_at(first, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.poll = Some(ticker);
    }

    /// Configured idle timeout, if armed.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.as_ref().map(|(_, d)| *d)
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }

    pub fn is_idle(&self) -> bool {
        self.timeout.is_none() && self.initial_delay.is_none() && self.poll.is_none()
    }

    /// Cancels every live timer.
    pub fn clear(&mut self) {
        self.timeout = None;
        self.initial_delay = None;
        self.poll = None;
    }

    /// Waits for the next timer to fire. Pends forever when none is armed.
    ///
    /// The idle timer is disarmed when it fires. When the initial delay
    /// fires the heartbeat interval takes its place.
    pub async fn next(&mut self) -> Fired {
        let fired = {
            let Timers {
                timeout,
                initial_delay,
                poll,
            } = self;

            tokio::select! {
                biased;
                after = sleep_on(timeout) => Fired::Timeout(after),
                _ = sleep_on(initial_delay) => Fired::InitialDelay,
                _ = tick_on(poll) => Fired::Tick,
            }
        };

        match fired {
            Fired::Timeout(_) => self.timeout = None,
            Fired::InitialDelay => {
                if let Some((sleep, interval)) = self.initial_delay.take() {
                    self.begin_poll(sleep.deadline(), interval);
                }
            }
            Fired::Tick => {}
        }
        fired
    }
}

/// Roughly 30 years out, the same horizon tokio saturates `sleep` to.
fn far_future(from: Instant) -> Instant {
    let horizon = Duration::from_secs(86_400 * 365 * 30);
    from.checked_add(horizon).unwrap_or(from)
}

async fn sleep_on(slot: &mut Option<(Pin<Box<Sleep>>, Duration)>) -> Duration {
    match slot {
        Some((sleep, span)) => {
            sleep.as_mut().await;
            *span
        }
        None => std::future::pending().await,
    }
}

async fn tick_on(slot: &mut Option<Interval>) {
    match slot {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
