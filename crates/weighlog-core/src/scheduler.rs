//! Deadline-based periodic tick source.
//!
//! The scheduler does not sleep or spawn anything. The engine asks how long
//! until the next tick, waits on its command channel for at most that long,
//! and then polls. A tick is due when the monotonic clock has reached the
//! deadline; the next deadline is computed only after the caller polls
//! again, so ticks never overlap.

use std::time::{Duration, Instant};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2_000);

#[derive(Debug, Clone)]
pub struct SamplingScheduler {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Default for SamplingScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl SamplingScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Activate with the first tick due immediately.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Change the interval and restart. The first tick at the new cadence is
    /// one full interval from `now`.
    pub fn restart(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        self.next_due = Some(now + interval);
    }

    /// Change the interval without touching the active state.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left before the next tick, `None` when stopped.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    /// Returns `true` if a tick is due and advances the deadline.
    ///
    /// When more than one interval has been missed the backlog is dropped and
    /// the next deadline is one interval from `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }
        let next = due + self.interval;
        self.next_due = Some(if next <= now {
            let missed = (now - due).as_nanos() / self.interval.as_nanos().max(1);
            log::debug!("scheduler fell behind, skipping {missed} tick(s)");
            now + self.interval
        } else {
            next
        });
        true
    }
}
