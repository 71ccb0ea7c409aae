//! Reconnect pacing for the supervisory loop.
//!
//! Replaces a blind restart-on-error loop with two pieces of state: an
//! exponential delay with full jitter, and a guard that refuses to keep
//! restarting once failures come too fast.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::Rng as _;

pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    /// Forget past failures after a stretch of healthy running.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Next delay: uniform between the base and the capped exponential,
    /// so a burst of failing instances does not reconnect in lockstep.
    pub fn next_delay(&mut self) -> Duration {
        let ceiling = self
            .base
            .saturating_mul(2u32.saturating_pow(self.attempt))
            .min(self.max);
        self.attempt = self.attempt.saturating_add(1);

        let base_ms = self.base.as_millis() as u64;
        let ceiling_ms = ceiling.as_millis() as u64;
        if ceiling_ms <= base_ms {
            return self.base;
        }

        Duration::from_millis(rand::thread_rng().gen_range(base_ms..=ceiling_ms))
    }
}

pub struct RestartGuard {
    max_restarts: usize,
    window: Duration,
    restarts: VecDeque<Instant>,
}

impl RestartGuard {
    pub fn new(max_restarts: usize, window: Duration) -> Self {
        Self {
            max_restarts,
            window,
            restarts: VecDeque::new(),
        }
    }

    /// Record a restart. Returns false once more than `max_restarts` have
    /// landed inside the sliding window; the caller should give up rather
    /// than keep warm-looping over a persistent fault.
    pub fn note_restart(&mut self) -> bool {
        self.note_restart_at(Instant::now())
    }

    fn note_restart_at(&mut self, now: Instant) -> bool {
        while let Some(oldest) = self.restarts.front() {
            if now.duration_since(*oldest) > self.window {
                self.restarts.pop_front();
            } else {
                break;
            }
        }

        self.restarts.push_back(now);
        self.restarts.len() <= self.max_restarts
    }
}
