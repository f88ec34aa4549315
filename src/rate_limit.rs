//! Sliding-window admission control for conversions.
//!
//! A [`RateLimiter`] keeps the instants of recently admitted conversions in
//! time order. Before every check, entries older than the window are pruned
//! from the front; there is no background timer. Callers pass `now`
//! explicitly.
//!
//! The window lives behind a mutex so a limiter can be shared (`Arc`) by
//! several converters without [`RateLimiter::reserve`] ever over-admitting.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// At most `max_admissions` conversions per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub max_admissions: usize,
    pub window: Duration,
}

impl RatePolicy {
    pub fn new(max_admissions: usize, window: Duration) -> Self {
        Self {
            max_admissions,
            window,
        }
    }
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self::new(20, Duration::from_secs(60))
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    policy: RatePolicy,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(policy: RatePolicy) -> Self {
        Self {
            policy,
            admitted: Mutex::new(VecDeque::new()),
        }
    }

    pub fn policy(&self) -> RatePolicy {
        self.policy
    }

    /// Whether one more conversion would be admitted at `now`. Does not record.
    pub fn has_capacity(&self, now: Instant) -> bool {
        let mut admitted = self.lock();
        self.prune(&mut admitted, now);
        admitted.len() < self.policy.max_admissions
    }

    /// Record an admission at `now` if the window has room.
    ///
    /// Returns `false`, without recording, when the window is full.
    pub fn reserve(&self, now: Instant) -> bool {
        let mut admitted = self.lock();
        self.prune(&mut admitted, now);
        if admitted.len() >= self.policy.max_admissions {
            return false;
        }
        admitted.push_back(now);
        true
    }

    /// Number of admissions still inside the window at `now`.
    pub fn in_window(&self, now: Instant) -> usize {
        let mut admitted = self.lock();
        self.prune(&mut admitted, now);
        admitted.len()
    }

    /// Forget every recorded admission.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.admitted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(&self, admitted: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = admitted.front() {
            if now.saturating_duration_since(oldest) > self.policy.window {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RatePolicy::default())
    }
}
