//! Per-identifier fixed-window record.

use std::time::{Duration, Instant};

/// Outcome of applying one request to a window record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request fits in the window
    Allowed,
    /// The window is full; the count was left untouched
    Rejected,
}

impl Admission {
    /// Whether the request was admitted.
    pub fn is_allowed(self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Request count for one identifier within its current window.
///
/// `count` starts at 1 (the request that opened the window) and never grows
/// past the policy's `max_requests` while the window is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRecord {
    count: u32,
    reset_at: Instant,
}

impl WindowRecord {
    /// Open a fresh window for a first request at `now`.
    pub fn open(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now + window,
        }
    }

    /// Apply one request arriving at `now`.
    ///
    /// An expired window is replaced by a fresh one. A full window rejects
    /// without incrementing.
    pub fn admit(&mut self, now: Instant, window: Duration, max_requests: u32) -> Admission {
        if self.is_expired(now) {
            *self = Self::open(now, window);
            return Admission::Allowed;
        }

        if self.count >= max_requests {
            return Admission::Rejected;
        }

        self.count += 1;
        Admission::Allowed
    }

    /// The window is over once `now` is strictly past `reset_at`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.reset_at
    }

    /// Whether the periodic sweep may drop this record.
    pub fn is_sweepable(&self, now: Instant) -> bool {
        self.reset_at < now
    }

    /// Requests counted in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// When the current window ends.
    pub fn reset_at(&self) -> Instant {
        self.reset_at
    }

    /// Time left until the window ends, zero once it has.
    pub fn time_until_reset(&self, now: Instant) -> Duration {
        self.reset_at.saturating_duration_since(now)
    }

    /// Requests still admissible in the current window.
    pub fn remaining(&self, now: Instant, max_requests: u32) -> u32 {
        if self.is_expired(now) {
            max_requests
        } else {
            max_requests.saturating_sub(self.count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_open_counts_first_request() {
        let now = Instant::now();
        let record = WindowRecord::open(now, WINDOW);
        assert_eq!(record.count(), 1);
        assert_eq!(record.reset_at(), now + WINDOW);
        assert_eq!(record.remaining(now, 5), 4);
    }

    #[test]
    fn test_admit_until_full_then_reject() {
        let now = Instant::now();
        let mut record = WindowRecord::open(now, WINDOW);

        for _ in 0..4 {
            assert_eq!(record.admit(now, WINDOW, 5), Admission::Allowed);
        }
        assert_eq!(record.count(), 5);

        // Rejections do not increment
        assert_eq!(record.admit(now, WINDOW, 5), Admission::Rejected);
        assert_eq!(record.admit(now, WINDOW, 5), Admission::Rejected);
        assert_eq!(record.count(), 5);
    }

    #[test]
    fn test_boundary_instant_is_still_active() {
        let now = Instant::now();
        let mut record = WindowRecord::open(now, WINDOW);
        record.admit(now, WINDOW, 2);

        // Exactly at reset_at the window has not expired yet
        let boundary = now + WINDOW;
        assert!(!record.is_expired(boundary));
        assert!(!record.is_sweepable(boundary));
        assert_eq!(record.admit(boundary, WINDOW, 2), Admission::Rejected);
    }

    #[test]
    fn test_expired_window_resets() {
        let now = Instant::now();
        let mut record = WindowRecord::open(now, WINDOW);
        record.admit(now, WINDOW, 2);
        assert_eq!(record.admit(now, WINDOW, 2), Admission::Rejected);

        let later = now + WINDOW + Duration::from_millis(1);
        assert!(record.is_expired(later));
        assert_eq!(record.admit(later, WINDOW, 2), Admission::Allowed);
        assert_eq!(record.count(), 1);
        assert_eq!(record.reset_at(), later + WINDOW);
    }

    #[test]
    fn test_time_until_reset_saturates() {
        let now = Instant::now();
        let record = WindowRecord::open(now, WINDOW);
        assert_eq!(record.time_until_reset(now), WINDOW);
        assert_eq!(record.time_until_reset(now + WINDOW * 2), Duration::ZERO);
    }
}
