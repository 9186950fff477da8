//! Admission window state.

use std::time::Duration;
use tokio::time::Instant;

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call was counted against the current window.
    Granted {
        /// Admissions in the window, including this one
        admitted: u32,
    },
    /// The window is full; nothing was counted.
    Saturated {
        /// When the current window expires
        resets_at: Instant,
    },
}

/// Point-in-time view of a limiter's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Maximum admissions per window
    pub limit: u32,
    /// Window length
    pub window: Duration,
    /// Admissions counted in the current window
    pub admitted_count: u32,
    /// Admissions left before the window saturates
    pub remaining: u32,
    /// Time until the current window expires
    pub until_reset: Duration,
    /// Every admission granted over the limiter's lifetime
    pub total_admitted: u64,
    /// Admissions that had to wait for capacity
    pub total_delayed: u64,
}

/// Counts admissions within a lazily rolled window.
///
/// The window never resets on its own. It rolls over when a check observes
/// that `window` has elapsed since `started_at`, or when a saturated caller
/// restarts it after waiting.
#[derive(Debug)]
pub struct AdmissionWindow {
    limit: u32,
    window: Duration,
    admitted: u32,
    started_at: Instant,
    total_admitted: u64,
    total_delayed: u64,
}

impl AdmissionWindow {
    /// Create a window that starts at `now`.
    pub fn new(limit: u32, window: Duration, now: Instant) -> Self {
        Self {
            limit,
            window,
            admitted: 0,
            started_at: now,
            total_admitted: 0,
            total_delayed: 0,
        }
    }

    /// Roll over, then count one admission if there is room.
    pub fn try_admit(&mut self, now: Instant) -> Admission {
        self.maybe_roll_over(now);

        if self.admitted >= self.limit {
            return Admission::Saturated {
                resets_at: self.started_at + self.window,
            };
        }

        self.admitted += 1;
        self.total_admitted += 1;
        Admission::Granted {
            admitted: self.admitted,
        }
    }

    /// Restart the window at `now` and count one admission unconditionally.
    ///
    /// Used after a saturated caller has slept a full window.
    pub fn restart_and_admit(&mut self, now: Instant) -> u32 {
        self.restart(now);
        self.admitted = 1;
        self.total_admitted += 1;
        self.admitted
    }

    /// Record that an admission had to wait.
    pub fn record_delay(&mut self) {
        self.total_delayed += 1;
    }

    /// Admissions counted in the current window, as of `now`.
    pub fn admitted(&self, now: Instant) -> u32 {
        if self.has_elapsed(now) {
            0
        } else {
            self.admitted
        }
    }

    /// View of the window as of `now`. Does not roll the window over.
    pub fn snapshot(&self, now: Instant) -> WindowSnapshot {
        let admitted_count = self.admitted(now);
        let until_reset = if self.has_elapsed(now) {
            Duration::ZERO
        } else {
            (self.started_at + self.window).saturating_duration_since(now)
        };

        WindowSnapshot {
            limit: self.limit,
            window: self.window,
            admitted_count,
            remaining: self.limit.saturating_sub(admitted_count),
            until_reset,
            total_admitted: self.total_admitted,
            total_delayed: self.total_delayed,
        }
    }

    fn has_elapsed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.window
    }

    fn maybe_roll_over(&mut self, now: Instant) {
        if self.has_elapsed(now) {
            self.restart(now);
        }
    }

    fn restart(&mut self, now: Instant) {
        self.admitted = 0;
        // The window start only ever moves forward.
        if now > self.started_at {
            self.started_at = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(5);

    #[test]
    fn test_admits_up_to_limit() {
        let t0 = Instant::now();
        let mut window = AdmissionWindow::new(3, WINDOW, t0);

        assert_eq!(window.try_admit(t0), Admission::Granted { admitted: 1 });
        assert_eq!(window.try_admit(t0), Admission::Granted { admitted: 2 });
        assert_eq!(window.try_admit(t0), Admission::Granted { admitted: 3 });
        assert_eq!(
            window.try_admit(t0),
            Admission::Saturated {
                resets_at: t0 + WINDOW
            }
        );
        assert_eq!(window.admitted(t0), 3);
    }

    #[test]
    fn test_saturated_check_does_not_count() {
        let t0 = Instant::now();
        let mut window = AdmissionWindow::new(1, WINDOW, t0);

        window.try_admit(t0);
        for _ in 0..5 {
            assert!(matches!(
                window.try_admit(t0),
                Admission::Saturated { .. }
            ));
        }

        let snapshot = window.snapshot(t0);
        assert_eq!(snapshot.admitted_count, 1);
        assert_eq!(snapshot.total_admitted, 1);
    }

    #[test]
    fn test_rolls_over_once_window_elapsed() {
        let t0 = Instant::now();
        let mut window = AdmissionWindow::new(2, WINDOW, t0);

        window.try_admit(t0);
        window.try_admit(t0);

        let just_before = t0 + WINDOW - Duration::from_millis(1);
        assert!(matches!(
            window.try_admit(just_before),
            Admission::Saturated { .. }
        ));

        // Elapsed exactly equal to the window counts as expired
        let at_boundary = t0 + WINDOW;
        assert_eq!(
            window.try_admit(at_boundary),
            Admission::Granted { admitted: 1 }
        );

        // The new window starts where the rollover was observed
        assert_eq!(
            window.snapshot(at_boundary).until_reset,
            WINDOW
        );
    }

    #[test]
    fn test_rollover_is_lazy() {
        let t0 = Instant::now();
        let mut window = AdmissionWindow::new(2, WINDOW, t0);

        window.try_admit(t0);

        // Long after expiry the next check defines the new window start
        let late = t0 + Duration::from_secs(12);
        window.try_admit(late);
        let snapshot = window.snapshot(late + Duration::from_secs(1));
        assert_eq!(snapshot.admitted_count, 1);
        assert_eq!(snapshot.until_reset, Duration::from_secs(4));
    }

    #[test]
    fn test_restart_and_admit() {
        let t0 = Instant::now();
        let mut window = AdmissionWindow::new(2, WINDOW, t0);

        window.try_admit(t0);
        window.try_admit(t0);

        let after_wait = t0 + WINDOW;
        assert_eq!(window.restart_and_admit(after_wait), 1);
        window.record_delay();

        let snapshot = window.snapshot(after_wait);
        assert_eq!(snapshot.admitted_count, 1);
        assert_eq!(snapshot.remaining, 1);
        assert_eq!(snapshot.total_admitted, 3);
        assert_eq!(snapshot.total_delayed, 1);
    }

    #[test]
    fn test_window_start_never_moves_backwards() {
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(2);
        let mut window = AdmissionWindow::new(1, WINDOW, later);

        // A restart observed with an older timestamp keeps the newer start
        window.restart_and_admit(t0);
        assert_eq!(window.snapshot(later).until_reset, WINDOW);
    }

    #[test]
    fn test_snapshot_does_not_roll_over() {
        let t0 = Instant::now();
        let mut window = AdmissionWindow::new(2, WINDOW, t0);
        window.try_admit(t0);

        let expired = t0 + WINDOW + Duration::from_secs(1);
        let snapshot = window.snapshot(expired);
        assert_eq!(snapshot.admitted_count, 0);
        assert_eq!(snapshot.remaining, 2);
        assert_eq!(snapshot.until_reset, Duration::ZERO);

        // Still the old window internally until the next check
        assert_eq!(window.snapshot(t0).admitted_count, 1);
    }
}
