//! One-shot timers with absolute deadlines.
//!
//! The engine is driven by a host event loop: every timer holds an absolute
//! monotonic deadline, the host asks for the earliest one via
//! [`crate::routing::RoutingManager::poll_at`] and calls back into
//! [`crate::routing::RoutingManager::poll`] when it passes. Deadlines being
//! absolute means a suspended clock stalls the state machine by at most one
//! period.

use smoltcp::time::Instant;

/// A one-shot timer. Disarmed after it fires; re-armed explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm the timer at `deadline`, replacing any previous deadline.
    pub fn fire_at(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    /// Arm the timer at `deadline` unless it is already armed earlier.
    pub fn fire_at_if_earlier(&mut self, deadline: Instant) {
        match self.deadline {
            Some(current) if current <= deadline => {}
            _ => self.deadline = Some(deadline),
        }
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and report `true` if the timer is due at `now`.
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_fires_once() {
        let mut timer = Timer::new();
        assert!(!timer.take_if_due(Instant::from_secs(10)));

        timer.fire_at(Instant::from_secs(5));
        assert!(timer.is_running());
        assert!(!timer.take_if_due(Instant::from_secs(4)));
        assert!(timer.take_if_due(Instant::from_secs(5)));

        // One-shot: disarmed after firing
        assert!(!timer.is_running());
        assert!(!timer.take_if_due(Instant::from_secs(6)));
    }

    #[test]
    fn test_fire_at_if_earlier() {
        let mut timer = Timer::new();

        timer.fire_at_if_earlier(Instant::from_secs(10));
        assert_eq!(timer.deadline(), Some(Instant::from_secs(10)));

        // Earlier deadline wins
        timer.fire_at_if_earlier(Instant::from_secs(5));
        assert_eq!(timer.deadline(), Some(Instant::from_secs(5)));

        // Later deadline is ignored
        timer.fire_at_if_earlier(Instant::from_secs(8));
        assert_eq!(timer.deadline(), Some(Instant::from_secs(5)));

        // fire_at always replaces
        timer.fire_at(Instant::from_secs(8));
        assert_eq!(timer.deadline(), Some(Instant::from_secs(8)));
    }
}
