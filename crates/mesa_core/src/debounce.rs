use std::time::Duration;

use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Armed { deadline: OffsetDateTime },
    Fired,
}

/// Trailing-edge debounce timer driven by an external clock.
///
/// Each `trigger` pushes the deadline out by the full window. `poll` reports `true` exactly once
/// after the window elapses with no further triggers.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, DebounceState::Armed { .. })
    }

    pub fn trigger(&mut self, now: OffsetDateTime) {
        self.state = DebounceState::Armed {
            deadline: now + self.delay,
        };
    }

    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }

    pub fn poll(&mut self, now: OffsetDateTime) -> bool {
        match self.state {
            DebounceState::Armed { deadline } if now >= deadline => {
                self.state = DebounceState::Fired;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn fires_once_after_quiet_period() {
        let t0 = datetime!(2025-06-10 12:00:00 UTC);
        let ms = |n: u64| t0 + Duration::from_millis(n);
        let mut d = Debouncer::new(Duration::from_millis(500));

        d.trigger(t0);
        d.trigger(ms(300));
        assert!(!d.poll(ms(600)), "window restarted at 300ms");
        assert!(d.poll(ms(800)));
        assert!(!d.poll(ms(900)), "fires only once");
        assert_eq!(d.state(), DebounceState::Fired);
    }

    #[test]
    fn cancel_disarms() {
        let t0 = datetime!(2025-06-10 12:00:00 UTC);
        let mut d = Debouncer::new(Duration::from_millis(500));
        d.trigger(t0);
        d.cancel();
        assert!(!d.poll(t0 + Duration::from_secs(5)));
        assert_eq!(d.state(), DebounceState::Idle);
    }
}
