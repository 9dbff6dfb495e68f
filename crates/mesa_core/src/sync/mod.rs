use std::time::Duration;

use time::OffsetDateTime;

/// Periodic refetch bookkeeping: at most one refetch in flight, extra requests are coalesced.
#[derive(Debug, Clone)]
pub struct RefetchScheduler {
    interval: Duration,
    last_completed: Option<OffsetDateTime>,
    requested: bool,
    in_flight: bool,
    coalesced: u64,
}

impl RefetchScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_completed: None,
            requested: false,
            in_flight: false,
            coalesced: 0,
        }
    }

    /// Ask for a refetch at the next opportunity. Repeated requests collapse into one.
    pub fn request(&mut self) {
        self.requested = true;
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Requests folded into an in-flight refetch so far.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    pub fn last_completed(&self) -> Option<OffsetDateTime> {
        self.last_completed
    }

    /// A refetch was requested, or the poll interval elapsed (or none ever ran).
    pub fn is_due(&self, now: OffsetDateTime) -> bool {
        self.requested
            || self
                .last_completed
                .map_or(true, |last| now >= last + self.interval)
    }

    /// Claim the in-flight slot. When one is already running the request is remembered instead.
    pub fn try_begin(&mut self) -> bool {
        if self.in_flight {
            self.requested = true;
            self.coalesced += 1;
            return false;
        }
        self.in_flight = true;
        self.requested = false;
        true
    }

    /// Release the slot; failed refetches also count as completed, the next poll retries.
    pub fn finish(&mut self, now: OffsetDateTime) {
        self.in_flight = false;
        self.last_completed = Some(now);
    }
}
