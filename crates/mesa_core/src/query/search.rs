use std::time::Duration;

use time::OffsetDateTime;

use crate::debounce::Debouncer;
use crate::domain::Report;

/// Case-insensitive substring test over id, departments, description, problem type, reporter,
/// assignee and status, in that order. `needle` must already be lowercase.
pub fn matches_search(report: &Report, needle: &str) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(needle);
    contains(report.id.as_str())
        || contains(&report.departments.joined())
        || contains(&report.description)
        || contains(&report.problem_type)
        || contains(&report.reported_by)
        || report.assignee.as_deref().is_some_and(contains)
        || contains(report.status.label())
}

/// Search box state: keystrokes update `pending`, the debounced value lands in `applied`.
#[derive(Debug, Clone)]
pub struct SearchInput {
    pending: String,
    applied: String,
    timer: Debouncer,
}

impl SearchInput {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: String::new(),
            applied: String::new(),
            timer: Debouncer::new(delay),
        }
    }

    pub fn input(&mut self, text: &str, now: OffsetDateTime) {
        self.pending = text.to_string();
        self.timer.trigger(now);
    }

    /// Returns `true` when the applied text changed on this poll.
    pub fn poll(&mut self, now: OffsetDateTime) -> bool {
        if !self.timer.poll(now) {
            return false;
        }
        if self.applied == self.pending {
            return false;
        }
        self.applied = self.pending.clone();
        true
    }

    /// Clear both values immediately (e.g. "reset filters").
    pub fn clear(&mut self) {
        self.pending.clear();
        self.applied.clear();
        self.timer.cancel();
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn applied(&self) -> &str {
        &self.applied
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }
}
