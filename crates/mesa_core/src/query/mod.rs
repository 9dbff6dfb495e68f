use std::borrow::Borrow;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::domain::{Priority, Report};

pub mod buckets;
pub mod page;
pub mod search;

pub use buckets::{DateBucket, DateRange};
pub use page::{paginate, Page, Pager};
pub use search::SearchInput;

/// A categorical predicate: disabled (`All`) or an exact match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice<T> {
    All,
    Only(T),
}

impl<T> Default for Choice<T> {
    fn default() -> Self {
        Choice::All
    }
}

impl<T> Choice<T> {
    pub fn is_all(&self) -> bool {
        matches!(self, Choice::All)
    }

    pub fn as_only(&self) -> Option<&T> {
        match self {
            Choice::All => None,
            Choice::Only(v) => Some(v),
        }
    }
}

impl Choice<String> {
    /// UI selection text; `"all"` (any case) or blank disables the predicate.
    pub fn from_selection(raw: &str) -> Self {
        let v = raw.trim();
        if v.is_empty() || v.eq_ignore_ascii_case("all") {
            Choice::All
        } else {
            Choice::Only(v.to_string())
        }
    }
}

/// Independent predicates, combined with logical AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub date: Choice<DateBucket>,
    /// Unlike report payloads, filter input must name a known priority.
    #[serde(deserialize_with = "strict_priority")]
    pub priority: Choice<Priority>,
    pub problem_type: Choice<String>,
    /// Membership in the report's department list.
    pub department: Choice<String>,
    pub reported_by: Choice<String>,
    pub assignee: Choice<String>,
    /// Applied (already debounced) search text. Blank disables it.
    pub search: String,
}

impl FilterSpec {
    pub fn is_unfiltered(&self) -> bool {
        self.date.is_all()
            && self.priority.is_all()
            && self.problem_type.is_all()
            && self.department.is_all()
            && self.reported_by.is_all()
            && self.assignee.is_all()
            && self.search.trim().is_empty()
    }
}

fn strict_priority<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Choice<Priority>, D::Error> {
    match Choice::<String>::deserialize(deserializer)? {
        Choice::All => Ok(Choice::All),
        Choice::Only(label) => Priority::parse(&label)
            .map(Choice::Only)
            .ok_or_else(|| D::Error::custom(format!("unknown priority: {label}"))),
    }
}

/// A filter specification with its date bucket resolved against a fixed instant.
#[derive(Debug, Clone)]
pub struct CompiledFilter<'a> {
    spec: &'a FilterSpec,
    range: Option<Option<DateRange>>,
    needle: Option<String>,
}

impl<'a> CompiledFilter<'a> {
    pub fn new(spec: &'a FilterSpec, now: OffsetDateTime, offset: UtcOffset) -> Self {
        let range = spec.date.as_only().map(|b| b.resolve(now, offset));
        let needle = Some(spec.search.trim().to_lowercase()).filter(|s| !s.is_empty());
        Self {
            spec,
            range,
            needle,
        }
    }

    pub fn matches(&self, report: &Report) -> bool {
        if let Some(range) = self.range {
            match range {
                Some(r) if r.contains(report.timestamp) => {}
                _ => return false,
            }
        }
        if let Some(p) = self.spec.priority.as_only() {
            if report.priority != *p {
                return false;
            }
        }
        if let Some(t) = self.spec.problem_type.as_only() {
            if &report.problem_type != t {
                return false;
            }
        }
        if let Some(d) = self.spec.department.as_only() {
            if !report.departments.contains(d) {
                return false;
            }
        }
        if let Some(who) = self.spec.reported_by.as_only() {
            if &report.reported_by != who {
                return false;
            }
        }
        if let Some(a) = self.spec.assignee.as_only() {
            if report.assignee.as_ref() != Some(a) {
                return false;
            }
        }
        if let Some(needle) = &self.needle {
            if !search::matches_search(report, needle) {
                return false;
            }
        }
        true
    }
}

/// Subset of `reports` satisfying every active predicate, in store order.
pub fn filter_reports<'a, R>(
    reports: &'a [R],
    spec: &FilterSpec,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> Vec<&'a Report>
where
    R: Borrow<Report>,
{
    let compiled = CompiledFilter::new(spec, now, offset);
    reports
        .iter()
        .map(<R as Borrow<Report>>::borrow)
        .filter(|r| compiled.matches(r))
        .collect()
}

/// Sort by `timestamp` descending; ties keep their incoming order.
pub fn most_recent_first(view: &mut [&Report]) {
    view.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Filtered and sorted view, the shape fed to the table, KPIs and charts.
pub fn recent_view<'a, R>(
    reports: &'a [R],
    spec: &FilterSpec,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> Vec<&'a Report>
where
    R: Borrow<Report>,
{
    let mut view = filter_reports(reports, spec, now, offset);
    most_recent_first(&mut view);
    view
}
