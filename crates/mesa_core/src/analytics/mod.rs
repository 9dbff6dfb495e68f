use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::{UtcOffset, Weekday};

use crate::domain::{Priority, Report, ReportId, Status};

pub const DASHBOARD_PAYLOAD_VERSION: u32 = 1;

pub const TOP_N: usize = 10;

const MONTH_LABELS: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];

const WEEKDAY_LABELS: [&str; 5] = ["Lun", "Mar", "Mié", "Jue", "Vie"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Kpis {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub unique_reporters: i64,
    pub unique_problem_types: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryBucket {
    pub key: String,
    pub label: String,
    pub count: i64,
    /// Contributing reports, sorted, for drill-down.
    pub report_ids: Vec<ReportId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthPoint {
    /// 1..=12
    pub month: u8,
    pub label: String,
    pub created: i64,
    pub resolved: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeekdayPoint {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardPayload {
    pub version: u32,
    pub kpis: Kpis,
    pub by_department: Vec<CategoryBucket>,
    pub by_priority: Vec<CategoryBucket>,
    pub by_problem_type: Vec<CategoryBucket>,
    pub by_reporter: Vec<CategoryBucket>,
    pub monthly_trend: Vec<MonthPoint>,
    pub weekday_load: Vec<WeekdayPoint>,
}

pub fn compute_kpis<R: Borrow<Report>>(view: &[R]) -> Kpis {
    let mut kpis = Kpis::default();
    let mut reporters = BTreeSet::new();
    let mut problem_types = BTreeSet::new();
    for r in view.iter().map(<R as Borrow<Report>>::borrow) {
        kpis.total += 1;
        match r.status {
            Status::Pendiente => kpis.pending += 1,
            Status::EnProceso => kpis.in_progress += 1,
            Status::Resuelto => kpis.resolved += 1,
        }
        reporters.insert(r.reported_by.as_str());
        problem_types.insert(r.problem_type.as_str());
    }
    kpis.unique_reporters = reporters.len() as i64;
    kpis.unique_problem_types = problem_types.len() as i64;
    kpis
}

fn group_ids<'a, R, F, I>(view: &'a [R], keys_of: F) -> BTreeMap<String, Vec<ReportId>>
where
    R: Borrow<Report>,
    F: Fn(&'a Report) -> I,
    I: IntoIterator<Item = &'a str>,
{
    let mut map: BTreeMap<String, Vec<ReportId>> = BTreeMap::new();
    for r in view.iter().map(<R as Borrow<Report>>::borrow) {
        for key in keys_of(r) {
            map.entry(key.to_string()).or_default().push(r.id.clone());
        }
    }
    map
}

/// Descending by count, ties by label ascending, truncated to `n`.
fn stable_top_n(prefix: &str, map: BTreeMap<String, Vec<ReportId>>, n: usize) -> Vec<CategoryBucket> {
    let mut out = map
        .into_iter()
        .map(|(label, mut ids)| {
            ids.sort();
            CategoryBucket {
                key: format!("{prefix}:{label}"),
                count: ids.len() as i64,
                label,
                report_ids: ids,
            }
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| (-(a.count), a.label.clone()).cmp(&(-(b.count), b.label.clone())));
    out.truncate(n);
    out
}

/// A report with several departments counts once in each.
pub fn top_departments<R: Borrow<Report>>(view: &[R], n: usize) -> Vec<CategoryBucket> {
    let map = group_ids(view, |r| r.departments.iter().map(String::as_str));
    stable_top_n("department", map, n)
}

pub fn top_problem_types<R: Borrow<Report>>(view: &[R], n: usize) -> Vec<CategoryBucket> {
    let map = group_ids(view, |r| [r.problem_type.as_str()]);
    stable_top_n("problem_type", map, n)
}

pub fn top_reporters<R: Borrow<Report>>(view: &[R], n: usize) -> Vec<CategoryBucket> {
    let map = group_ids(view, |r| [r.reported_by.as_str()]);
    stable_top_n("reporter", map, n)
}

/// Severity order `Baja..Crítica`; empty buckets are omitted.
pub fn priority_distribution<R: Borrow<Report>>(view: &[R]) -> Vec<CategoryBucket> {
    let mut by_priority: BTreeMap<Priority, Vec<ReportId>> = BTreeMap::new();
    for r in view.iter().map(<R as Borrow<Report>>::borrow) {
        by_priority.entry(r.priority).or_default().push(r.id.clone());
    }
    Priority::ALL
        .iter()
        .filter_map(|p| {
            let mut ids = by_priority.remove(p)?;
            ids.sort();
            Some(CategoryBucket {
                key: format!("priority:{}", p.label()),
                label: p.label().to_string(),
                count: ids.len() as i64,
                report_ids: ids,
            })
        })
        .collect()
}

/// Twelve buckets Jan..Dec by the local calendar month of `timestamp`, regardless of year.
pub fn monthly_trend<R: Borrow<Report>>(view: &[R], offset: UtcOffset) -> Vec<MonthPoint> {
    let mut points: Vec<MonthPoint> = MONTH_LABELS
        .iter()
        .zip(1u8..)
        .map(|(label, month)| MonthPoint {
            month,
            label: label.to_string(),
            created: 0,
            resolved: 0,
        })
        .collect();
    for r in view.iter().map(<R as Borrow<Report>>::borrow) {
        let idx = usize::from(r.timestamp.to_offset(offset).month() as u8 - 1);
        if let Some(point) = points.get_mut(idx) {
            point.created += 1;
            if r.status.is_resolved() {
                point.resolved += 1;
            }
        }
    }
    points
}

/// Five buckets Mon..Fri by local weekday; weekend reports are left out.
pub fn weekday_load<R: Borrow<Report>>(view: &[R], offset: UtcOffset) -> Vec<WeekdayPoint> {
    let mut counts = [0i64; 5];
    for r in view.iter().map(<R as Borrow<Report>>::borrow) {
        let weekday = r.timestamp.to_offset(offset).weekday();
        if matches!(weekday, Weekday::Saturday | Weekday::Sunday) {
            continue;
        }
        counts[usize::from(weekday.number_days_from_monday())] += 1;
    }
    WEEKDAY_LABELS
        .iter()
        .zip(counts)
        .map(|(label, count)| WeekdayPoint {
            label: label.to_string(),
            count,
        })
        .collect()
}

pub fn build_dashboard_payload<R: Borrow<Report>>(view: &[R], offset: UtcOffset) -> DashboardPayload {
    DashboardPayload {
        version: DASHBOARD_PAYLOAD_VERSION,
        kpis: compute_kpis(view),
        by_department: top_departments(view, TOP_N),
        by_priority: priority_distribution(view),
        by_problem_type: top_problem_types(view, TOP_N),
        by_reporter: top_reporters(view, TOP_N),
        monthly_trend: monthly_trend(view, offset),
        weekday_load: weekday_load(view, offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::sample_report;
    use crate::domain::Departments;
    use pretty_assertions::assert_eq;
    use time::macros::offset;

    #[test]
    fn empty_view_is_zero_filled_and_well_shaped() {
        let view: Vec<Report> = Vec::new();
        let dash = build_dashboard_payload(&view, offset!(UTC));
        assert_eq!(dash.kpis, Kpis::default());
        assert!(dash.by_department.is_empty());
        assert!(dash.by_priority.is_empty());
        assert_eq!(dash.monthly_trend.len(), 12);
        assert!(dash.monthly_trend.iter().all(|p| p.created == 0 && p.resolved == 0));
        assert_eq!(dash.weekday_load.len(), 5);
        assert!(dash.weekday_load.iter().all(|p| p.count == 0));
    }

    #[test]
    fn departments_count_per_membership_and_break_ties_by_label() {
        let mut a = sample_report("1", "2025-06-10T09:00:00Z");
        a.departments = Departments::parse_text("Obras, Catastro").expect("dept");
        let mut b = sample_report("2", "2025-06-10T09:00:00Z");
        b.departments = Departments::single("Obras").expect("dept");
        let c = sample_report("3", "2025-06-10T09:00:00Z");

        let buckets = top_departments(&[a, b, c], TOP_N);
        let got: Vec<(String, i64)> = buckets.iter().map(|b| (b.label.clone(), b.count)).collect();
        assert_eq!(
            got,
            vec![("Catastro".to_string(), 2), ("Obras".to_string(), 2)]
        );
        assert_eq!(buckets[0].report_ids, vec![ReportId::from("1"), ReportId::from("3")]);
    }

    #[test]
    fn top_n_truncates() {
        let view: Vec<Report> = (0..15)
            .map(|i| {
                let mut r = sample_report(&i.to_string(), "2025-06-10T09:00:00Z");
                r.reported_by = format!("Persona {i:02}");
                r
            })
            .collect();
        let top = top_reporters(&view, TOP_N);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].label, "Persona 00");
    }

    #[test]
    fn priority_distribution_skips_empty_buckets_in_severity_order() {
        let mut a = sample_report("1", "2025-06-10T09:00:00Z");
        a.priority = Priority::Critica;
        let b = sample_report("2", "2025-06-10T09:00:00Z");
        let labels: Vec<String> = priority_distribution(&[a, b])
            .into_iter()
            .map(|b| b.label)
            .collect();
        assert_eq!(labels, vec!["Baja".to_string(), "Crítica".to_string()]);
    }

    #[test]
    fn trend_groups_by_month_across_years_and_tracks_resolved() {
        let mut a = sample_report("1", "2024-06-03T09:00:00Z");
        a.status = Status::Resuelto;
        let b = sample_report("2", "2025-06-10T09:00:00Z");
        let c = sample_report("3", "2025-01-31T23:30:00Z");
        let trend = monthly_trend(&[&a, &b, &c], offset!(UTC));
        assert_eq!((trend[5].created, trend[5].resolved), (2, 1));
        assert_eq!(trend[0].created, 1);
        // Same instant lands in February one hour east.
        let shifted = monthly_trend(&[&c], offset!(+1));
        assert_eq!((shifted[0].created, shifted[1].created), (0, 1));
    }

    #[test]
    fn weekday_load_ignores_weekends() {
        let mon = sample_report("1", "2025-06-09T09:00:00Z");
        let tue = sample_report("2", "2025-06-10T09:00:00Z");
        let sat = sample_report("3", "2025-06-14T09:00:00Z");
        let load = weekday_load(&[mon, tue, sat], offset!(UTC));
        let counts: Vec<i64> = load.iter().map(|p| p.count).collect();
        assert_eq!(counts, vec![1, 1, 0, 0, 0]);
        assert_eq!(load[2].label, "Mié");
    }
}
