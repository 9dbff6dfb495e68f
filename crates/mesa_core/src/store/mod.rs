use std::collections::BTreeMap;

use crate::domain::{Report, ReportId};
use crate::mutation::diff::ReportPatch;

/// Entity removed optimistically, kept with its position so a rollback restores it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedReport {
    pub position: usize,
    pub report: Report,
}

/// Current known set of reports; the single source for every derived view.
///
/// Mutators are crate-private: only the refetch routine replaces the contents wholesale and only the
/// mutation coordinator applies optimistic changes or rollbacks.
#[derive(Debug, Clone, Default)]
pub struct ReportStore {
    reports: Vec<Report>,
    revision: u64,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: &ReportId) -> Option<&Report> {
        self.reports.iter().find(|r| &r.id == id)
    }

    pub fn contains(&self, id: &ReportId) -> bool {
        self.get(id).is_some()
    }

    /// Wholesale replacement. Duplicate ids collapse to the last occurrence, kept at the position of
    /// the first.
    pub(crate) fn replace_all(&mut self, incoming: Vec<Report>) {
        let mut slot_by_id: BTreeMap<ReportId, usize> = BTreeMap::new();
        let mut out: Vec<Report> = Vec::with_capacity(incoming.len());
        for report in incoming {
            match slot_by_id.get(&report.id) {
                Some(&idx) => out[idx] = report,
                None => {
                    slot_by_id.insert(report.id.clone(), out.len());
                    out.push(report);
                }
            }
        }
        self.reports = out;
        self.bump();
    }

    /// Insert a server-confirmed entity, replacing any existing entry with the same id.
    pub(crate) fn upsert(&mut self, report: Report) {
        match self.reports.iter_mut().find(|r| r.id == report.id) {
            Some(existing) => *existing = report,
            None => self.reports.push(report),
        }
        self.bump();
    }

    /// Apply a patch in place; returns the pre-patch snapshot.
    pub(crate) fn apply_patch(&mut self, id: &ReportId, patch: &ReportPatch) -> Option<Report> {
        let report = self.reports.iter_mut().find(|r| &r.id == id)?;
        let snapshot = report.clone();
        patch.apply_to(report);
        self.bump();
        Some(snapshot)
    }

    pub(crate) fn remove(&mut self, id: &ReportId) -> Option<RemovedReport> {
        let position = self.reports.iter().position(|r| &r.id == id)?;
        let report = self.reports.remove(position);
        self.bump();
        Some(RemovedReport { position, report })
    }

    /// Put a snapshot back. An entity that reappeared meanwhile (e.g. via refetch) is overwritten.
    pub(crate) fn restore(&mut self, removed: RemovedReport) {
        if let Some(existing) = self.reports.iter_mut().find(|r| r.id == removed.report.id) {
            *existing = removed.report;
        } else {
            let at = removed.position.min(self.reports.len());
            self.reports.insert(at, removed.report);
        }
        self.bump();
    }

    /// Rollback for a failed patch.
    pub(crate) fn revert_to(&mut self, snapshot: Report) {
        self.upsert(snapshot);
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Distinct department names, sorted.
    pub fn department_options(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .reports
            .iter()
            .flat_map(|r| r.departments.iter().cloned())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn problem_type_options(&self) -> Vec<String> {
        self.distinct(|r| Some(r.problem_type.as_str()))
    }

    pub fn reporter_options(&self) -> Vec<String> {
        self.distinct(|r| Some(r.reported_by.as_str()))
    }

    pub fn assignee_options(&self) -> Vec<String> {
        self.distinct(|r| r.assignee.as_deref())
    }

    fn distinct<F>(&self, field: F) -> Vec<String>
    where
        F: Fn(&Report) -> Option<&str>,
    {
        let mut out: Vec<String> = self
            .reports
            .iter()
            .filter_map(|r| field(r))
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::sample_report;
    use crate::domain::Priority;

    #[test]
    fn replace_all_is_last_write_wins() {
        let mut store = ReportStore::new();
        let mut dup = sample_report("1", "2025-06-10T09:00:00Z");
        dup.description = "segunda versión del mismo reporte".to_string();
        store.replace_all(vec![
            sample_report("1", "2025-06-09T09:00:00Z"),
            sample_report("2", "2025-06-09T10:00:00Z"),
            dup.clone(),
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.reports()[0], dup);
    }

    #[test]
    fn remove_and_restore_keep_position() {
        let mut store = ReportStore::new();
        store.replace_all(vec![
            sample_report("1", "2025-06-09T09:00:00Z"),
            sample_report("2", "2025-06-09T10:00:00Z"),
            sample_report("3", "2025-06-09T11:00:00Z"),
        ]);
        let before = store.reports().to_vec();
        let removed = store.remove(&ReportId::from("2")).expect("present");
        assert_eq!(removed.position, 1);
        assert!(!store.contains(&ReportId::from("2")));
        store.restore(removed);
        assert_eq!(store.reports(), before.as_slice());
    }

    #[test]
    fn apply_patch_returns_snapshot_and_bumps_revision() {
        let mut store = ReportStore::new();
        store.replace_all(vec![sample_report("1", "2025-06-09T09:00:00Z")]);
        let rev = store.revision();
        let patch = ReportPatch {
            priority: Some(Priority::Alta),
            ..ReportPatch::default()
        };
        let snapshot = store
            .apply_patch(&ReportId::from("1"), &patch)
            .expect("present");
        assert_eq!(snapshot.priority, Priority::Baja);
        assert_eq!(store.reports()[0].priority, Priority::Alta);
        assert!(store.revision() > rev);
        assert!(store.apply_patch(&ReportId::from("9"), &patch).is_none());
    }
}
