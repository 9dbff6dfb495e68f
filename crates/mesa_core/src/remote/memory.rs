use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::domain::{NewReport, Report, ReportId};
use crate::error::AppError;
use crate::mutation::diff::ReportPatch;

use super::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RemoteOp {
    List,
    Create,
    Patch,
    Delete,
}

#[derive(Debug, Default)]
struct MemoryState {
    reports: Vec<Report>,
    next_id: u64,
    calls: BTreeMap<RemoteOp, usize>,
    patches: Vec<(ReportId, ReportPatch)>,
    scripted_failures: BTreeMap<RemoteOp, VecDeque<AppError>>,
    reject_descriptions_containing: Option<String>,
}

/// In-memory remote collection with scripted failures, used by tests and the demo.
///
/// Like the real service it trims free-text fields it stores, so a reconciliation refetch can observe
/// server-side normalization.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reports(reports: Vec<Report>) -> Self {
        let remote = Self::new();
        remote.seed(reports);
        remote
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Replace the stored collection; numeric ids advance the id counter past them.
    pub fn seed(&self, reports: Vec<Report>) {
        let mut state = self.lock();
        let max_numeric = reports
            .iter()
            .filter_map(|r| r.id.as_str().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        state.next_id = state.next_id.max(max_numeric);
        state.reports = reports;
    }

    pub fn snapshot(&self) -> Vec<Report> {
        self.lock().reports.clone()
    }

    pub fn get(&self, id: &ReportId) -> Option<Report> {
        self.lock().reports.iter().find(|r| &r.id == id).cloned()
    }

    /// Out-of-band removal, as if another user deleted the report.
    pub fn remove_silently(&self, id: &ReportId) {
        self.lock().reports.retain(|r| &r.id != id);
    }

    /// Out-of-band edit, as if another user changed the report.
    pub fn edit_silently(&self, id: &ReportId, patch: &ReportPatch) {
        if let Some(r) = self.lock().reports.iter_mut().find(|r| &r.id == id) {
            patch.apply_to(r);
        }
    }

    /// Queue an error for the next call of `op`.
    pub fn fail_next(&self, op: RemoteOp, err: AppError) {
        self.lock()
            .scripted_failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Every create whose description contains `needle` fails with a server error.
    pub fn reject_descriptions_containing(&self, needle: &str) {
        self.lock().reject_descriptions_containing = Some(needle.to_string());
    }

    pub fn calls(&self, op: RemoteOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn patches(&self) -> Vec<(ReportId, ReportPatch)> {
        self.lock().patches.clone()
    }

    fn begin(&self, op: RemoteOp) -> Result<MutexGuard<'_, MemoryState>, AppError> {
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        if let Some(err) = state
            .scripted_failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(state)
    }
}

fn not_found(id: &ReportId) -> AppError {
    AppError::not_found("REMOTE_REPORT_NOT_FOUND", "Report does not exist")
        .with_details(format!("id={id}"))
}

impl RemoteStore for MemoryRemote {
    fn list(&self) -> Result<Vec<Report>, AppError> {
        let state = self.begin(RemoteOp::List)?;
        Ok(state.reports.clone())
    }

    fn create(&self, payload: &NewReport) -> Result<ReportId, AppError> {
        let mut state = self.begin(RemoteOp::Create)?;
        if let Some(needle) = state.reject_descriptions_containing.as_deref() {
            if payload.description.contains(needle) {
                return Err(AppError::server("REMOTE_CREATE_FAILED", "Server rejected report")
                    .with_details(format!("description contains {needle:?}")));
            }
        }
        state.next_id += 1;
        let id = ReportId::new(state.next_id.to_string());
        let mut report = payload.clone().into_report(id.clone());
        report.description = report.description.trim().to_string();
        state.reports.push(report);
        Ok(id)
    }

    fn patch(&self, id: &ReportId, patch: &ReportPatch) -> Result<(), AppError> {
        let mut state = self.begin(RemoteOp::Patch)?;
        state.patches.push((id.clone(), patch.clone()));
        let report = state
            .reports
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| not_found(id))?;
        patch.apply_to(report);
        report.description = report.description.trim().to_string();
        Ok(())
    }

    fn delete(&self, id: &ReportId) -> Result<(), AppError> {
        let mut state = self.begin(RemoteOp::Delete)?;
        let before = state.reports.len();
        state.reports.retain(|r| &r.id != id);
        if state.reports.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}
