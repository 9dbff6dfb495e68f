use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::auth::{AccessPolicy, Session};
use crate::debounce::Debouncer;
use crate::domain::{NewReport, Report, ReportId};
use crate::error::AppError;
use crate::notice::{Notice, NoticeLevel};
use crate::remote::RemoteStore;
use crate::store::ReportStore;
use crate::sync::RefetchScheduler;
use crate::validate::ensure_valid_new_report;

pub mod diff;

pub use diff::{compute_patch, FieldChange, ReportPatch};

/// Observable edit lifecycle. At most one report is ever outside `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum EditState {
    Idle,
    /// Draft open, no timer armed.
    Editing(ReportId),
    /// Draft changed; autosave timer armed.
    AutosavePending(ReportId),
    /// Patch request in flight.
    Saving(ReportId),
    /// Last save failed; reverts to `Idle` after the display timeout.
    Error(ReportId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Editing,
    AutosavePending,
    Saving,
}

#[derive(Debug, Clone)]
struct EditSession {
    id: ReportId,
    draft: Report,
    /// Wire names of the fields edited in this session; only these are ever patched.
    touched: BTreeSet<&'static str>,
    phase: Phase,
}

#[derive(Debug, Clone)]
struct FailedSave {
    id: ReportId,
    error: AppError,
    since: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Autosave,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved {
        id: ReportId,
        fields: Vec<&'static str>,
    },
    /// Draft matched the baseline; no request was sent.
    NothingToSave,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Remote reported the entity missing; the local removal stands and a refetch is queued.
    AlreadyGone,
}

/// Everything a mutation touches, borrowed from the engine for the duration of one call.
pub struct MutationContext<'a, R: RemoteStore + ?Sized> {
    pub remote: &'a R,
    pub store: &'a mut ReportStore,
    pub policy: &'a AccessPolicy,
    pub session: &'a Session,
    pub refetch: &'a mut RefetchScheduler,
    pub notices: &'a mut Vec<Notice>,
    pub now: OffsetDateTime,
}

impl<R: RemoteStore + ?Sized> MutationContext<'_, R> {
    fn gate(&mut self, action: &str) -> Result<(), AppError> {
        self.policy
            .require_mutation(self.session, action)
            .map_err(|e| self.report(e))
    }

    /// Record the user-facing notice for `err` and hand it back.
    fn report(&mut self, err: AppError) -> AppError {
        self.notices.push(Notice::from_error(&err));
        err
    }
}

/// Coordinates inline edits, creates and deletes against the remote collection.
///
/// Local changes are applied optimistically to the store, then confirmed or rolled back from an
/// explicit snapshot. A single edit session exists at a time, and its autosave timer is cancelled
/// whenever the session is collapsed.
#[derive(Debug, Clone)]
pub struct MutationCoordinator {
    session: Option<EditSession>,
    failed: Option<FailedSave>,
    autosave: Debouncer,
    error_display: Duration,
}

impl MutationCoordinator {
    pub fn new(autosave_delay: Duration, error_display: Duration) -> Self {
        Self {
            session: None,
            failed: None,
            autosave: Debouncer::new(autosave_delay),
            error_display,
        }
    }

    pub fn state(&self) -> EditState {
        if let Some(s) = &self.session {
            let id = s.id.clone();
            return match s.phase {
                Phase::Editing => EditState::Editing(id),
                Phase::AutosavePending => EditState::AutosavePending(id),
                Phase::Saving => EditState::Saving(id),
            };
        }
        match &self.failed {
            Some(f) => EditState::Error(f.id.clone()),
            None => EditState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// The in-progress draft; views show it in place of the stored row.
    pub fn draft(&self) -> Option<&Report> {
        self.session.as_ref().map(|s| &s.draft)
    }

    pub fn last_error(&self) -> Option<&AppError> {
        self.failed.as_ref().map(|f| &f.error)
    }

    pub fn autosave_armed(&self) -> bool {
        self.autosave.is_armed()
    }

    /// Open a session on `id`, collapsing any previous one without saving it.
    pub fn begin_edit<R: RemoteStore + ?Sized>(
        &mut self,
        ctx: &mut MutationContext<'_, R>,
        id: &ReportId,
    ) -> Result<(), AppError> {
        ctx.gate("edit")?;
        self.collapse();
        let Some(current) = ctx.store.get(id) else {
            return Err(ctx.report(
                AppError::not_found("EDIT_REPORT_NOT_FOUND", "Report is no longer available")
                    .with_details(format!("id={id}")),
            ));
        };
        debug!(%id, "edit session opened");
        self.failed = None;
        self.session = Some(EditSession {
            id: id.clone(),
            draft: current.clone(),
            touched: BTreeSet::new(),
            phase: Phase::Editing,
        });
        Ok(())
    }

    /// Apply one field edit to the draft and restart the autosave window.
    pub fn change(&mut self, change: &FieldChange, now: OffsetDateTime) -> Result<(), AppError> {
        let Some(session) = self.session.as_mut() else {
            return Err(AppError::validation(
                "EDIT_NO_SESSION",
                "No report is being edited",
            ));
        };
        if !change.apply_to(&mut session.draft) {
            return Err(AppError::validation(
                "EDIT_INVALID_FIELD",
                "At least one department is required",
            ));
        }
        session.touched.insert(change.field());
        session.phase = Phase::AutosavePending;
        self.autosave.trigger(now);
        Ok(())
    }

    /// Drop the draft and any armed timer. No network call; the row shows the stored baseline again.
    pub fn cancel(&mut self) {
        self.collapse();
    }

    fn collapse(&mut self) {
        self.autosave.cancel();
        if let Some(prev) = self.session.take() {
            debug!(id = %prev.id, "edit session collapsed");
        }
    }

    /// Drive timers: error auto-revert, then autosave. Returns the save result when autosave fired.
    pub fn poll<R: RemoteStore + ?Sized>(
        &mut self,
        ctx: &mut MutationContext<'_, R>,
    ) -> Option<Result<SaveOutcome, AppError>> {
        if let Some(f) = &self.failed {
            if ctx.now >= f.since + self.error_display {
                self.failed = None;
            }
        }
        if self.autosave.poll(ctx.now) {
            debug!("autosave fired");
            return Some(self.save(ctx, SaveTrigger::Autosave));
        }
        None
    }

    /// Manual save: skips the debounce window.
    pub fn save_now<R: RemoteStore + ?Sized>(
        &mut self,
        ctx: &mut MutationContext<'_, R>,
    ) -> Result<SaveOutcome, AppError> {
        self.autosave.cancel();
        self.save(ctx, SaveTrigger::Manual)
    }

    fn save<R: RemoteStore + ?Sized>(
        &mut self,
        ctx: &mut MutationContext<'_, R>,
        trigger: SaveTrigger,
    ) -> Result<SaveOutcome, AppError> {
        self.autosave.cancel();
        let Some(session) = self.session.as_ref() else {
            return Err(AppError::validation(
                "EDIT_NO_SESSION",
                "No report is being edited",
            ));
        };
        let id = session.id.clone();
        ctx.gate("update")?;

        // Diff against the freshest stored row, not the row as it was when the session opened.
        let Some(baseline) = ctx.store.get(&id) else {
            self.session = None;
            let err = AppError::not_found("EDIT_REPORT_NOT_FOUND", "Report is no longer available")
                .with_details(format!("id={id}"));
            self.fail(&id, err.clone(), ctx.now);
            return Err(ctx.report(err));
        };
        let patch = compute_patch(baseline, &session.draft).restricted_to(&session.touched);
        if patch.is_empty() {
            self.session = None;
            if trigger == SaveTrigger::Manual {
                ctx.notices
                    .push(Notice::info("EDIT_NOTHING_TO_SAVE", "No hay cambios para guardar"));
            }
            debug!(%id, "nothing to save");
            return Ok(SaveOutcome::NothingToSave);
        }

        if let Some(s) = self.session.as_mut() {
            s.phase = Phase::Saving;
        }
        let fields = patch.changed_fields();
        let snapshot = ctx.store.apply_patch(&id, &patch);

        match ctx.remote.patch(&id, &patch) {
            Ok(()) => {
                self.session = None;
                ctx.refetch.request();
                info!(%id, ?fields, ?trigger, "report patched");
                ctx.notices
                    .push(Notice::success("EDIT_SAVED", "Cambios guardados"));
                Ok(SaveOutcome::Saved { id, fields })
            }
            Err(e) => {
                if let Some(snapshot) = snapshot {
                    ctx.store.revert_to(snapshot);
                }
                self.session = None;
                warn!(%id, code = %e.code, "patch failed; rolled back");
                let err = AppError::new(e.kind, "MUTATION_PATCH_FAILED", e.message.clone())
                    .with_details(format!(
                        "remote_code={}; {}",
                        e.code,
                        e.details.as_deref().unwrap_or_default()
                    ))
                    .with_retryable(e.retryable);
                self.fail(&id, err.clone(), ctx.now);
                Err(ctx.report(err))
            }
        }
    }

    fn fail(&mut self, id: &ReportId, error: AppError, now: OffsetDateTime) {
        self.failed = Some(FailedSave {
            id: id.clone(),
            error,
            since: now,
        });
    }

    /// Optimistic delete with rollback. A remote `NotFound` keeps the local removal.
    pub fn delete<R: RemoteStore + ?Sized>(
        &mut self,
        ctx: &mut MutationContext<'_, R>,
        id: &ReportId,
    ) -> Result<DeleteOutcome, AppError> {
        ctx.gate("delete")?;
        self.collapse();
        let Some(removed) = ctx.store.remove(id) else {
            return Err(ctx.report(
                AppError::not_found("DELETE_REPORT_NOT_FOUND", "Report is no longer available")
                    .with_details(format!("id={id}")),
            ));
        };

        match ctx.remote.delete(id) {
            Ok(()) => {
                info!(%id, "report deleted");
                ctx.notices
                    .push(Notice::success("DELETE_OK", "Reporte eliminado"));
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.is_not_found() => {
                info!(%id, "report already gone remotely; scheduling refetch");
                ctx.refetch.request();
                ctx.notices.push(Notice::info(
                    "DELETE_ALREADY_GONE",
                    "El reporte ya había sido eliminado",
                ));
                Ok(DeleteOutcome::AlreadyGone)
            }
            Err(e) => {
                warn!(%id, code = %e.code, "delete failed; restoring snapshot");
                ctx.store.restore(removed);
                Err(ctx.report(e))
            }
        }
    }

    /// Validate and create; the confirmed entity is inserted and a reconcile refetch queued.
    pub fn create<R: RemoteStore + ?Sized>(
        &mut self,
        ctx: &mut MutationContext<'_, R>,
        payload: NewReport,
    ) -> Result<ReportId, AppError> {
        ctx.gate("create")?;
        ensure_valid_new_report(&payload).map_err(|e| ctx.report(e))?;
        let id = ctx.remote.create(&payload).map_err(|e| {
            warn!(code = %e.code, "create failed");
            ctx.report(e)
        })?;
        info!(%id, "report created");
        ctx.store.upsert(payload.into_report(id.clone()));
        ctx.refetch.request();
        ctx.notices
            .push(Notice::success("CREATE_OK", "Reporte creado"));
        Ok(id)
    }

    /// Called after a refetch replaced the store. The draft is rebased onto the refetched row with
    /// only its edited fields kept; a session whose report vanished is closed.
    pub fn reconcile_after_refetch(&mut self, store: &ReportStore, notices: &mut Vec<Notice>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(fresh) = store.get(&session.id) {
            let edits = compute_patch(fresh, &session.draft).restricted_to(&session.touched);
            let mut rebased = fresh.clone();
            edits.apply_to(&mut rebased);
            session.draft = rebased;
        } else {
            self.collapse();
            notices.push(Notice::new(
                NoticeLevel::Warning,
                "EDIT_TARGET_GONE",
                "El reporte en edición fue eliminado por otro usuario",
            ));
        }
    }
}
