use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::UtcOffset;
use tracing::{debug, info, warn};

use crate::analytics::{build_dashboard_payload, DashboardPayload};
use crate::auth::{AccessPolicy, Session};
use crate::bulk::export::{export_bundle, export_csv, export_json, ExportBundleResult};
use crate::bulk::import::{parse_records, run_import, ImportFormat, ImportSummary};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::domain::{NewReport, Report, ReportId};
use crate::error::AppError;
use crate::mutation::{
    DeleteOutcome, EditState, FieldChange, MutationContext, MutationCoordinator, SaveOutcome,
};
use crate::notice::{Notice, NoticeLevel};
use crate::query::{filter_reports, paginate, recent_view, FilterSpec, Page, Pager, SearchInput};
use crate::remote::RemoteStore;
use crate::store::ReportStore;
use crate::sync::RefetchScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefetchTrigger {
    /// Explicit user action; collapses any open edit session first.
    User,
    /// Poll interval or post-mutation reconcile; an open draft keeps precedence.
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefetchOutcome {
    Replaced { count: usize },
    /// Folded into the refetch already in flight.
    Coalesced,
}

/// What one `tick` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub search_applied: bool,
    pub autosave: Option<Result<SaveOutcome, AppError>>,
    pub refetch: Option<Result<RefetchOutcome, AppError>>,
}

/// Report management engine: the store, its filtered views and every mutation path, driven by an
/// injected remote collection and clock.
///
/// The engine is single-threaded. Timers only advance when the embedding application calls
/// [`Engine::tick`], typically from its event loop.
pub struct Engine<R: RemoteStore, C: Clock> {
    remote: R,
    clock: C,
    config: EngineConfig,
    offset: UtcOffset,
    policy: AccessPolicy,
    session: Session,
    store: ReportStore,
    coordinator: MutationCoordinator,
    scheduler: RefetchScheduler,
    search: SearchInput,
    filter: FilterSpec,
    pager: Pager,
    notices: Vec<Notice>,
}

impl<R: RemoteStore, C: Clock> Engine<R, C> {
    pub fn new(remote: R, clock: C, session: Session, config: EngineConfig) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self {
            policy: AccessPolicy::new(&config.privileged_roles),
            offset: config.local_offset(),
            coordinator: MutationCoordinator::new(config.autosave_debounce(), config.error_display()),
            scheduler: RefetchScheduler::new(config.refetch_interval()),
            search: SearchInput::new(config.search_debounce()),
            pager: Pager::new(config.page_size),
            filter: FilterSpec::default(),
            store: ReportStore::new(),
            notices: Vec::new(),
            remote,
            clock,
            session,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Swap in a refreshed credential holder. Credential lifecycle itself is managed upstream.
    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    pub fn can_mutate(&self) -> bool {
        self.policy.can_mutate(&self.session)
    }

    pub fn scheduler(&self) -> &RefetchScheduler {
        &self.scheduler
    }

    fn with_mutation<T>(
        &mut self,
        f: impl FnOnce(&mut MutationCoordinator, &mut MutationContext<'_, R>) -> T,
    ) -> T {
        let now = self.clock.now();
        let Self {
            remote,
            store,
            policy,
            session,
            scheduler,
            notices,
            coordinator,
            ..
        } = self;
        let mut ctx = MutationContext {
            remote,
            store,
            policy,
            session,
            refetch: scheduler,
            notices,
            now,
        };
        f(coordinator, &mut ctx)
    }

    /// Replace the store with the remote listing. At most one refetch runs at a time.
    pub fn refetch(&mut self, trigger: RefetchTrigger) -> Result<RefetchOutcome, AppError> {
        if trigger == RefetchTrigger::User {
            self.coordinator.cancel();
        }
        if !self.scheduler.try_begin() {
            debug!(coalesced = self.scheduler.coalesced(), "refetch coalesced");
            return Ok(RefetchOutcome::Coalesced);
        }
        debug!(?trigger, "refetch started");
        let result = self.remote.list();
        self.scheduler.finish(self.clock.now());
        match result {
            Ok(reports) => {
                let count = reports.len();
                self.store.replace_all(reports);
                self.coordinator
                    .reconcile_after_refetch(&self.store, &mut self.notices);
                self.reclamp();
                info!(count, revision = self.store.revision(), "refetch finished");
                Ok(RefetchOutcome::Replaced { count })
            }
            Err(e) => {
                warn!(code = %e.code, ?trigger, "refetch failed");
                if trigger == RefetchTrigger::User {
                    self.notices.push(Notice::from_error(&e));
                }
                Err(e)
            }
        }
    }

    /// Advance every timer to the clock's now: search debounce, error display, autosave, then the
    /// periodic or requested refetch.
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        let mut report = TickReport::default();

        if self.search.poll(now) {
            self.filter.search = self.search.applied().to_string();
            self.reclamp();
            report.search_applied = true;
        }

        report.autosave = self.with_mutation(|c, ctx| c.poll(ctx));
        if report.autosave.is_some() {
            self.reclamp();
        }

        if self.scheduler.is_due(now) {
            report.refetch = Some(self.refetch(RefetchTrigger::Background));
        }
        report
    }

    /// Store contents with the open draft, if any, shown in place of its stored row.
    fn working_set(&self) -> Vec<&Report> {
        let draft = self.coordinator.draft();
        self.store
            .reports()
            .iter()
            .map(|r| match draft {
                Some(d) if d.id == r.id => d,
                _ => r,
            })
            .collect()
    }

    /// Filtered view, most recent first.
    pub fn view(&self) -> Vec<Report> {
        let set = self.working_set();
        recent_view(&set, &self.filter, self.clock.now(), self.offset)
            .into_iter()
            .cloned()
            .collect()
    }

    fn view_len(&self) -> usize {
        let set = self.working_set();
        filter_reports(&set, &self.filter, self.clock.now(), self.offset).len()
    }

    fn reclamp(&mut self) {
        let total = self.view_len();
        self.pager.clamp(total);
    }

    pub fn page(&self) -> Page<Report> {
        paginate(&self.view(), &self.pager)
    }

    pub fn pager(&self) -> Pager {
        self.pager
    }

    pub fn set_page(&mut self, page: usize) {
        let total = self.view_len();
        self.pager.set_page(page, total);
    }

    pub fn next_page(&mut self) {
        let total = self.view_len();
        self.pager.next(total);
    }

    pub fn previous_page(&mut self) {
        let total = self.view_len();
        self.pager.previous(total);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        let total = self.view_len();
        self.pager.set_page_size(page_size, total);
    }

    pub fn dashboard(&self) -> DashboardPayload {
        build_dashboard_payload(&self.view(), self.offset)
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// Replace the date and categorical predicates. The applied search text is kept.
    pub fn set_filter(&mut self, spec: FilterSpec) {
        let search = std::mem::take(&mut self.filter.search);
        self.filter = FilterSpec { search, ..spec };
        self.reclamp();
    }

    /// Keystroke in the search box; applied after the search debounce window.
    pub fn type_search(&mut self, text: &str) {
        self.search.input(text, self.clock.now());
    }

    pub fn search_pending(&self) -> &str {
        self.search.pending()
    }

    pub fn clear_filters(&mut self) {
        self.filter = FilterSpec::default();
        self.search.clear();
        self.pager.reset();
    }

    pub fn edit_state(&self) -> EditState {
        self.coordinator.state()
    }

    pub fn draft(&self) -> Option<&Report> {
        self.coordinator.draft()
    }

    pub fn last_edit_error(&self) -> Option<&AppError> {
        self.coordinator.last_error()
    }

    pub fn begin_edit(&mut self, id: &ReportId) -> Result<(), AppError> {
        let result = self.with_mutation(|c, ctx| c.begin_edit(ctx, id));
        self.reclamp();
        result
    }

    /// The draft is overlaid on the view, so an edit can move its row in or out of the filtered set.
    pub fn edit(&mut self, change: FieldChange) -> Result<(), AppError> {
        let now = self.clock.now();
        let result = self.coordinator.change(&change, now);
        self.reclamp();
        result.map_err(|e| {
            self.notices.push(Notice::from_error(&e));
            e
        })
    }

    pub fn save_now(&mut self) -> Result<SaveOutcome, AppError> {
        let outcome = self.with_mutation(|c, ctx| c.save_now(ctx));
        self.reclamp();
        outcome
    }

    pub fn cancel_edit(&mut self) {
        self.coordinator.cancel();
        self.reclamp();
    }

    pub fn delete(&mut self, id: &ReportId) -> Result<DeleteOutcome, AppError> {
        let outcome = self.with_mutation(|c, ctx| c.delete(ctx, id));
        self.reclamp();
        outcome
    }

    pub fn create(&mut self, payload: NewReport) -> Result<ReportId, AppError> {
        self.with_mutation(|c, ctx| c.create(ctx, payload))
    }

    /// Parse, transform and submit a batch, then refetch once. Per-record failures only show in the tally.
    pub fn import<G: Rng>(
        &mut self,
        text: &str,
        format: ImportFormat,
        rng: &mut G,
    ) -> Result<ImportSummary, AppError> {
        if let Err(e) = self.policy.require_mutation(&self.session, "import") {
            self.notices.push(Notice::from_error(&e));
            return Err(e);
        }
        let records = parse_records(text, format).map_err(|e| {
            self.notices.push(Notice::from_error(&e));
            e
        })?;
        let summary = run_import(&self.remote, &records, &self.config, self.clock.now(), rng);

        // Best effort; a failed reconcile leaves the next poll to catch up.
        let _ = self.refetch(RefetchTrigger::Background);

        let message = format!(
            "Importados: {}, fallidos: {}, descartados: {}",
            summary.succeeded, summary.failed, summary.dropped
        );
        let level = if summary.failed == 0 {
            NoticeLevel::Success
        } else {
            NoticeLevel::Warning
        };
        self.notices
            .push(Notice::new(level, "IMPORT_FINISHED", message));
        Ok(summary)
    }

    pub fn export_csv(&self) -> Result<String, AppError> {
        export_csv(&self.view(), self.offset)
    }

    pub fn export_json(&self) -> Result<String, AppError> {
        export_json(&self.view())
    }

    pub fn export_bundle(&self, destination_dir: &Path) -> Result<ExportBundleResult, AppError> {
        export_bundle(&self.view(), destination_dir, self.clock.now(), self.offset)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
