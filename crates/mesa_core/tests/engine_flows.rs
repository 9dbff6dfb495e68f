use mesa_core::auth::Session;
use mesa_core::bulk::ImportFormat;
use mesa_core::clock::ManualClock;
use mesa_core::config::EngineConfig;
use mesa_core::demo::sample_report;
use mesa_core::domain::{Priority, Report, ReportId, Status};
use mesa_core::error::{AppError, ErrorKind};
use mesa_core::mutation::{DeleteOutcome, EditState, FieldChange, ReportPatch, SaveOutcome};
use mesa_core::notice::NoticeLevel;
use mesa_core::query::{Choice, DateBucket, FilterSpec};
use mesa_core::remote::{MemoryRemote, RemoteOp};
use mesa_core::{Engine, RefetchOutcome, RefetchTrigger};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use time::macros::datetime;

type TestEngine = Engine<MemoryRemote, ManualClock>;

fn engine_with(reports: Vec<Report>, role: &str) -> (TestEngine, ManualClock) {
    let clock = ManualClock::new(datetime!(2025-06-10 12:00:00 UTC));
    let mut engine = Engine::new(
        MemoryRemote::with_reports(reports),
        clock.clone(),
        Session::new("ana", role),
        EngineConfig::default(),
    )
    .expect("engine");
    engine.refetch(RefetchTrigger::User).expect("initial load");
    engine.drain_notices();
    (engine, clock)
}

fn three_reports() -> Vec<Report> {
    vec![
        sample_report("1", "2024-01-05T10:00:00Z"),
        sample_report("2", "2025-06-10T08:30:00Z"),
        sample_report("3", "2025-06-10T11:15:00Z"),
    ]
}

fn ids(reports: &[Report]) -> Vec<String> {
    reports.iter().map(|r| r.id.to_string()).collect()
}

#[test]
fn date_and_priority_filters_drive_view_and_dashboard() {
    let (mut engine, _clock) = engine_with(three_reports(), "admin");

    engine.set_filter(FilterSpec {
        date: Choice::Only(DateBucket::Today),
        ..FilterSpec::default()
    });
    assert_eq!(ids(&engine.view()), vec!["3", "2"]);

    engine.set_filter(FilterSpec {
        date: Choice::Only(DateBucket::Year(2024)),
        ..FilterSpec::default()
    });
    assert_eq!(ids(&engine.view()), vec!["1"]);

    engine.set_filter(FilterSpec {
        priority: Choice::Only(Priority::Critica),
        ..FilterSpec::default()
    });
    assert!(engine.view().is_empty());
    let dashboard = engine.dashboard();
    assert_eq!(dashboard.kpis.total, 0);
    assert!(dashboard.by_department.is_empty());

    engine.clear_filters();
    assert_eq!(engine.dashboard().kpis.total, 3);
}

#[test]
fn rapid_edits_produce_one_patch_with_latest_values() {
    let (mut engine, clock) = engine_with(three_reports(), "soporte");
    let id = ReportId::from("2");
    engine.begin_edit(&id).expect("begin");

    for text in [
        "La impresora del segundo piso",
        "La impresora del segundo piso no imprime",
        "La impresora del segundo piso no imprime en color",
    ] {
        engine
            .edit(FieldChange::Description(text.to_string()))
            .expect("edit");
        clock.advance_ms(400);
        assert!(engine.tick().autosave.is_none());
    }
    engine.edit(FieldChange::Priority(Priority::Alta)).expect("edit");
    assert_eq!(engine.edit_state(), EditState::AutosavePending(id.clone()));

    clock.advance_ms(1_000);
    let tick = engine.tick();
    assert_eq!(
        tick.autosave,
        Some(Ok(SaveOutcome::Saved {
            id: id.clone(),
            fields: vec!["descripcion", "prioridad"],
        }))
    );
    assert_eq!(engine.edit_state(), EditState::Idle);

    let patches = engine.remote().patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(
        patches[0],
        (
            id.clone(),
            ReportPatch {
                description: Some("La impresora del segundo piso no imprime en color".to_string()),
                priority: Some(Priority::Alta),
                ..ReportPatch::default()
            }
        )
    );
    // The post-save reconcile refetch ran in the same tick.
    assert!(matches!(tick.refetch, Some(Ok(RefetchOutcome::Replaced { count: 3 }))));
    assert_eq!(
        engine.store().get(&id).map(|r| r.priority),
        Some(Priority::Alta)
    );
}

#[test]
fn failed_save_rolls_back_and_clears_after_display_timeout() {
    let (mut engine, clock) = engine_with(three_reports(), "admin");
    let id = ReportId::from("3");
    let before = engine.store().get(&id).cloned();
    engine
        .remote()
        .fail_next(RemoteOp::Patch, AppError::server("HTTP_500", "boom"));

    engine.begin_edit(&id).expect("begin");
    engine.edit(FieldChange::Status(Status::Resuelto)).expect("edit");
    let err = engine.save_now().expect_err("patch fails");
    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(err.code, "MUTATION_PATCH_FAILED");
    assert_eq!(engine.store().get(&id).cloned(), before);
    assert_eq!(engine.edit_state(), EditState::Error(id.clone()));
    assert!(engine
        .notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Error && n.code == "MUTATION_PATCH_FAILED"));

    clock.advance_ms(3_999);
    engine.tick();
    assert_eq!(engine.edit_state(), EditState::Error(id.clone()));
    clock.advance_ms(1);
    engine.tick();
    assert_eq!(engine.edit_state(), EditState::Idle);
}

#[test]
fn cancel_reverts_draft_without_network_call() {
    let (mut engine, clock) = engine_with(three_reports(), "admin");
    let id = ReportId::from("1");
    engine.begin_edit(&id).expect("begin");
    engine.edit(FieldChange::Priority(Priority::Critica)).expect("edit");
    assert_eq!(
        engine.view().iter().find(|r| r.id == id).map(|r| r.priority),
        Some(Priority::Critica)
    );

    engine.cancel_edit();
    clock.advance_ms(5_000);
    engine.tick();
    assert_eq!(engine.remote().calls(RemoteOp::Patch), 0);
    assert_eq!(engine.edit_state(), EditState::Idle);
    assert_eq!(
        engine.view().iter().find(|r| r.id == id).map(|r| r.priority),
        Some(Priority::Baja)
    );
}

#[test]
fn delete_is_optimistic_with_snapshot_restore() {
    let (mut engine, _clock) = engine_with(three_reports(), "admin");

    assert_eq!(
        engine.delete(&ReportId::from("3")).expect("delete"),
        DeleteOutcome::Deleted
    );
    assert!(!engine.store().contains(&ReportId::from("3")));

    let before: Vec<Report> = engine.store().reports().to_vec();
    engine
        .remote()
        .fail_next(RemoteOp::Delete, AppError::server("HTTP_503", "unavailable"));
    let err = engine.delete(&ReportId::from("2")).expect_err("server error");
    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(engine.store().reports(), before.as_slice());

    // Another user already removed it.
    engine.remote().remove_silently(&ReportId::from("1"));
    assert_eq!(
        engine.delete(&ReportId::from("1")).expect("benign"),
        DeleteOutcome::AlreadyGone
    );
    assert!(!engine.store().contains(&ReportId::from("1")));
    assert!(engine.scheduler().is_requested());
    let codes: Vec<String> = engine.drain_notices().into_iter().map(|n| n.code).collect();
    assert_eq!(codes, vec!["DELETE_OK", "HTTP_503", "DELETE_ALREADY_GONE"]);
}

#[test]
fn non_privileged_role_cannot_mutate_anything() {
    let (mut engine, _clock) = engine_with(three_reports(), "funcionario");
    assert!(!engine.can_mutate());
    let before: Vec<Report> = engine.store().reports().to_vec();

    let err = engine.delete(&ReportId::from("1")).expect_err("denied");
    assert_eq!(err.kind, ErrorKind::Authorization);
    assert!(engine.begin_edit(&ReportId::from("1")).is_err());
    let mut rng = StdRng::seed_from_u64(7);
    assert!(engine
        .import("Departamento,Descripcion\nCatastro,Sin red\n", ImportFormat::Csv, &mut rng)
        .is_err());

    assert_eq!(engine.store().reports(), before.as_slice());
    assert_eq!(engine.remote().calls(RemoteOp::Delete), 0);
    assert_eq!(engine.remote().calls(RemoteOp::Create), 0);
    assert!(engine.notices().iter().all(|n| n.code == "AUTH_DENIED"));
}

#[test]
fn background_refetch_keeps_draft_but_user_refetch_collapses_it() {
    let (mut engine, _clock) = engine_with(three_reports(), "admin");
    let id = ReportId::from("2");
    engine.begin_edit(&id).expect("begin");
    engine.edit(FieldChange::Priority(Priority::Alta)).expect("edit");

    engine.remote().edit_silently(
        &id,
        &ReportPatch {
            status: Some(Status::EnProceso),
            ..ReportPatch::default()
        },
    );
    engine.refetch(RefetchTrigger::Background).expect("background");
    assert_eq!(engine.edit_state(), EditState::AutosavePending(id.clone()));
    assert_eq!(engine.draft().map(|d| d.priority), Some(Priority::Alta));
    assert_eq!(
        engine.store().get(&id).map(|r| r.status),
        Some(Status::EnProceso)
    );

    engine.refetch(RefetchTrigger::User).expect("user");
    assert_eq!(engine.edit_state(), EditState::Idle);
    let shown = engine.view().into_iter().find(|r| r.id == id).expect("row");
    assert_eq!((shown.priority, shown.status), (Priority::Baja, Status::EnProceso));
}

#[test]
fn report_removed_remotely_closes_its_edit_session() {
    let (mut engine, _clock) = engine_with(three_reports(), "admin");
    let id = ReportId::from("3");
    engine.begin_edit(&id).expect("begin");
    engine.remote().remove_silently(&id);

    engine.refetch(RefetchTrigger::Background).expect("refetch");
    assert_eq!(engine.edit_state(), EditState::Idle);
    assert!(engine
        .notices()
        .iter()
        .any(|n| n.code == "EDIT_TARGET_GONE" && n.level == NoticeLevel::Warning));
}

#[test]
fn failed_refetch_keeps_last_known_collection() {
    let (mut engine, _clock) = engine_with(three_reports(), "admin");
    engine
        .remote()
        .fail_next(RemoteOp::List, AppError::network("REMOTE_UNREACHABLE", "offline"));
    let err = engine.refetch(RefetchTrigger::User).expect_err("offline");
    assert_eq!(err.kind, ErrorKind::Network);
    assert_eq!(engine.store().len(), 3);
    assert_eq!(engine.notices().len(), 1);
}

#[test]
fn import_tallies_every_record_and_refetches_once() {
    let (mut engine, _clock) = engine_with(Vec::new(), "admin");
    engine.remote().reject_descriptions_containing("RECHAZAR");
    let lists_before = engine.remote().calls(RemoteOp::List);

    let csv = "\
Departamento,Descripcion,TipoProblema,Prioridad,Estado,FechaHora
Catastro,La computadora no enciende,Hardware,Alta,Pendiente,2025-06-09T08:00:00Z
\"Tesorería, Catastro\",Sin acceso al sistema de cobro,Plomería,urgente,cerrado,no es fecha
,Sin departamento,Red,Media,Pendiente,
Obras Públicas,RECHAZAR este registro,Red,Baja,Pendiente,
Secretaría,,Correo,Baja,Pendiente,
";
    let mut rng = StdRng::seed_from_u64(42);
    let summary = engine
        .import(csv, ImportFormat::Csv, &mut rng)
        .expect("import");

    assert_eq!(
        (summary.total, summary.succeeded, summary.failed, summary.dropped),
        (5, 2, 1, 2)
    );
    assert!(summary.is_balanced());
    assert_eq!(engine.remote().calls(RemoteOp::Create), 3);
    assert_eq!(engine.remote().calls(RemoteOp::List), lists_before + 1);
    assert_eq!(engine.store().len(), 2);

    let coerced = engine
        .store()
        .reports()
        .iter()
        .find(|r| r.departments.len() == 2)
        .expect("multi-department row");
    assert_eq!(coerced.problem_type, "Otro");
    assert_eq!(coerced.reported_by, "Importación");
    assert!(coerced.assignee.is_some());
    assert_eq!(coerced.timestamp, datetime!(2025-06-10 12:00:00 UTC));

    let finished = engine.notices().last().expect("notice");
    assert_eq!(finished.code, "IMPORT_FINISHED");
    assert_eq!(finished.level, NoticeLevel::Warning);
}

#[test]
fn create_validates_then_reconciles() {
    let (mut engine, clock) = engine_with(three_reports(), "admin");
    let mut payload = mesa_core::demo::sample_new_report("corta");
    let err = engine.create(payload.clone()).expect_err("too short");
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(engine.remote().calls(RemoteOp::Create), 0);

    payload.description = "El monitor parpadea al abrir el sistema catastral".to_string();
    let id = engine.create(payload).expect("create");
    assert!(engine.store().contains(&id));
    assert!(engine.scheduler().is_requested());

    let tick = engine.tick();
    assert!(matches!(tick.refetch, Some(Ok(RefetchOutcome::Replaced { count: 4 }))));
    clock.advance_ms(1);
    assert!(engine.tick().refetch.is_none());
}

#[test]
fn save_after_refetch_keeps_concurrent_change_to_untouched_field() {
    let (mut engine, _clock) = engine_with(three_reports(), "admin");
    let id = ReportId::from("2");
    engine.begin_edit(&id).expect("begin");
    engine.edit(FieldChange::Priority(Priority::Alta)).expect("edit");

    // Another user resolves the report while the draft is open.
    engine.remote().edit_silently(
        &id,
        &ReportPatch {
            status: Some(Status::Resuelto),
            ..ReportPatch::default()
        },
    );
    engine.refetch(RefetchTrigger::Background).expect("background");
    let shown = engine.view().into_iter().find(|r| r.id == id).expect("row");
    assert_eq!((shown.priority, shown.status), (Priority::Alta, Status::Resuelto));

    assert_eq!(
        engine.save_now().expect("save"),
        SaveOutcome::Saved {
            id: id.clone(),
            fields: vec!["prioridad"],
        }
    );
    assert_eq!(
        engine.remote().patches(),
        vec![(
            id.clone(),
            ReportPatch {
                priority: Some(Priority::Alta),
                ..ReportPatch::default()
            }
        )]
    );
    let stored = engine.remote().get(&id).expect("remote row");
    assert_eq!((stored.priority, stored.status), (Priority::Alta, Status::Resuelto));
}

#[test]
fn switching_edit_target_cancels_pending_autosave() {
    let (mut engine, clock) = engine_with(three_reports(), "admin");
    engine.begin_edit(&ReportId::from("1")).expect("begin");
    engine.edit(FieldChange::Priority(Priority::Alta)).expect("edit");
    clock.advance_ms(400);

    engine.begin_edit(&ReportId::from("3")).expect("switch");
    clock.advance_ms(2_000);
    assert_eq!(engine.tick().autosave, None);
    assert!(engine.remote().patches().is_empty());
    assert_eq!(engine.edit_state(), EditState::Editing(ReportId::from("3")));
    assert_eq!(
        engine.store().get(&ReportId::from("1")).map(|r| r.priority),
        Some(Priority::Baja)
    );
}

#[test]
fn delete_cancels_pending_autosave_of_open_session() {
    let (mut engine, clock) = engine_with(three_reports(), "admin");
    engine.begin_edit(&ReportId::from("1")).expect("begin");
    engine.edit(FieldChange::Status(Status::Resuelto)).expect("edit");
    clock.advance_ms(400);

    engine.delete(&ReportId::from("3")).expect("delete");
    clock.advance_ms(2_000);
    assert_eq!(engine.tick().autosave, None);
    assert_eq!(engine.remote().calls(RemoteOp::Patch), 0);
    assert_eq!(engine.edit_state(), EditState::Idle);
}

#[test]
fn edit_that_leaves_the_filter_reclamps_the_page() {
    let reports: Vec<Report> = (1..=11)
        .map(|day| sample_report(&day.to_string(), &format!("2025-05-{day:02}T09:00:00Z")))
        .collect();
    let (mut engine, _clock) = engine_with(reports, "admin");
    engine.set_filter(FilterSpec {
        priority: Choice::Only(Priority::Baja),
        ..FilterSpec::default()
    });
    engine.set_page(2);
    assert_eq!(ids(&engine.page().items), vec!["1"]);

    engine.begin_edit(&ReportId::from("1")).expect("begin");
    engine.edit(FieldChange::Priority(Priority::Alta)).expect("edit");
    let page = engine.page();
    assert_eq!(page.total, 10);
    assert_eq!(engine.pager().page(), 1);
    assert!(engine.pager().page() <= engine.pager().page_count(page.total));

    engine.cancel_edit();
    assert_eq!(engine.page().total, 11);
    assert_eq!(engine.pager().page(), 1);
}
