use std::time::Duration;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::{Departments, NewReport, Priority, Report, ReportId, Status};
use crate::remote::MemoryRemote;

const DEPARTMENTS: [&str; 6] = [
    "Catastro",
    "Tesorería",
    "Obras Públicas",
    "Recursos Humanos",
    "Registro Civil",
    "Secretaría",
];

const PROBLEM_TYPES: [&str; 6] = ["Hardware", "Software", "Red", "Impresora", "Correo", "Acceso"];

const REPORTERS: [&str; 5] = [
    "Ana Torres",
    "Luis Herrera",
    "Marta Quiroga",
    "Pedro Aguilar",
    "Sofía Benítez",
];

const ASSIGNEES: [&str; 3] = ["Carlos Méndez", "Lucía Ramírez", "Jorge Salinas"];

const DESCRIPTIONS: [&str; 6] = [
    "La computadora no enciende después del corte de luz",
    "El sistema de cobro muestra un error al emitir recibos",
    "Sin acceso a internet en toda la planta baja",
    "La impresora atasca el papel en cada trabajo",
    "No llegan los correos externos desde ayer",
    "Usuario bloqueado tras varios intentos de acceso",
];

/// Minimal fixture report. `rfc3339` must parse; this is test/demo data only.
pub fn sample_report(id: &str, rfc3339: &str) -> Report {
    Report {
        id: ReportId::from(id),
        departments: Departments::from_static("Catastro"),
        description: "No funciona la impresora de la oficina principal".to_string(),
        problem_type: "Impresora".to_string(),
        reported_by: "Ana Torres".to_string(),
        priority: Priority::Baja,
        status: Status::Pendiente,
        assignee: None,
        timestamp: OffsetDateTime::parse(rfc3339, &Rfc3339).unwrap_or(OffsetDateTime::UNIX_EPOCH),
        attachments: Vec::new(),
    }
}

pub fn sample_new_report(description: &str) -> NewReport {
    NewReport {
        departments: Departments::from_static("Tesorería"),
        description: description.to_string(),
        problem_type: "Hardware".to_string(),
        reported_by: "Luis Herrera".to_string(),
        priority: Priority::Media,
        status: Status::Pendiente,
        assignee: None,
        timestamp: OffsetDateTime::UNIX_EPOCH,
        attachments: Vec::new(),
    }
}

/// Deterministic dataset spread over the year before `now`, large enough for dashboards to be meaningful.
pub fn demo_reports(now: OffsetDateTime) -> Vec<Report> {
    (1..=48usize)
        .map(|i| {
            let primary = Departments::from_static(DEPARTMENTS[i % 6]);
            let departments = if i % 7 == 0 {
                Departments::from_items([DEPARTMENTS[i % 6], DEPARTMENTS[(i + 1) % 6]])
                    .unwrap_or(primary)
            } else {
                primary
            };
            let status = match i % 3 {
                0 => Status::Resuelto,
                1 => Status::Pendiente,
                _ => Status::EnProceso,
            };
            let assignee = match status {
                Status::Pendiente if i % 2 == 1 => None,
                _ => Some(ASSIGNEES[i % 3].to_string()),
            };
            // One report every ~7.5 days going back, at staggered office hours.
            let age = Duration::from_secs((i as u64 - 1) * 180 * 3600 + (i as u64 % 5) * 3600);
            Report {
                id: ReportId::new(i.to_string()),
                departments,
                description: DESCRIPTIONS[i % 6].to_string(),
                problem_type: PROBLEM_TYPES[(i * 5) % 6].to_string(),
                reported_by: REPORTERS[i % 5].to_string(),
                priority: Priority::ALL[i % 4],
                status,
                assignee,
                timestamp: now - age,
                attachments: Vec::new(),
            }
        })
        .collect()
}

pub fn seed_memory_remote(now: OffsetDateTime) -> MemoryRemote {
    MemoryRemote::with_reports(demo_reports(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn demo_dataset_is_deterministic_and_well_formed() {
        let now = datetime!(2025-06-10 12:00:00 UTC);
        let a = demo_reports(now);
        let b = demo_reports(now);
        assert_eq!(a, b);
        assert_eq!(a.len(), 48);
        assert!(a.iter().all(|r| !r.departments.is_empty()));
        assert!(a.iter().all(|r| r.description.chars().count() >= 20));
        assert!(a.iter().any(|r| r.departments.len() == 2));
        assert!(a.iter().all(|r| r.timestamp <= now));
    }
}
