use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::domain::{
    Departments, NewReport, Priority, ReportId, Status, ValidationWarning, OTHER_PROBLEM_TYPE,
};
use crate::error::AppError;
use crate::normalize::timestamps::parse_timestamp;
use crate::remote::RemoteStore;

/// Reporter recorded when an imported row names nobody.
pub const IMPORT_REPORTER: &str = "Importación";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportFormat {
    Csv,
    Json,
}

impl ImportFormat {
    /// Guess from a file extension (`csv`, `json`), case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// One cell as authored: text, or an already-structured list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawField {
    Text(String),
    List(Vec<String>),
}

impl RawField {
    fn text(&self) -> Option<String> {
        let joined = match self {
            RawField::Text(s) => s.trim().to_string(),
            RawField::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        };
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

/// An input row before transformation. `row` is 1-based over data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub row: usize,
    pub fields: BTreeMap<String, RawField>,
}

impl RawRecord {
    /// Tabular header name first, then the raw entity field name. Both are case-sensitive.
    fn field(&self, tabular: &str, raw: &str) -> Option<&RawField> {
        self.fields.get(tabular).or_else(|| self.fields.get(raw))
    }

    fn text(&self, tabular: &str, raw: &str) -> Option<String> {
        self.field(tabular, raw).and_then(RawField::text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSummary {
    /// Records found in the file.
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Rows filtered before submission for missing department or description.
    pub dropped: usize,
    pub created_ids: Vec<ReportId>,
    pub warnings: Vec<ValidationWarning>,
}

impl ImportSummary {
    pub fn is_balanced(&self) -> bool {
        self.succeeded + self.failed + self.dropped == self.total
    }
}

pub fn parse_records(text: &str, format: ImportFormat) -> Result<Vec<RawRecord>, AppError> {
    match format {
        ImportFormat::Csv => parse_csv_records(text),
        ImportFormat::Json => parse_json_records(text),
    }
}

pub fn parse_csv_records(csv_text: &str) -> Result<Vec<RawRecord>, AppError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_text.trim_start_matches('\u{feff}').as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| {
            AppError::validation("IMPORT_CSV_HEADERS_FAILED", "Failed to read CSV headers")
                .with_details(e.to_string())
        })?
        .clone();

    let mut out = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let row = result.map_err(|e| {
            AppError::validation("IMPORT_CSV_PARSE_FAILED", "Failed to parse CSV row")
                .with_details(format!("row={}: {}", idx + 1, e))
        })?;
        let fields = headers
            .iter()
            .zip(row.iter())
            .filter(|(_, v)| !v.is_empty())
            .map(|(h, v)| (h.to_string(), RawField::Text(v.to_string())))
            .collect();
        out.push(RawRecord {
            row: idx + 1,
            fields,
        });
    }
    Ok(out)
}

/// Accepts a top-level array of objects, or an object carrying such an array under `reportes`.
pub fn parse_json_records(json_text: &str) -> Result<Vec<RawRecord>, AppError> {
    let root: Value = serde_json::from_str(json_text).map_err(|e| {
        AppError::validation("IMPORT_JSON_PARSE_FAILED", "Failed to parse JSON import")
            .with_details(e.to_string())
    })?;
    let items = match root {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("reportes") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(AppError::validation(
                    "IMPORT_JSON_SHAPE_INVALID",
                    "JSON import must be an array of reports or an object with a `reportes` array",
                ))
            }
        },
        other => {
            return Err(AppError::validation(
                "IMPORT_JSON_SHAPE_INVALID",
                "JSON import must be an array of reports or an object with a `reportes` array",
            )
            .with_details(format!("found={}", json_kind(&other))))
        }
    };

    Ok(items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            // Non-object items become empty records and are dropped pre-flight.
            let fields = match item {
                Value::Object(obj) => obj
                    .into_iter()
                    .filter_map(|(k, v)| json_field(v).map(|f| (k, f)))
                    .collect(),
                _ => BTreeMap::new(),
            };
            RawRecord {
                row: idx + 1,
                fields,
            }
        })
        .collect())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn json_scalar(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_field(v: Value) -> Option<RawField> {
    match v {
        Value::Array(items) => Some(RawField::List(
            items.into_iter().filter_map(json_scalar).collect(),
        )),
        other => json_scalar(other).map(RawField::Text),
    }
}

fn dropped(row: usize, missing: &str) -> ValidationWarning {
    ValidationWarning::new(
        "IMPORT_ROW_DROPPED",
        format!("Row dropped: missing {missing}"),
    )
    .with_details(format!("row={row}"))
}

/// Turn one record into a creation payload, coercing everything recoverable.
///
/// Returns `None` (with an `IMPORT_ROW_DROPPED` warning) when the department list or the description
/// is missing. Description length is not enforced for imports.
pub fn transform_record<G: Rng>(
    record: &RawRecord,
    config: &EngineConfig,
    now: OffsetDateTime,
    rng: &mut G,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<NewReport> {
    let departments = record
        .field("Departamento", "departamento")
        .and_then(|f| match f {
            RawField::Text(s) => Departments::parse_text(s),
            RawField::List(items) => Departments::from_items(items),
        });
    let Some(departments) = departments else {
        warnings.push(dropped(record.row, "departamento"));
        return None;
    };
    let Some(description) = record.text("Descripcion", "descripcion") else {
        warnings.push(dropped(record.row, "descripcion"));
        return None;
    };

    let problem_type = match record.text("TipoProblema", "tipoProblema") {
        Some(p) if config.is_known_problem_type(&p) => p,
        _ => OTHER_PROBLEM_TYPE.to_string(),
    };
    let reported_by = record
        .text("QuienReporta", "quienReporta")
        .unwrap_or_else(|| IMPORT_REPORTER.to_string());
    let priority = record
        .text("Prioridad", "prioridad")
        .map(|p| Priority::coerce(&p))
        .unwrap_or_default();
    let status = record
        .text("Estado", "estado")
        .map(|s| Status::coerce(&s))
        .unwrap_or_default();
    let assignee = record
        .text("AsignadoA", "asignadoA")
        .or_else(|| pick_assignee(&config.assignee_roster, rng));

    let timestamp = match record.text("FechaHora", "fechaHora") {
        None => now,
        Some(raw) => parse_timestamp(&raw, config.local_offset()).unwrap_or_else(|| {
            warnings.push(
                ValidationWarning::new(
                    "IMPORT_TIMESTAMP_DEFAULTED",
                    "Unrecognized timestamp; using import time",
                )
                .with_details(format!("row={}; value={raw}", record.row)),
            );
            now
        }),
    };

    let attachments = match record.field("Adjuntos", "adjuntos") {
        Some(RawField::List(items)) => items
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(RawField::Text(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };

    Some(NewReport {
        departments,
        description,
        problem_type,
        reported_by,
        priority,
        status,
        assignee,
        timestamp,
        attachments,
    })
}

/// Uniform pick over the non-blank roster entries.
pub fn pick_assignee<G: Rng>(roster: &[String], rng: &mut G) -> Option<String> {
    let candidates: Vec<&String> = roster.iter().filter(|a| !a.trim().is_empty()).collect();
    if candidates.is_empty() {
        return None;
    }
    let idx = rng.random_range(0..candidates.len());
    candidates.get(idx).map(|a| a.trim().to_string())
}

/// Submit every payload as an independent create on at most `workers` threads.
///
/// Returns one outcome per input index, in input order, regardless of completion order. A worker that
/// dies mid-batch leaves its claimed records marked failed rather than unaccounted for.
pub fn submit_concurrently<R: RemoteStore + ?Sized>(
    remote: &R,
    payloads: &[NewReport],
    workers: usize,
) -> Vec<Result<ReportId, AppError>> {
    let next = AtomicUsize::new(0);
    let worker_count = workers.max(1).min(payloads.len());
    let mut slots: Vec<Option<Result<ReportId, AppError>>> = vec![None; payloads.len()];

    thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|_| {
                scope.spawn(|| {
                    let mut done = Vec::new();
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        let Some(payload) = payloads.get(idx) else {
                            break;
                        };
                        done.push((idx, remote.create(payload)));
                    }
                    done
                })
            })
            .collect();
        for handle in handles {
            match handle.join() {
                Ok(done) => {
                    for (idx, outcome) in done {
                        if let Some(slot) = slots.get_mut(idx) {
                            *slot = Some(outcome);
                        }
                    }
                }
                Err(_) => warn!("import worker panicked"),
            }
        }
    });

    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.unwrap_or_else(|| {
                Err(AppError::internal(
                    "IMPORT_WORKER_FAILED",
                    "Import worker stopped before reporting",
                )
                .with_details(format!("index={idx}")))
            })
        })
        .collect()
}

/// Transform, pre-filter and submit a parsed batch. Never fails as a whole; every record is tallied once.
pub fn run_import<R: RemoteStore + ?Sized, G: Rng>(
    remote: &R,
    records: &[RawRecord],
    config: &EngineConfig,
    now: OffsetDateTime,
    rng: &mut G,
) -> ImportSummary {
    let mut warnings = Vec::new();
    let mut rows = Vec::new();
    let mut payloads = Vec::new();
    for record in records {
        if let Some(payload) = transform_record(record, config, now, rng, &mut warnings) {
            rows.push(record.row);
            payloads.push(payload);
        }
    }
    let dropped = records.len() - payloads.len();
    debug!(records = records.len(), dropped, "import batch transformed");

    let outcomes = submit_concurrently(remote, &payloads, config.import_workers);

    let mut created_ids = Vec::new();
    let mut failed = 0;
    for (row, outcome) in rows.iter().zip(outcomes) {
        match outcome {
            Ok(id) => created_ids.push(id),
            Err(e) => {
                failed += 1;
                warnings.push(
                    ValidationWarning::new("IMPORT_CREATE_FAILED", "Record was not created")
                        .with_details(format!("row={row}; code={}", e.code)),
                );
            }
        }
    }

    let summary = ImportSummary {
        total: records.len(),
        succeeded: created_ids.len(),
        failed,
        dropped,
        created_ids,
        warnings,
    };
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        dropped = summary.dropped,
        "import finished"
    );
    summary
}
