use std::borrow::Borrow;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};
use tracing::info;

use crate::domain::Report;
use crate::error::AppError;
use crate::normalize::timestamps::{filename_stamp, format_display, format_rfc3339};

pub const EXPORT_MANIFEST_VERSION: u32 = 1;

/// Column order of the tabular export; import accepts the same names.
pub const CSV_HEADER: [&str; 9] = [
    "ID",
    "Departamento",
    "Descripcion",
    "TipoProblema",
    "QuienReporta",
    "Prioridad",
    "Estado",
    "AsignadoA",
    "FechaHora",
];

pub const CSV_FILENAME: &str = "reportes.csv";
pub const JSON_FILENAME: &str = "reportes.json";
pub const MANIFEST_FILENAME: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportManifest {
    pub manifest_version: u32,
    pub export_time: String,
    pub report_count: i64,
    pub files: Vec<ExportFileInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportFileInfo {
    pub filename: String,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportBundleResult {
    pub export_dir: String,
    pub report_count: i64,
}

/// Flat table: departments joined with `, `, dates in the local display format, blank for no assignee.
pub fn export_csv<R: Borrow<Report>>(view: &[R], offset: UtcOffset) -> Result<String, AppError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    let encode_err = |e: csv::Error| {
        AppError::internal("EXPORT_CSV_ENCODE_FAILED", "Failed to encode CSV export")
            .with_details(e.to_string())
    };
    wtr.write_record(CSV_HEADER).map_err(encode_err)?;
    for r in view.iter().map(<R as Borrow<Report>>::borrow) {
        let departments = r.departments.joined();
        let timestamp = format_display(r.timestamp, offset);
        let row: [&str; 9] = [
            r.id.as_str(),
            &departments,
            &r.description,
            &r.problem_type,
            &r.reported_by,
            r.priority.label(),
            r.status.label(),
            r.assignee.as_deref().unwrap_or(""),
            &timestamp,
        ];
        wtr.write_record(row).map_err(encode_err)?;
    }
    let bytes = wtr.into_inner().map_err(|e| {
        AppError::internal("EXPORT_CSV_ENCODE_FAILED", "Failed to flush CSV export")
            .with_details(e.to_string())
    })?;
    String::from_utf8(bytes).map_err(|e| {
        AppError::internal("EXPORT_CSV_ENCODE_FAILED", "CSV export is not valid UTF-8")
            .with_details(e.to_string())
    })
}

/// Entity shape verbatim, including the normalized department list.
pub fn export_json<R: Borrow<Report>>(view: &[R]) -> Result<String, AppError> {
    let reports: Vec<&Report> = view.iter().map(<R as Borrow<Report>>::borrow).collect();
    serde_json::to_string_pretty(&reports).map_err(|e| {
        AppError::internal("EXPORT_JSON_ENCODE_FAILED", "Failed to encode JSON export")
            .with_details(e.to_string())
    })
}

fn sha256_file_hex(path: &Path) -> Result<(String, u64), AppError> {
    use sha2::{Digest, Sha256};
    use std::io::Read;

    let mut f = fs::File::open(path).map_err(|e| {
        AppError::internal("EXPORT_FILE_OPEN_FAILED", "Failed to open file for hashing")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut total: u64 = 0;
    loop {
        let n = f.read(&mut buf).map_err(|e| {
            AppError::internal("EXPORT_FILE_READ_FAILED", "Failed to read file for hashing")
                .with_details(format!("path={}: {}", path.display(), e))
        })?;
        if n == 0 {
            break;
        }
        total += n as u64;
        hasher.update(&buf[..n]);
    }
    Ok((hex::encode(hasher.finalize()), total))
}

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, AppError> {
    let path = dir.join(name);
    fs::write(&path, contents.as_bytes()).map_err(|e| {
        AppError::internal("EXPORT_WRITE_FAILED", "Failed to write export file")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    Ok(path)
}

/// Write both formats plus a hashed manifest into `Reportes_<stamp>` under `destination_dir`.
///
/// The destination must already exist and the bundle folder must not; nothing is overwritten.
pub fn export_bundle<R: Borrow<Report>>(
    view: &[R],
    destination_dir: &Path,
    export_time: OffsetDateTime,
    offset: UtcOffset,
) -> Result<ExportBundleResult, AppError> {
    if !destination_dir.is_dir() {
        return Err(AppError::validation(
            "EXPORT_DEST_NOT_DIR",
            "Export destination must be an existing directory",
        )
        .with_details(destination_dir.display().to_string()));
    }

    let export_dir = destination_dir.join(format!(
        "Reportes_{}",
        filename_stamp(export_time, offset)
    ));
    if export_dir.exists() {
        return Err(AppError::validation(
            "EXPORT_DEST_EXISTS",
            "Export destination folder already exists",
        )
        .with_details(export_dir.display().to_string()));
    }
    fs::create_dir_all(&export_dir).map_err(|e| {
        AppError::internal("EXPORT_MKDIR_FAILED", "Failed to create export directory")
            .with_details(format!("path={}: {}", export_dir.display(), e))
    })?;

    let csv_path = write_file(&export_dir, CSV_FILENAME, &export_csv(view, offset)?)?;
    let json_path = write_file(&export_dir, JSON_FILENAME, &export_json(view)?)?;

    let mut files = Vec::new();
    for (name, path) in [(CSV_FILENAME, csv_path), (JSON_FILENAME, json_path)] {
        let (sha256, bytes) = sha256_file_hex(&path)?;
        files.push(ExportFileInfo {
            filename: name.to_string(),
            bytes,
            sha256,
        });
    }
    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    let manifest = ExportManifest {
        manifest_version: EXPORT_MANIFEST_VERSION,
        export_time: format_rfc3339(export_time),
        report_count: view.len() as i64,
        files,
    };
    let manifest_json = serde_json::to_string_pretty(&manifest).map_err(|e| {
        AppError::internal("EXPORT_JSON_ENCODE_FAILED", "Failed to encode export manifest")
            .with_details(e.to_string())
    })?;
    write_file(&export_dir, MANIFEST_FILENAME, &manifest_json)?;

    info!(dir = %export_dir.display(), reports = view.len(), "export bundle written");
    Ok(ExportBundleResult {
        export_dir: export_dir.to_string_lossy().to_string(),
        report_count: view.len() as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::sample_report;
    use crate::domain::Departments;
    use pretty_assertions::assert_eq;
    use time::macros::{datetime, offset};

    #[test]
    fn csv_export_uses_display_dates_and_joined_departments() {
        let mut r = sample_report("7", "2025-06-10T14:03:00Z");
        r.departments = Departments::parse_text("Obras, Catastro").expect("dept");
        r.assignee = Some("Lucía Ramírez".to_string());
        let out = export_csv(&[r], offset!(-5)).expect("csv");
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("ID,Departamento,Descripcion,TipoProblema,QuienReporta,Prioridad,Estado,AsignadoA,FechaHora")
        );
        assert_eq!(
            lines.next(),
            Some("7,\"Obras, Catastro\",No funciona la impresora de la oficina principal,Impresora,Ana Torres,Baja,Pendiente,Lucía Ramírez,\"10/6/2025, 09:03:00\"")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn json_export_keeps_department_list() {
        let r = sample_report("1", "2025-06-10T09:00:00Z");
        let json = export_json(&[&r]).expect("json");
        let v: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(v[0]["departamento"], serde_json::json!(["Catastro"]));
        assert_eq!(v[0]["fechaHora"], "2025-06-10T09:00:00Z");
    }

    #[test]
    fn bundle_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let view = vec![sample_report("1", "2025-06-10T09:00:00Z")];
        let at = datetime!(2025-06-10 12:00:00 UTC);
        export_bundle(&view, tmp.path(), at, offset!(UTC)).expect("first");
        let err = export_bundle(&view, tmp.path(), at, offset!(UTC)).expect_err("second");
        assert_eq!(err.code, "EXPORT_DEST_EXISTS");
    }
}
