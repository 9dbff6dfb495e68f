//! Export of the filtered view and ingestion of externally authored batches.

pub mod export;
pub mod import;

pub use export::{
    export_bundle, export_csv, export_json, ExportBundleResult, ExportFileInfo, ExportManifest,
    CSV_HEADER,
};
pub use import::{
    parse_records, run_import, submit_concurrently, transform_record, ImportFormat, ImportSummary,
    RawField, RawRecord,
};
