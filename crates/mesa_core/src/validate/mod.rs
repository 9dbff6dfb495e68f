use crate::domain::{NewReport, ValidationWarning};
use crate::error::AppError;

/// Minimum description length accepted at creation. Partial patches are not re-validated.
pub const MIN_DESCRIPTION_CHARS: usize = 20;

/// Check a creation payload. Departments are non-empty by construction.
pub fn validate_new_report(report: &NewReport) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let description_chars = report.description.trim().chars().count();
    if description_chars < MIN_DESCRIPTION_CHARS {
        warnings.push(
            ValidationWarning::new(
                "VALIDATION_DESCRIPTION_TOO_SHORT",
                format!("Description must have at least {MIN_DESCRIPTION_CHARS} characters"),
            )
            .with_details(format!("chars={description_chars}")),
        );
    }

    for (field, value) in [
        ("reportedBy", &report.reported_by),
        ("problemType", &report.problem_type),
    ] {
        if value.trim().is_empty() {
            warnings.push(ValidationWarning::new(
                "VALIDATION_REQUIRED_FIELD_MISSING",
                format!("{field} is required"),
            ));
        }
    }

    warnings
}

/// Reject a creation payload with a single `Validation` error listing every problem.
pub fn ensure_valid_new_report(report: &NewReport) -> Result<(), AppError> {
    let warnings = validate_new_report(report);
    if warnings.is_empty() {
        return Ok(());
    }
    let details = warnings
        .iter()
        .map(|w| w.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    Err(AppError::validation("VALIDATION_FAILED", "Report is incomplete").with_details(details))
}
