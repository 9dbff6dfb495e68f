use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Local display format used by the tabular export, e.g. `10/6/2025, 14:03:00`.
const DISPLAY: &[BorrowedFormatItem<'static>] = format_description!(
    "[day padding:none]/[month padding:none]/[year], [hour]:[minute]:[second]"
);

/// Formats without an offset, interpreted in the configured local offset.
const LOCAL_ALLOWLIST: &[&[BorrowedFormatItem<'static>]] = &[
    DISPLAY,
    format_description!("[day padding:none]/[month padding:none]/[year] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
];

const DATE_ONLY: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day]"),
    format_description!("[day padding:none]/[month padding:none]/[year]"),
];

/// Parse a timestamp from the shapes seen in remote payloads and import files.
///
/// RFC3339 keeps its own offset; everything else is read as local wall time at `offset`.
/// Returns `None` for blank or unrecognized input (no fuzzy guessing).
pub fn parse_timestamp(raw: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(dt);
    }

    for fmt in LOCAL_ALLOWLIST.iter().copied() {
        if let Ok(pdt) = PrimitiveDateTime::parse(trimmed, fmt) {
            return Some(pdt.assume_offset(offset));
        }
    }

    for fmt in DATE_ONLY.iter().copied() {
        if let Ok(date) = Date::parse(trimmed, fmt) {
            return Some(date.midnight().assume_offset(offset));
        }
    }

    None
}

/// Render an instant in the local display format at `offset`.
pub fn format_display(ts: OffsetDateTime, offset: UtcOffset) -> String {
    ts.to_offset(offset)
        .format(DISPLAY)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

pub fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

/// Filename-safe stamp (`20250610T143000`) in the local offset.
pub fn filename_stamp(ts: OffsetDateTime, offset: UtcOffset) -> String {
    ts.to_offset(offset)
        .format(format_description!(
            "[year][month][day]T[hour][minute][second]"
        ))
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}
