use std::fmt;

use serde::{Deserialize, Serialize};
use time::macros::time;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Named date range for filtering by report creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateBucket {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    Last7Days,
    Last30Days,
    ThisMonth,
    LastMonth,
    ThisQuarter,
    LastQuarter,
    ThisYear,
    LastYear,
    /// Explicit calendar year.
    Year(i32),
}

/// Inclusive instant range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl DateRange {
    pub fn contains(&self, ts: OffsetDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }
}

impl DateBucket {
    pub fn key(self) -> String {
        match self {
            DateBucket::Today => "today".to_string(),
            DateBucket::Yesterday => "yesterday".to_string(),
            DateBucket::ThisWeek => "this_week".to_string(),
            DateBucket::LastWeek => "last_week".to_string(),
            DateBucket::Last7Days => "last_7_days".to_string(),
            DateBucket::Last30Days => "last_30_days".to_string(),
            DateBucket::ThisMonth => "this_month".to_string(),
            DateBucket::LastMonth => "last_month".to_string(),
            DateBucket::ThisQuarter => "this_quarter".to_string(),
            DateBucket::LastQuarter => "last_quarter".to_string(),
            DateBucket::ThisYear => "this_year".to_string(),
            DateBucket::LastYear => "last_year".to_string(),
            DateBucket::Year(y) => y.to_string(),
        }
    }

    /// Accepts snake_case keys, spaced names ("last 7 days") and four-digit years.
    pub fn parse(raw: &str) -> Option<Self> {
        let folded = raw
            .trim()
            .to_lowercase()
            .replace(['-', ' '], "_");
        let bucket = match folded.as_str() {
            "today" => DateBucket::Today,
            "yesterday" => DateBucket::Yesterday,
            "this_week" => DateBucket::ThisWeek,
            "last_week" => DateBucket::LastWeek,
            "last_7_days" => DateBucket::Last7Days,
            "last_30_days" => DateBucket::Last30Days,
            "this_month" => DateBucket::ThisMonth,
            "last_month" => DateBucket::LastMonth,
            "this_quarter" => DateBucket::ThisQuarter,
            "last_quarter" => DateBucket::LastQuarter,
            "this_year" => DateBucket::ThisYear,
            "last_year" => DateBucket::LastYear,
            other if other.len() == 4 && other.chars().all(|c| c.is_ascii_digit()) => {
                DateBucket::Year(other.parse().ok()?)
            }
            _ => return None,
        };
        Some(bucket)
    }

    /// Resolve against `now` in the local `offset`.
    ///
    /// Starts are local midnight; ends are the last nanosecond of the final day, so a whole end day
    /// is included. Weeks start on Monday, quarters group months from January.
    /// Returns `None` only for years outside the representable calendar.
    pub fn resolve(self, now: OffsetDateTime, offset: UtcOffset) -> Option<DateRange> {
        let today = now.to_offset(offset).date();
        let (first, last) = match self {
            DateBucket::Today => (today, today),
            DateBucket::Yesterday => {
                let y = today.previous_day()?;
                (y, y)
            }
            DateBucket::ThisWeek => {
                let monday = monday_of(today);
                (monday, monday + Duration::days(6))
            }
            DateBucket::LastWeek => {
                let monday = monday_of(today) - Duration::days(7);
                (monday, monday + Duration::days(6))
            }
            DateBucket::Last7Days => (today - Duration::days(6), today),
            DateBucket::Last30Days => (today - Duration::days(29), today),
            DateBucket::ThisMonth => month_span(today.year(), today.month(), 1)?,
            DateBucket::LastMonth => {
                let (y, m) = shift_month(today.year(), today.month(), -1);
                month_span(y, m, 1)?
            }
            DateBucket::ThisQuarter => {
                let q_start = quarter_start(today.month());
                month_span(today.year(), q_start, 3)?
            }
            DateBucket::LastQuarter => {
                let (y, m) = shift_month(today.year(), quarter_start(today.month()), -3);
                month_span(y, m, 3)?
            }
            DateBucket::ThisYear => month_span(today.year(), Month::January, 12)?,
            DateBucket::LastYear => month_span(today.year() - 1, Month::January, 12)?,
            DateBucket::Year(y) => month_span(y, Month::January, 12)?,
        };
        Some(DateRange {
            start: first.midnight().assume_offset(offset),
            end: PrimitiveDateTime::new(last, time!(23:59:59.999_999_999)).assume_offset(offset),
        })
    }
}

fn monday_of(day: Date) -> Date {
    day - Duration::days(i64::from(day.weekday().number_days_from_monday()))
}

fn quarter_start(month: Month) -> Month {
    match month {
        Month::January | Month::February | Month::March => Month::January,
        Month::April | Month::May | Month::June => Month::April,
        Month::July | Month::August | Month::September => Month::July,
        Month::October | Month::November | Month::December => Month::October,
    }
}

fn shift_month(year: i32, month: Month, delta: i32) -> (i32, Month) {
    let zero_based = year * 12 + i32::from(month as u8) - 1 + delta;
    let y = zero_based.div_euclid(12);
    let m = zero_based.rem_euclid(12) + 1;
    let month = u8::try_from(m)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .unwrap_or(Month::January);
    (y, month)
}

/// First day of `month` through the last day of the `months`-th month.
fn month_span(year: i32, month: Month, months: i32) -> Option<(Date, Date)> {
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let (end_year, end_month) = shift_month(year, month, months - 1);
    let last_day = time::util::days_in_year_month(end_year, end_month);
    let last = Date::from_calendar_date(end_year, end_month, last_day).ok()?;
    Some((first, last))
}

impl TryFrom<String> for DateBucket {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("unknown date bucket: {raw}"))
    }
}

impl From<DateBucket> for String {
    fn from(b: DateBucket) -> Self {
        b.key()
    }
}

impl fmt::Display for DateBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
