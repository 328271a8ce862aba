//! Flattening of nested Redmine issues into fixed-width rows for aggregation.
//!
//! Every row carries the same fields regardless of what the server sent:
//! missing names become empty strings, missing numbers become zero and
//! unparseable dates become `None`. Nothing here can fail.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use redmine_api::{NameOr, RawIssue};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// One issue as a flat record. `None` on a date field is the "missing" marker.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub id: i64,
    pub project_name: String,
    pub tracker_name: String,
    pub status_name: String,
    pub priority_name: String,
    pub subject: String,
    pub description: String,
    pub author_name: String,
    pub assignee_name: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub created_on: Option<DateTime<Utc>>,
    pub updated_on: Option<DateTime<Utc>>,
    pub closed_on: Option<DateTime<Utc>>,
    pub done_ratio: i64,
    pub estimated_hours: f64,
    pub spent_hours: f64,
    pub is_private: bool,
}

pub fn normalize(raw: &RawIssue) -> NormalizedRow {
    NormalizedRow {
        id: raw.id.unwrap_or(0),
        project_name: raw.project.name_or("").to_string(),
        tracker_name: raw.tracker.name_or("").to_string(),
        status_name: raw.status.name_or("").to_string(),
        priority_name: raw.priority.name_or("").to_string(),
        subject: raw.subject.clone().unwrap_or_default(),
        description: raw.description.clone().unwrap_or_default(),
        author_name: raw.author.name_or("").to_string(),
        assignee_name: raw.assigned_to.name_or("").to_string(),
        start_date: parse_date(raw.start_date.as_deref()),
        due_date: parse_date(raw.due_date.as_deref()),
        created_on: parse_timestamp(raw.created_on.as_deref()),
        updated_on: parse_timestamp(raw.updated_on.as_deref()),
        closed_on: parse_timestamp(raw.closed_on.as_deref()),
        done_ratio: raw.done_ratio.unwrap_or(0),
        estimated_hours: hours_or_zero(raw.estimated_hours),
        spent_hours: hours_or_zero(raw.spent_hours),
        is_private: raw.is_private.unwrap_or(false),
    }
}

/// Normalizes a batch, one row per issue, in input order.
pub fn normalize_all(raws: &[RawIssue]) -> Vec<NormalizedRow> {
    raws.iter().map(normalize).collect()
}

/// Zero, null, negative and non-finite hours all collapse to `0.0`.
fn hours_or_zero(value: Option<f64>) -> f64 {
    value
        .filter(|hours| hours.is_finite() && *hours > 0.0)
        .unwrap_or(0.0)
}

/// Parses a calendar date, accepting full timestamps as well.
pub fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let text = value.map(str::trim).filter(|text| !text.is_empty())?;
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| parse_timestamp(Some(text)).map(|timestamp| timestamp.date_naive()))
}

/// Parses an ISO-8601 timestamp. Values without an offset are taken as UTC;
/// bare dates become midnight.
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let text = value.map(str::trim).filter(|text| !text.is_empty())?;

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Some(naive) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Some(naive.and_utc());
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
