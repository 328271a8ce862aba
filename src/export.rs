//! CSV export of normalized rows and the shared export error type.

use chrono::{DateTime, Local, NaiveDate, Utc};
use csv::Writer;
use thiserror::Error;

use crate::normalize::NormalizedRow;

/// Spreadsheet tools need the byte-order mark to detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const CSV_HEADERS: [&str; 18] = [
    "id",
    "project_name",
    "tracker_name",
    "status_name",
    "priority_name",
    "subject",
    "description",
    "author_name",
    "assignee_name",
    "start_date",
    "due_date",
    "created_on",
    "updated_on",
    "closed_on",
    "done_ratio",
    "estimated_hours",
    "spent_hours",
    "is_private",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write archive entry: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Writes rows as UTF-8 CSV (with BOM) in [`CSV_HEADERS`] order.
pub fn rows_to_csv<'a, I>(rows: I) -> Result<Vec<u8>, ExportError>
where
    I: IntoIterator<Item = &'a NormalizedRow>,
{
    let mut writer = Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(CSV_HEADERS)?;

    for row in rows {
        writer.write_record(record(row))?;
    }

    writer.flush()?;
    writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))
}

fn record(row: &NormalizedRow) -> [String; 18] {
    [
        row.id.to_string(),
        row.project_name.clone(),
        row.tracker_name.clone(),
        row.status_name.clone(),
        row.priority_name.clone(),
        row.subject.clone(),
        row.description.clone(),
        row.author_name.clone(),
        row.assignee_name.clone(),
        format_date(row.start_date),
        format_date(row.due_date),
        format_timestamp(row.created_on),
        format_timestamp(row.updated_on),
        format_timestamp(row.closed_on),
        row.done_ratio.to_string(),
        row.estimated_hours.to_string(),
        row.spent_hours.to_string(),
        row.is_private.to_string(),
    ]
}

fn format_date(value: Option<NaiveDate>) -> String {
    value
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn format_timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|timestamp| timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// `redmine_tickets_<local timestamp>.csv`
pub fn default_csv_filename(now: DateTime<Local>) -> String {
    format!("redmine_tickets_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// `ticket_<id>_report_<local timestamp>.pptx`
pub fn default_report_filename(issue_id: i64, now: DateTime<Local>) -> String {
    format!("ticket_{issue_id}_report_{}.pptx", now.format("%Y%m%d_%H%M%S"))
}
