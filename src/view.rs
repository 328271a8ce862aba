//! Plain-text rendering of issues for the terminal.

use redmine_api::{JournalEntry, NameOr, RawIssue};

use crate::layout::{format_hours, short_timestamp, Labels};
use crate::normalize::NormalizedRow;

pub const LIST_SUBJECT_CHARS: usize = 50;
pub const RECENT_COMMENTS: usize = 5;

/// `#id | subject | status | assignee`, with long subjects shortened.
pub fn list_entry(row: &NormalizedRow, labels: &Labels) -> String {
    let subject = if row.subject.chars().count() > LIST_SUBJECT_CHARS {
        let head: String = row.subject.chars().take(LIST_SUBJECT_CHARS).collect();
        format!("{head}...")
    } else {
        row.subject.clone()
    };
    let assignee = if row.assignee_name.is_empty() {
        labels.unassigned
    } else {
        row.assignee_name.as_str()
    };
    format!("#{} | {} | {} | {}", row.id, subject, row.status_name, assignee)
}

/// Journal entries with notes, oldest first, at most the last `limit`.
pub fn recent_comments(journals: &[JournalEntry], limit: usize) -> Vec<&JournalEntry> {
    let comments: Vec<&JournalEntry> = journals
        .iter()
        .filter(|entry| entry.comment().is_some())
        .collect();
    let skip = comments.len().saturating_sub(limit);
    comments.into_iter().skip(skip).collect()
}

/// Multi-section detail view of a single issue.
pub fn issue_detail(raw: &RawIssue, labels: &Labels) -> String {
    let field = |label: &str, value: &str| format!("  {label}: {value}");
    let or_unassigned = |value: &str| -> String {
        if value.trim().is_empty() {
            labels.unassigned.to_string()
        } else {
            value.to_string()
        }
    };

    let subject = raw.subject.as_deref().unwrap_or_default();
    let mut lines = vec![
        format!("#{} {}", raw.id.unwrap_or(0), subject),
        String::new(),
        format!("[{}]", labels.basic_info),
        field(labels.subject, subject),
        field(labels.tracker, raw.tracker.name_or("")),
        field(labels.status, raw.status.name_or("")),
        field(labels.priority, raw.priority.name_or("")),
        field(labels.progress, &format!("{}%", raw.done_ratio.unwrap_or(0))),
        String::new(),
        format!("[{}]", labels.people_and_dates),
        field(labels.author, raw.author.name_or("")),
        field(labels.assignee, &or_unassigned(raw.assigned_to.name_or(""))),
        field(labels.start_date, &or_unassigned(raw.start_date.as_deref().unwrap_or_default())),
        field(labels.due_date, &or_unassigned(raw.due_date.as_deref().unwrap_or_default())),
        field(
            labels.spent_hours,
            &format!("{} {}", format_hours(raw.spent_hours.unwrap_or(0.0)), labels.hours_unit),
        ),
        String::new(),
        format!("[{}]", labels.description),
    ];

    match raw.description.as_deref().map(str::trim).filter(|text| !text.is_empty()) {
        Some(description) => lines.extend(description.lines().map(|line| format!("  {line}"))),
        None => lines.push(format!("  {}", labels.no_description)),
    }

    let total_comments = raw.journals.iter().filter(|entry| entry.comment().is_some()).count();
    if total_comments > 0 {
        lines.push(String::new());
        lines.push(format!("[{}] ({total_comments})", labels.comment_history));
        for entry in recent_comments(&raw.journals, RECENT_COMMENTS) {
            lines.push(format!(
                "  {} - {}",
                entry.user.name_or(labels.unknown_user),
                short_timestamp(entry.created_on.as_deref())
            ));
            if let Some(notes) = entry.comment() {
                lines.extend(notes.lines().map(|line| format!("    {line}")));
            }
        }
    }

    lines.join("\n")
}
