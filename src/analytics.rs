//! Aggregations over normalized rows backing the `summary` command.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalize::NormalizedRow;

pub const DEFAULT_CLOSED_STATUS_PATTERN: &str = "終了|完了|解決済み|Closed|Resolved|Rejected";
pub const TOP_ASSIGNEES: usize = 10;
pub const SCHEDULE_LIMIT: usize = 20;

static DEFAULT_CLOSED_STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(DEFAULT_CLOSED_STATUS_PATTERN).expect("default closed-status pattern is valid")
});

/// Equality filter on project and status names; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilter {
    pub project: Option<String>,
    pub status: Option<String>,
}

impl IssueFilter {
    pub fn matches(&self, row: &NormalizedRow) -> bool {
        let project_ok = self
            .project
            .as_deref()
            .map_or(true, |project| row.project_name == project);
        let status_ok = self
            .status
            .as_deref()
            .map_or(true, |status| row.status_name == status);
        project_ok && status_ok
    }

    /// Keeps the rows that match, in their original order.
    pub fn apply(&self, mut rows: Vec<NormalizedRow>) -> Vec<NormalizedRow> {
        rows.retain(|row| self.matches(row));
        rows
    }
}

/// Classifies status names as closed or open.
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    closed: Regex,
}

impl StatusClassifier {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            closed: Regex::new(pattern)?,
        })
    }

    pub fn is_closed(&self, status_name: &str) -> bool {
        self.closed.is_match(status_name)
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self {
            closed: DEFAULT_CLOSED_STATUS.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub total: usize,
    pub open: usize,
    /// `None` when there are no rows.
    pub mean_progress: Option<f64>,
    pub total_spent_hours: f64,
}

pub fn overview(rows: &[&NormalizedRow], statuses: &StatusClassifier) -> Overview {
    let total = rows.len();
    let open = rows
        .iter()
        .filter(|row| !statuses.is_closed(&row.status_name))
        .count();
    let mean_progress = (total > 0)
        .then(|| rows.iter().map(|row| row.done_ratio as f64).sum::<f64>() / total as f64);
    let total_spent_hours = rows.iter().map(|row| row.spent_hours).sum();

    Overview {
        total,
        open,
        mean_progress,
        total_spent_hours,
    }
}

/// Grouping keys for [`value_counts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Status,
    Priority,
    Tracker,
    Project,
    Assignee,
}

impl Dimension {
    fn key<'a>(&self, row: &'a NormalizedRow) -> &'a str {
        match self {
            Dimension::Status => &row.status_name,
            Dimension::Priority => &row.priority_name,
            Dimension::Tracker => &row.tracker_name,
            Dimension::Project => &row.project_name,
            Dimension::Assignee => &row.assignee_name,
        }
    }
}

/// Counts rows per value, most frequent first, ties by name.
pub fn value_counts(rows: &[&NormalizedRow], dimension: Dimension) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(dimension.key(row)).or_default() += 1;
    }

    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Top assignees by issue count. Unassigned rows are left out.
pub fn assignee_counts(rows: &[&NormalizedRow]) -> Vec<(String, usize)> {
    value_counts(rows, Dimension::Assignee)
        .into_iter()
        .filter(|(name, _)| !name.is_empty())
        .take(TOP_ASSIGNEES)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workload {
    pub assignee: String,
    pub estimated_hours: f64,
    pub spent_hours: f64,
    pub issues: usize,
}

/// Per-assignee hour totals, ordered by name, first ten names.
pub fn workload_by_assignee(rows: &[&NormalizedRow]) -> Vec<Workload> {
    let mut grouped: BTreeMap<&str, Workload> = BTreeMap::new();
    for row in rows.iter().filter(|row| !row.assignee_name.is_empty()) {
        let entry = grouped
            .entry(row.assignee_name.as_str())
            .or_insert_with(|| Workload {
                assignee: row.assignee_name.clone(),
                ..Workload::default()
            });
        entry.estimated_hours += row.estimated_hours;
        entry.spent_hours += row.spent_hours;
        entry.issues += 1;
    }
    grouped.into_values().take(TOP_ASSIGNEES).collect()
}

/// Due-date counts per `YYYY-MM`, chronological.
pub fn deadline_months(rows: &[&NormalizedRow]) -> Vec<(String, usize)> {
    let mut months: BTreeMap<String, usize> = BTreeMap::new();
    for due in rows.iter().filter_map(|row| row.due_date) {
        *months.entry(due.format("%Y-%m").to_string()).or_default() += 1;
    }
    months.into_iter().collect()
}

/// Unfinished issues whose due date has passed.
pub fn overdue<'a>(rows: &[&'a NormalizedRow], today: NaiveDate) -> Vec<&'a NormalizedRow> {
    rows.iter()
        .copied()
        .filter(|row| row.done_ratio < 100)
        .filter(|row| row.due_date.is_some_and(|due| due < today))
        .collect()
}

/// Unfinished issues due between today and `today + window_days`, inclusive.
pub fn upcoming<'a>(
    rows: &[&'a NormalizedRow],
    today: NaiveDate,
    window_days: u32,
) -> Vec<&'a NormalizedRow> {
    let horizon = today
        .checked_add_signed(Duration::days(i64::from(window_days)))
        .unwrap_or(NaiveDate::MAX);
    rows.iter()
        .copied()
        .filter(|row| row.done_ratio < 100)
        .filter(|row| row.due_date.is_some_and(|due| today <= due && due <= horizon))
        .collect()
}

/// Rows with both a start and a due date, first twenty in input order.
pub fn schedule<'a>(rows: &[&'a NormalizedRow]) -> Vec<&'a NormalizedRow> {
    rows.iter()
        .copied()
        .filter(|row| row.start_date.is_some() && row.due_date.is_some())
        .take(SCHEDULE_LIMIT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use redmine_api::RawIssue;
    use serde_json::json;

    fn row(value: serde_json::Value) -> NormalizedRow {
        let raw: RawIssue = serde_json::from_value(value).unwrap();
        normalize(&raw)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn refs(rows: &[NormalizedRow]) -> Vec<&NormalizedRow> {
        rows.iter().collect()
    }

    fn sample() -> Vec<NormalizedRow> {
        vec![
            row(json!({"id": 1, "project": {"name": "Web"}, "status": {"name": "New"}, "priority": {"name": "High"},
                "assigned_to": {"name": "Bob"}, "done_ratio": 20, "estimated_hours": 4.0, "spent_hours": 1.5,
                "start_date": "2024-01-01", "due_date": "2024-01-10"})),
            row(json!({"id": 2, "project": {"name": "Web"}, "status": {"name": "終了"}, "priority": {"name": "Normal"},
                "assigned_to": {"name": "Alice"}, "done_ratio": 100, "spent_hours": 6.0, "due_date": "2024-01-05"})),
            row(json!({"id": 3, "project": {"name": "API"}, "status": {"name": "New"}, "priority": {"name": "High"},
                "assigned_to": {"name": "Bob"}, "done_ratio": 60, "estimated_hours": 2.0, "due_date": "2024-02-03"})),
            row(json!({"id": 4, "project": {"name": "API"}, "status": {"name": "In Progress"}, "priority": {"name": "Low"},
                "done_ratio": 0, "start_date": "2024-01-20"})),
        ]
    }

    #[test]
    fn filter_matches_by_project_and_status() {
        let rows = sample();
        let filter = IssueFilter {
            project: Some("Web".into()),
            status: Some("New".into()),
        };
        let ids: Vec<_> = filter.apply(rows.clone()).iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(IssueFilter::default().apply(rows).len(), 4);
    }

    #[test]
    fn overview_counts_open_issues_with_closed_pattern() {
        let rows = sample();
        let all = refs(&rows);
        let summary = overview(&all, &StatusClassifier::default());

        assert_eq!(summary.total, 4);
        assert_eq!(summary.open, 3);
        assert_eq!(summary.mean_progress, Some(45.0));
        assert_eq!(summary.total_spent_hours, 7.5);
    }

    #[test]
    fn overview_of_nothing_has_no_mean() {
        let summary = overview(&[], &StatusClassifier::default());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.mean_progress, None);
    }

    #[test]
    fn custom_closed_pattern_is_honored() {
        let statuses = StatusClassifier::new("^New$").unwrap();
        assert!(statuses.is_closed("New"));
        assert!(!statuses.is_closed("終了"));
        assert!(StatusClassifier::new("(").is_err());
    }

    #[test]
    fn value_counts_sort_by_frequency_then_name() {
        let rows = sample();
        let all = refs(&rows);
        assert_eq!(
            value_counts(&all, Dimension::Priority),
            vec![("High".to_string(), 2), ("Low".to_string(), 1), ("Normal".to_string(), 1)]
        );
    }

    #[test]
    fn assignee_counts_skip_unassigned() {
        let rows = sample();
        let all = refs(&rows);
        assert_eq!(
            assignee_counts(&all),
            vec![("Bob".to_string(), 2), ("Alice".to_string(), 1)]
        );
    }

    #[test]
    fn workload_groups_by_assignee_name() {
        let rows = sample();
        let all = refs(&rows);
        let workload = workload_by_assignee(&all);

        assert_eq!(workload.len(), 2);
        assert_eq!(workload[0].assignee, "Alice");
        assert_eq!(workload[0].spent_hours, 6.0);
        assert_eq!(workload[1].assignee, "Bob");
        assert_eq!(workload[1].estimated_hours, 6.0);
        assert_eq!(workload[1].spent_hours, 1.5);
        assert_eq!(workload[1].issues, 2);
    }

    #[test]
    fn deadline_months_are_chronological() {
        let rows = sample();
        let all = refs(&rows);
        assert_eq!(
            deadline_months(&all),
            vec![("2024-01".to_string(), 2), ("2024-02".to_string(), 1)]
        );
    }

    #[test]
    fn overdue_ignores_finished_and_undated_issues() {
        let rows = sample();
        let all = refs(&rows);
        let ids: Vec<_> = overdue(&all, date(2024, 1, 15)).iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn upcoming_window_is_inclusive() {
        let rows = sample();
        let all = refs(&rows);
        let ids: Vec<_> = upcoming(&all, date(2024, 1, 27), 7).iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![3]);
        assert!(upcoming(&all, date(2024, 1, 26), 7).is_empty());
        let today: Vec<_> = upcoming(&all, date(2024, 1, 10), 0).iter().map(|row| row.id).collect();
        assert_eq!(today, vec![1]);
    }

    #[test]
    fn upcoming_window_past_the_calendar_end_is_clamped() {
        let rows = sample();
        let all = refs(&rows);
        let ids: Vec<_> = upcoming(&all, date(2024, 1, 6), u32::MAX)
            .iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(upcoming(&[], NaiveDate::MAX, 1).is_empty());
    }

    #[test]
    fn schedule_needs_both_dates_and_is_capped() {
        let rows: Vec<_> = (0..25)
            .map(|id| row(json!({"id": id, "start_date": "2024-01-01", "due_date": "2024-01-02"})))
            .chain(std::iter::once(row(json!({"id": 99, "start_date": "2024-01-01"}))))
            .collect();
        let all = refs(&rows);
        let scheduled = schedule(&all);
        assert_eq!(scheduled.len(), SCHEDULE_LIMIT);
        assert!(scheduled.iter().all(|row| row.id != 99));

        let sample = sample();
        let sample_rows = refs(&sample);
        let ids: Vec<_> = schedule(&sample_rows).iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![1]);
    }
}
