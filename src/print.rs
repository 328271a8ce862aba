use chrono::NaiveDate;
use redmine_api::Project;

use crate::analytics::{Overview, Workload};
use crate::config::Config;
use crate::layout::format_hours;
use crate::normalize::NormalizedRow;

pub fn print_overview(overview: &Overview) {
    let mean = overview
        .mean_progress
        .map(|mean| format!("{mean:.1}%"))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "Issues: {} | Open: {} | Mean progress: {} | Spent: {} h",
        overview.total,
        overview.open,
        mean,
        format_hours(overview.total_spent_hours)
    );
}

pub fn print_counts(title: &str, counts: &[(String, usize)]) {
    println!("\n{title}:");
    if counts.is_empty() {
        println!("  (none)");
        return;
    }
    let width = counts
        .iter()
        .map(|(name, _)| display_name(name).chars().count())
        .max()
        .unwrap_or(0);
    for (name, count) in counts {
        let name = display_name(name);
        let pad = width.saturating_sub(name.chars().count());
        println!("  {name}{} {count:>5}", " ".repeat(pad));
    }
}

pub fn print_workload(workload: &[Workload]) {
    println!("\nWorkload by assignee (estimated / spent / issues):");
    if workload.is_empty() {
        println!("  (none)");
        return;
    }
    for entry in workload {
        println!(
            "  {}: {} h / {} h / {}",
            entry.assignee,
            format_hours(entry.estimated_hours),
            format_hours(entry.spent_hours),
            entry.issues
        );
    }
}

pub fn print_dated_rows(title: &str, rows: &[&NormalizedRow]) {
    println!("\n{title}: {}", rows.len());
    for row in rows {
        println!(
            "  #{} {} [{}] due {} ({}%, {})",
            row.id,
            row.subject,
            row.status_name,
            format_date(row.due_date),
            row.done_ratio,
            display_name(&row.assignee_name)
        );
    }
}

pub fn print_schedule(rows: &[&NormalizedRow]) {
    println!("\nSchedule (first {}):", rows.len());
    for row in rows {
        println!(
            "  #{} {} -> {}  {}",
            row.id,
            format_date(row.start_date),
            format_date(row.due_date),
            row.subject
        );
    }
}

pub fn print_projects(projects: &[Project]) {
    println!("{} projects", projects.len());
    for project in projects {
        println!(
            "- {} [{}] {}",
            project.id.map(|id| id.to_string()).unwrap_or_default(),
            project.identifier.as_deref().unwrap_or(""),
            project.name.as_deref().unwrap_or("")
        );
    }
}

pub fn print_config(config: &Config, path: &std::path::Path) {
    println!("Config file: {}", path.display());
    for (key, value) in config.entries() {
        println!("  {key} = {value}");
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "(unset)"
    } else {
        name
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}
