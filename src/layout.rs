//! Fixed single-page issue report template.
//!
//! [`layout`] turns one issue (with journals) into positioned text and shape
//! blocks. Coordinates and sizes are EMU (English Metric Units, 914400 per
//! inch), the unit Office documents use natively. Block order is paint order.

use std::fmt;
use std::str::FromStr;

use redmine_api::{JournalEntry, NameOr, RawIssue};
use serde::{Deserialize, Serialize};

pub const EMU_PER_INCH: i64 = 914_400;
pub const PAGE_WIDTH: i64 = inches(1000);
pub const PAGE_HEIGHT: i64 = inches(825);
pub const DESCRIPTION_WRAP_WIDTH: usize = 80;
pub const COMMENT_MAX_CHARS: usize = 200;
pub const ELLIPSIS: &str = "...";

const DETAIL_ROW_TOP: i64 = inches(280);
const DETAIL_ROW_STEP: i64 = inches(30);

const DANGER: Rgb = Rgb(220, 53, 69);
const INFO: Rgb = Rgb(23, 162, 184);
const WHITE: Rgb = Rgb(255, 255, 255);
const MUTED: Rgb = Rgb(108, 117, 125);
const DARK: Rgb = Rgb(33, 37, 41);
const PANEL: Rgb = Rgb(248, 249, 250);
const BORDER: Rgb = Rgb(206, 212, 218);

/// Converts hundredths of an inch to EMU.
pub const fn inches(hundredths: i64) -> i64 {
    hundredths * (EMU_PER_INCH / 100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Shape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Uppercase `RRGGBB`.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderStyle {
    #[default]
    None,
    Solid,
    Dashed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStyle {
    /// Points.
    pub font_size: u32,
    pub bold: bool,
    pub color: Rgb,
    pub fill_color: Option<Rgb>,
    pub border_color: Option<Rgb>,
    pub alignment: Alignment,
    pub border_style: BorderStyle,
}

impl BlockStyle {
    fn text(font_size: u32, color: Rgb) -> Self {
        Self {
            font_size,
            bold: false,
            color,
            fill_color: None,
            border_color: None,
            alignment: Alignment::Left,
            border_style: BorderStyle::None,
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn filled(mut self, fill: Rgb) -> Self {
        self.fill_color = Some(fill);
        self
    }

    fn bordered(mut self, color: Rgb, style: BorderStyle) -> Self {
        self.border_color = Some(color);
        self.border_style = style;
        self
    }

    fn aligned(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportBlock {
    pub kind: BlockKind,
    pub position: (i64, i64),
    pub size: (i64, i64),
    pub style: BlockStyle,
    pub content: String,
}

impl ReportBlock {
    fn text(rect: (i64, i64, i64, i64), content: impl Into<String>, style: BlockStyle) -> Self {
        Self::new(BlockKind::Text, rect, content, style)
    }

    fn shape(rect: (i64, i64, i64, i64), content: impl Into<String>, style: BlockStyle) -> Self {
        Self::new(BlockKind::Shape, rect, content, style)
    }

    fn new(
        kind: BlockKind,
        (x, y, width, height): (i64, i64, i64, i64),
        content: impl Into<String>,
        style: BlockStyle,
    ) -> Self {
        Self {
            kind,
            position: (x, y),
            size: (width, height),
            style,
            content: content.into(),
        }
    }
}

/// Language of the fixed report labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLanguage {
    #[default]
    Ja,
    En,
}

impl ReportLanguage {
    pub fn labels(self) -> &'static Labels {
        match self {
            ReportLanguage::Ja => &JA_LABELS,
            ReportLanguage::En => &EN_LABELS,
        }
    }
}

impl FromStr for ReportLanguage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "ja" | "jp" | "japanese" => Ok(ReportLanguage::Ja),
            "en" | "english" => Ok(ReportLanguage::En),
            other => Err(format!("unsupported report language: {other} (expected ja or en)")),
        }
    }
}

impl fmt::Display for ReportLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLanguage::Ja => f.write_str("ja"),
            ReportLanguage::En => f.write_str("en"),
        }
    }
}

/// Fixed strings printed on the report.
#[derive(Debug)]
pub struct Labels {
    pub default_tracker: &'static str,
    pub default_status: &'static str,
    pub project: &'static str,
    pub description: &'static str,
    pub no_description: &'static str,
    pub details: &'static str,
    pub author: &'static str,
    pub assignee: &'static str,
    pub priority: &'static str,
    pub progress: &'static str,
    pub start_date: &'static str,
    pub due_date: &'static str,
    pub spent_hours: &'static str,
    pub hours_unit: &'static str,
    pub comments: &'static str,
    pub no_comments: &'static str,
    pub unknown_user: &'static str,
    pub history: &'static str,
    pub created: &'static str,
    pub last_updated: &'static str,
    pub subject: &'static str,
    pub tracker: &'static str,
    pub status: &'static str,
    pub unassigned: &'static str,
    pub basic_info: &'static str,
    pub people_and_dates: &'static str,
    pub comment_history: &'static str,
}

pub static JA_LABELS: Labels = Labels {
    default_tracker: "チケット",
    default_status: "新規",
    project: "プロジェクト",
    description: "説明",
    no_description: "説明なし",
    details: "詳細",
    author: "作成者",
    assignee: "担当者",
    priority: "優先度",
    progress: "進捗率",
    start_date: "開始日",
    due_date: "期限日",
    spent_hours: "実績工数",
    hours_unit: "時間",
    comments: "コメント",
    no_comments: "コメントなし",
    unknown_user: "不明なユーザー",
    history: "更新履歴",
    created: "作成",
    last_updated: "最終更新",
    subject: "件名",
    tracker: "トラッカー",
    status: "ステータス",
    unassigned: "未設定",
    basic_info: "基本情報",
    people_and_dates: "担当・日程",
    comment_history: "コメント履歴",
};

pub static EN_LABELS: Labels = Labels {
    default_tracker: "ticket",
    default_status: "new",
    project: "project",
    description: "description",
    no_description: "no description",
    details: "details",
    author: "author",
    assignee: "assignee",
    priority: "priority",
    progress: "progress",
    start_date: "start date",
    due_date: "due date",
    spent_hours: "spent time",
    hours_unit: "hours",
    comments: "comments",
    no_comments: "no comments",
    unknown_user: "unknown user",
    history: "update history",
    created: "created",
    last_updated: "last updated",
    subject: "subject",
    tracker: "tracker",
    status: "status",
    unassigned: "unassigned",
    basic_info: "basic info",
    people_and_dates: "people and dates",
    comment_history: "comment history",
};

/// Lays out the report with Japanese labels.
pub fn layout(raw: &RawIssue) -> Vec<ReportBlock> {
    layout_with(raw, ReportLanguage::default())
}

pub fn layout_with(raw: &RawIssue, language: ReportLanguage) -> Vec<ReportBlock> {
    let labels = language.labels();
    let mut blocks = Vec::with_capacity(24);

    push_header(&mut blocks, raw, labels);
    push_title(&mut blocks, raw);
    push_project(&mut blocks, raw, labels);
    push_description(&mut blocks, raw, labels);
    push_details(&mut blocks, raw, labels);
    push_comments(&mut blocks, raw, labels);
    push_footer(&mut blocks, raw, labels);

    blocks
}

fn push_header(blocks: &mut Vec<ReportBlock>, raw: &RawIssue, labels: &Labels) {
    let badge = BlockStyle::text(12, WHITE).bold().aligned(Alignment::Center);

    blocks.push(ReportBlock::shape(
        (inches(50), inches(30), inches(80), inches(40)),
        raw.tracker.name_or(labels.default_tracker),
        badge.clone().filled(DANGER).bordered(DANGER, BorderStyle::Solid),
    ));

    let id = raw.id.map(|id| id.to_string()).unwrap_or_default();
    blocks.push(ReportBlock::text(
        (inches(150), inches(30), inches(150), inches(40)),
        format!("#{id}"),
        BlockStyle::text(16, MUTED).bold(),
    ));

    blocks.push(ReportBlock::shape(
        (inches(850), inches(30), inches(100), inches(40)),
        raw.status.name_or(labels.default_status),
        badge.filled(INFO).bordered(INFO, BorderStyle::Solid),
    ));
}

fn push_title(blocks: &mut Vec<ReportBlock>, raw: &RawIssue) {
    blocks.push(ReportBlock::text(
        (inches(50), inches(100), inches(900), inches(60)),
        raw.subject.clone().unwrap_or_default(),
        BlockStyle::text(18, DARK).bold(),
    ));
}

fn push_project(blocks: &mut Vec<ReportBlock>, raw: &RawIssue, labels: &Labels) {
    blocks.push(ReportBlock::text(
        (inches(50), inches(170), inches(900), inches(30)),
        format!("{}: {}", labels.project, raw.project.name_or("")),
        BlockStyle::text(12, MUTED),
    ));
}

fn push_description(blocks: &mut Vec<ReportBlock>, raw: &RawIssue, labels: &Labels) {
    blocks.push(section_header((inches(50), inches(230)), labels.description));

    let description = raw
        .description
        .as_deref()
        .filter(|text| !text.is_empty())
        .unwrap_or(labels.no_description);

    blocks.push(ReportBlock::text(
        (inches(50), inches(280), inches(500), inches(300)),
        wrap_text(description, DESCRIPTION_WRAP_WIDTH),
        BlockStyle::text(10, DARK)
            .filled(PANEL)
            .bordered(BORDER, BorderStyle::Solid),
    ));
}

fn push_details(blocks: &mut Vec<ReportBlock>, raw: &RawIssue, labels: &Labels) {
    blocks.push(section_header((inches(600), inches(230)), labels.details));

    let mut y = DETAIL_ROW_TOP;
    for (label, value) in detail_rows(raw, labels) {
        if value.is_empty_or_zero() {
            continue;
        }
        blocks.push(ReportBlock::text(
            (inches(600), y, inches(150), inches(25)),
            label,
            BlockStyle::text(10, MUTED),
        ));
        blocks.push(ReportBlock::text(
            (inches(780), y, inches(170), inches(25)),
            value.render(labels),
            BlockStyle::text(10, DARK),
        ));
        y += DETAIL_ROW_STEP;
    }
}

fn push_comments(blocks: &mut Vec<ReportBlock>, raw: &RawIssue, labels: &Labels) {
    blocks.push(section_header((inches(50), inches(620)), labels.comments));

    blocks.push(ReportBlock::text(
        (inches(50), inches(670), inches(900), inches(80)),
        latest_comment_text(&raw.journals, labels),
        BlockStyle::text(9, MUTED)
            .filled(WHITE)
            .bordered(BORDER, BorderStyle::Dashed),
    ));
}

fn push_footer(blocks: &mut Vec<ReportBlock>, raw: &RawIssue, labels: &Labels) {
    let text = format!(
        "{} - {}: {} {}: {}",
        labels.history,
        labels.created,
        short_timestamp(raw.created_on.as_deref()),
        labels.last_updated,
        short_timestamp(raw.updated_on.as_deref()),
    );
    blocks.push(ReportBlock::text(
        (inches(50), inches(780), inches(900), inches(30)),
        text,
        BlockStyle::text(9, MUTED).aligned(Alignment::Center),
    ));
}

fn section_header((x, y): (i64, i64), title: &str) -> ReportBlock {
    ReportBlock::text(
        (x, y, inches(100), inches(30)),
        title,
        BlockStyle::text(14, DARK).bold(),
    )
}

/// Value shown in the details panel.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailValue {
    Text(String),
    Percent(i64),
    Hours(f64),
}

impl DetailValue {
    /// Empty text and zero numbers are hidden, so a recorded 0% progress is not shown.
    pub fn is_empty_or_zero(&self) -> bool {
        match self {
            DetailValue::Text(text) => text.is_empty(),
            DetailValue::Percent(value) => *value == 0,
            DetailValue::Hours(value) => *value == 0.0,
        }
    }

    pub fn render(&self, labels: &Labels) -> String {
        match self {
            DetailValue::Text(text) => text.clone(),
            DetailValue::Percent(value) => format!("{value}%"),
            DetailValue::Hours(value) => format!("{} {}", format_hours(*value), labels.hours_unit),
        }
    }
}

/// Label/value pairs of the details panel, before suppression.
pub fn detail_rows(raw: &RawIssue, labels: &Labels) -> Vec<(&'static str, DetailValue)> {
    let text = |value: &str| DetailValue::Text(value.to_string());
    vec![
        (labels.author, text(raw.author.name_or(""))),
        (labels.assignee, text(raw.assigned_to.name_or(""))),
        (labels.priority, text(raw.priority.name_or(""))),
        (labels.progress, DetailValue::Percent(raw.done_ratio.unwrap_or(0))),
        (labels.start_date, text(raw.start_date.as_deref().unwrap_or(""))),
        (labels.due_date, text(raw.due_date.as_deref().unwrap_or(""))),
        (labels.spent_hours, DetailValue::Hours(raw.spent_hours.unwrap_or(0.0))),
    ]
}

/// Whole hours keep one decimal (`3.0`), fractional hours print as-is (`2.25`).
pub fn format_hours(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Text of the comments panel: the most recent journal entry that carries notes.
pub fn latest_comment_text(journals: &[JournalEntry], labels: &Labels) -> String {
    let Some((entry, notes)) = journals
        .iter()
        .filter_map(|entry| entry.comment().map(|notes| (entry, notes)))
        .last()
    else {
        return labels.no_comments.to_string();
    };

    let text = format!(
        "[{} - {}]\n{}",
        entry.user.name_or(labels.unknown_user),
        short_timestamp(entry.created_on.as_deref()),
        notes
    );
    truncate_chars(&text, COMMENT_MAX_CHARS)
}

/// First 19 characters of an ISO timestamp with `T` replaced by a space; absent renders empty.
pub fn short_timestamp(value: Option<&str>) -> String {
    value
        .unwrap_or_default()
        .chars()
        .take(19)
        .map(|c| if c == 'T' { ' ' } else { c })
        .collect()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Wraps text at `width` characters.
///
/// Existing lines that fit are kept verbatim; longer lines are re-flowed
/// greedily on whitespace, and a word longer than the width is broken into
/// width-sized pieces.
pub fn wrap_text(text: &str, width: usize) -> String {
    let width = width.max(1);
    let mut lines = Vec::new();
    for line in text.split('\n') {
        if line.chars().count() <= width {
            lines.push(line.to_string());
        } else {
            lines.extend(wrap_line(line, width));
        }
    }
    lines.join("\n")
}

fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in line.split_whitespace() {
        let mut rest = word;
        while !rest.is_empty() {
            let rest_len = rest.chars().count();
            let needed = if current_len == 0 {
                rest_len
            } else {
                current_len + 1 + rest_len
            };

            if needed <= width {
                if current_len > 0 {
                    current.push(' ');
                    current_len += 1;
                }
                current.push_str(rest);
                current_len += rest_len;
                break;
            }

            if rest_len <= width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }

            let space_left = if current_len == 0 {
                width
            } else {
                width.saturating_sub(current_len + 1)
            };
            if space_left == 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }

            let split = rest
                .char_indices()
                .nth(space_left)
                .map(|(index, _)| index)
                .unwrap_or(rest.len());
            if current_len > 0 {
                current.push(' ');
            }
            current.push_str(&rest[..split]);
            lines.push(std::mem::take(&mut current));
            current_len = 0;
            rest = &rest[split..];
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
