use serde::{Deserialize, Serialize};

use super::lenient;

/// Issue payload as returned by `/issues.json` and `/issues/{id}.json`.
///
/// Every field is optional: absent keys, explicit `null` and values of the
/// wrong JSON type all deserialize to `None` (or an empty journal list).
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RawIssue {
    #[serde(deserialize_with = "lenient::integer")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "lenient::string")]
    pub subject: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient::named_ref")]
    pub tracker: Option<NamedRef>,
    #[serde(deserialize_with = "lenient::named_ref")]
    pub status: Option<NamedRef>,
    #[serde(deserialize_with = "lenient::named_ref")]
    pub priority: Option<NamedRef>,
    #[serde(deserialize_with = "lenient::named_ref")]
    pub project: Option<NamedRef>,
    #[serde(deserialize_with = "lenient::named_ref")]
    pub author: Option<NamedRef>,
    #[serde(deserialize_with = "lenient::named_ref")]
    pub assigned_to: Option<NamedRef>,
    #[serde(deserialize_with = "lenient::integer")]
    pub done_ratio: Option<i64>,
    #[serde(deserialize_with = "lenient::string")]
    pub start_date: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub due_date: Option<String>,
    #[serde(deserialize_with = "lenient::decimal")]
    pub estimated_hours: Option<f64>,
    #[serde(deserialize_with = "lenient::decimal")]
    pub spent_hours: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    pub created_on: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub updated_on: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub closed_on: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub is_private: Option<bool>,
    #[serde(deserialize_with = "lenient::journals")]
    pub journals: Vec<JournalEntry>,
}

/// `{id, name}` reference embedded in issues for trackers, statuses, users and projects.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct NamedRef {
    #[serde(deserialize_with = "lenient::integer")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
}

impl NamedRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }
}

/// Name lookup on an optional nested reference.
pub trait NameOr {
    /// Returns the reference's name, or `default` when the reference or its name is absent.
    fn name_or<'a>(&'a self, default: &'a str) -> &'a str;
}

impl NameOr for Option<NamedRef> {
    fn name_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.as_ref()
            .and_then(|reference| reference.name.as_deref())
            .unwrap_or(default)
    }
}

/// One change record attached to an issue; entries without notes only record field edits.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct JournalEntry {
    #[serde(deserialize_with = "lenient::integer")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "lenient::named_ref")]
    pub user: Option<NamedRef>,
    #[serde(deserialize_with = "lenient::string")]
    pub notes: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub created_on: Option<String>,
}

impl JournalEntry {
    /// Notes with surrounding whitespace removed, or `None` for metadata-only entries.
    pub fn comment(&self) -> Option<&str> {
        self.notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
    }
}
