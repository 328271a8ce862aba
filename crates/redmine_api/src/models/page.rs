//! Envelopes wrapping Redmine listing and single-resource responses.

use serde::Deserialize;

use super::issue::RawIssue;
use super::project::Project;

/// One page of `/issues.json`.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct IssuePage {
    pub issues: Vec<RawIssue>,
    pub total_count: Option<u64>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct IssueEnvelope {
    pub issue: RawIssue,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub(crate) struct ProjectPage {
    pub projects: Vec<Project>,
    pub total_count: Option<u64>,
}
