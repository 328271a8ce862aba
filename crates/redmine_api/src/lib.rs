//! Typed Redmine REST API client crate used by the report tool.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod rate_limiter;

pub use client::{IssueQuery, RedmineClient};
pub use config::RedmineConfig;
pub use error::{RedmineError, Result};
pub use models::{IssuePage, JournalEntry, NameOr, NamedRef, Project, RawIssue};
