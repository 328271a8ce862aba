mod issue;
mod lenient;
mod page;
mod project;

pub use issue::{JournalEntry, NameOr, NamedRef, RawIssue};
pub(crate) use page::{IssueEnvelope, ProjectPage};
pub use page::IssuePage;
pub use project::Project;
