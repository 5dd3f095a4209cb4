use ciw_core::domain::{Incident, Issue};
use ciw_core::error::AppError;

/// External issue tracker. Every call is one awaited mutation or query; implementations own
/// rate-limit retries and return an error once those are exhausted.
pub trait IssueTracker {
    /// All issues, in any state, associated with `service`.
    fn list_issues(&self, service: &str) -> Result<Vec<Issue>, AppError>;
    /// Open a new issue whose body embeds `incident.dedup_key`.
    fn create_issue(&self, incident: &Incident) -> Result<Issue, AppError>;
    fn close_issue(&self, issue: &Issue, incident: &Incident) -> Result<(), AppError>;
    fn reopen_issue(&self, issue: &Issue, incident: &Incident) -> Result<(), AppError>;
}

pub mod github_issues;
