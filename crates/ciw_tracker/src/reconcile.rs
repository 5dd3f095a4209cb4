//! Imperative shell around [`ciw_core::reconcile::decide_with`].
//!
//! One invocation lists the service's issues, decides, then performs the chosen transition.
//! Mutations run one at a time; the first tracker error aborts the invocation and is returned.

use ciw_core::dedup::run_dedup_key;
use ciw_core::domain::{Incident, Issue, Run};
use ciw_core::error::AppError;
use ciw_core::incident::build_incident;
use ciw_core::reconcile::{
    decide_with, Action, BodySubstringMatcher, DedupMatcher, MatchStrategy, ReconcilePolicy,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assignee::AssigneeResolver;
use crate::body::MarkerMatcher;
use crate::tracker::IssueTracker;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub action: Action,
    pub created: Option<Issue>,
    pub closed: Vec<u64>,
    pub reopened: Option<u64>,
}

pub fn dedup_matcher(strategy: MatchStrategy) -> &'static dyn DedupMatcher {
    match strategy {
        MatchStrategy::Substring => &BodySubstringMatcher,
        MatchStrategy::Marker => &MarkerMatcher,
    }
}

/// Build the incident for a run: dedup key per policy scope, assignee from the resolver.
pub fn incident_for_run(
    service: &str,
    run: &Run,
    policy: &ReconcilePolicy,
    source_url: Option<String>,
    assignees: &dyn AssigneeResolver,
) -> Result<Incident, AppError> {
    let dedup_key = run_dedup_key(service, run, policy.dedup_scope);
    let assignee = assignees.resolve_assignee(service)?;
    Ok(build_incident(service, run, dedup_key, source_url, assignee))
}

pub fn reconcile_incident(
    tracker: &dyn IssueTracker,
    incident: &Incident,
    matcher: &dyn DedupMatcher,
    policy: &ReconcilePolicy,
) -> Result<ReconcileOutcome, AppError> {
    let issues = tracker.list_issues(&incident.service)?;
    let action = decide_with(
        &incident.counts,
        &issues,
        &incident.dedup_key,
        matcher,
        policy,
    );

    let mut outcome = ReconcileOutcome {
        action: action.clone(),
        created: None,
        closed: Vec::new(),
        reopened: None,
    };

    match action {
        Action::Create => {
            let issue = tracker.create_issue(incident)?;
            info!(
                service = %incident.service,
                number = issue.number,
                dedup_key = %incident.dedup_key,
                "created issue"
            );
            outcome.created = Some(issue);
        }
        Action::CloseAll { issues } => {
            for issue in &issues {
                tracker.close_issue(issue, incident)?;
                info!(service = %incident.service, number = issue.number, "closed issue");
                outcome.closed.push(issue.number);
            }
        }
        Action::Reopen { issue } => {
            tracker.reopen_issue(&issue, incident)?;
            info!(
                service = %incident.service,
                number = issue.number,
                dedup_key = %incident.dedup_key,
                "reopened issue"
            );
            outcome.reopened = Some(issue.number);
        }
        Action::NoAction { reason } => {
            info!(
                service = %incident.service,
                dedup_key = %incident.dedup_key,
                fail = incident.counts.fail,
                existing = issues.len(),
                ?reason,
                "no issue transition"
            );
        }
    }

    Ok(outcome)
}
