//! Issue lifecycle decisions.
//!
//! Per (service, dedup key) an issue is ABSENT, OPEN or CLOSED. [`decide`] is pure: it looks at
//! the incident counts and the tracker's current issue list and returns exactly one [`Action`].
//! All tracker I/O lives in the caller.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::dedup::DedupScope;
use crate::domain::{IncidentCounts, Issue, IssueState};

/// Decides whether an issue belongs to a dedup key.
pub trait DedupMatcher {
    fn matches(&self, issue: &Issue, dedup_key: &str) -> bool;
}

/// Matches when the issue body contains the key anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodySubstringMatcher;

impl DedupMatcher for BodySubstringMatcher {
    fn matches(&self, issue: &Issue, dedup_key: &str) -> bool {
        !dedup_key.is_empty() && issue.body.contains(dedup_key)
    }
}

/// What to do with a failing run whose signature has no closed issue to reopen, while other
/// issues for the service exist.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedFailurePolicy {
    #[default]
    Ignore,
    Create,
}

/// How an issue is tied to a dedup key.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// The key appears anywhere in the body.
    #[default]
    Substring,
    /// The key appears in the hidden marker line written when the issue was created.
    Marker,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcilePolicy {
    #[serde(default)]
    pub on_unmatched_failure: UnmatchedFailurePolicy,
    #[serde(default)]
    pub dedup_scope: DedupScope,
    #[serde(default)]
    pub matcher: MatchStrategy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackedState {
    Absent,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoActionReason {
    /// Passing run and nothing is open.
    NothingOpen,
    /// Failing run whose signature already has an open issue.
    AlreadyOpen,
    /// Failing run, other issues exist, no closed issue matches the key.
    UnmatchedFailure,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Create,
    CloseAll { issues: Vec<Issue> },
    Reopen { issue: Issue },
    NoAction { reason: NoActionReason },
}

fn created_at(issue: &Issue) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(&issue.created_at, &Rfc3339).ok()
}

/// Newest first. Unparseable timestamps sort after parseable ones.
fn newest_first(a: &Issue, b: &Issue) -> Ordering {
    match (created_at(a), created_at(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.created_at.cmp(&a.created_at),
    }
    .then_with(|| b.number.cmp(&a.number))
}

/// Lifecycle state of one dedup key among a service's issues.
pub fn tracked_state(issues: &[Issue], dedup_key: &str, matcher: &dyn DedupMatcher) -> TrackedState {
    let mut state = TrackedState::Absent;
    for issue in issues.iter().filter(|i| matcher.matches(i, dedup_key)) {
        match issue.state {
            IssueState::Open => return TrackedState::Open,
            IssueState::Closed => state = TrackedState::Closed,
        }
    }
    state
}

/// Most recently created closed issue carrying the key.
pub fn most_recent_closed_match<'a>(
    issues: &'a [Issue],
    dedup_key: &str,
    matcher: &dyn DedupMatcher,
) -> Option<&'a Issue> {
    issues
        .iter()
        .filter(|i| i.state == IssueState::Closed && matcher.matches(i, dedup_key))
        .min_by(|a, b| newest_first(a, b))
}

/// Rules, in order:
/// 1. Passing run: close every open issue of the service, whatever its key.
/// 2. Failing run: create when the service has no issues at all; otherwise reopen the newest
///    closed issue carrying the key; otherwise follow `policy.on_unmatched_failure`.
pub fn decide_with(
    counts: &IncidentCounts,
    issues: &[Issue],
    dedup_key: &str,
    matcher: &dyn DedupMatcher,
    policy: &ReconcilePolicy,
) -> Action {
    if counts.fail == 0 {
        let open: Vec<Issue> = issues
            .iter()
            .filter(|i| i.state == IssueState::Open)
            .cloned()
            .collect();
        if open.is_empty() {
            return Action::NoAction {
                reason: NoActionReason::NothingOpen,
            };
        }
        return Action::CloseAll { issues: open };
    }

    if issues.is_empty() {
        return Action::Create;
    }

    if let Some(issue) = most_recent_closed_match(issues, dedup_key, matcher) {
        return Action::Reopen {
            issue: issue.clone(),
        };
    }

    if tracked_state(issues, dedup_key, matcher) == TrackedState::Open {
        return Action::NoAction {
            reason: NoActionReason::AlreadyOpen,
        };
    }

    match policy.on_unmatched_failure {
        UnmatchedFailurePolicy::Create => Action::Create,
        UnmatchedFailurePolicy::Ignore => Action::NoAction {
            reason: NoActionReason::UnmatchedFailure,
        },
    }
}

/// [`decide_with`] using body-substring matching and the default policy.
pub fn decide(counts: &IncidentCounts, issues: &[Issue], dedup_key: &str) -> Action {
    decide_with(
        counts,
        issues,
        dedup_key,
        &BodySubstringMatcher,
        &ReconcilePolicy::default(),
    )
}
