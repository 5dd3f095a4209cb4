//! Markdown rendered into tracker issues and comments.
//!
//! Issue bodies carry the dedup key on a hidden marker line so later invocations can find the
//! issue again, either by substring search or by [`embedded_dedup_key`].

use std::fmt::Write as _;

use ciw_core::domain::{Incident, Issue};
use ciw_core::reconcile::DedupMatcher;

pub const DEDUP_MARKER_PREFIX: &str = "<!-- ciw-dedup-key: ";
const DEDUP_MARKER_SUFFIX: &str = " -->";

fn source_line(incident: &Incident) -> String {
    match incident.source_url.as_deref() {
        Some(url) => format!("Source: {url}"),
        None => "Source: unknown".to_string(),
    }
}

fn counts_line(incident: &Incident) -> String {
    let c = &incident.counts;
    format!(
        "Total: {} | Failed: {} | Passed: {} | Skipped: {}",
        c.total, c.fail, c.success, c.skip
    )
}

pub fn issue_body(incident: &Incident) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{DEDUP_MARKER_PREFIX}{}{DEDUP_MARKER_SUFFIX}",
        incident.dedup_key
    );
    let _ = writeln!(out, "## {}\n", incident.title);
    let _ = writeln!(out, "{}", incident.description.trim_end());
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", counts_line(incident));
    let _ = writeln!(out, "{}", source_line(incident));
    let _ = writeln!(out, "\nDedup key: `{}`", incident.dedup_key);
    out
}

pub fn failure_comment(incident: &Incident) -> String {
    format!(
        "Failure reproduced, reopening.\n\n{}\n\n{}\n{}\n",
        incident.description.trim_end(),
        counts_line(incident),
        source_line(incident)
    )
}

pub fn success_comment(incident: &Incident) -> String {
    format!(
        "Tests are passing again, closing.\n\n{}\n\n{}\n{}\n",
        incident.description.trim_end(),
        counts_line(incident),
        source_line(incident)
    )
}

/// Dedup key from the marker line, if the body has one.
pub fn embedded_dedup_key(body: &str) -> Option<&str> {
    body.lines().find_map(|line| {
        line.trim()
            .strip_prefix(DEDUP_MARKER_PREFIX)?
            .strip_suffix(DEDUP_MARKER_SUFFIX)
            .map(str::trim)
    })
}

/// Matches on the structured marker only, ignoring keys quoted elsewhere in the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerMatcher;

impl DedupMatcher for MarkerMatcher {
    fn matches(&self, issue: &Issue, dedup_key: &str) -> bool {
        embedded_dedup_key(&issue.body) == Some(dedup_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciw_core::domain::{IncidentCounts, IssueState};

    fn incident() -> Incident {
        Incident {
            dedup_key: "abc123".to_string(),
            title: "svc: 1 of 2 tests failed".to_string(),
            description: "details".to_string(),
            service: "svc".to_string(),
            source_url: Some("https://ci.example.com/7".to_string()),
            assignee: None,
            counts: IncidentCounts {
                total: 2,
                fail: 1,
                success: 1,
                skip: 0,
            },
        }
    }

    #[test]
    fn body_embeds_a_recoverable_key() {
        let body = issue_body(&incident());
        assert!(body.contains("abc123"));
        assert!(body.contains("Source: https://ci.example.com/7"));
        assert_eq!(embedded_dedup_key(&body), Some("abc123"));
    }

    #[test]
    fn marker_matcher_ignores_quoted_keys() {
        let issue = Issue {
            id: 1,
            number: 1,
            url: String::new(),
            state: IssueState::Closed,
            body: "see also abc123".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        assert!(!MarkerMatcher.matches(&issue, "abc123"));
        let tagged = Issue {
            body: issue_body(&incident()),
            ..issue
        };
        assert!(MarkerMatcher.matches(&tagged, "abc123"));
    }

    #[test]
    fn comments_reference_description_and_source() {
        let inc = incident();
        for text in [failure_comment(&inc), success_comment(&inc)] {
            assert!(text.contains("details"));
            assert!(text.contains("https://ci.example.com/7"));
        }
    }
}
