use std::fmt::Write as _;

use crate::dedup::dedup_key_for_message;
use crate::domain::{Incident, IncidentCounts, Run, TestStatus};

/// Failing tests listed in a description before the overflow line.
pub const MAX_LISTED_FAILURES: usize = 20;

pub fn counts_for_run(run: &Run) -> IncidentCounts {
    IncidentCounts {
        total: run.tests,
        fail: run.failures,
        success: run.passed(),
        skip: run.skipped + run.pending,
    }
}

fn title_for(service: &str, counts: &IncidentCounts) -> String {
    if counts.fail == 0 {
        format!("{service}: all {} tests passed", counts.total)
    } else {
        format!(
            "{service}: {} of {} tests failed",
            counts.fail, counts.total
        )
    }
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

/// Markdown summary of a run: totals plus the failing tests grouped by report and suite.
pub fn describe_run(run: &Run) -> String {
    let counts = counts_for_run(run);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "**{}** tests: **{}** failed, **{}** passed, **{}** skipped ({:.1}s)",
        counts.total, counts.fail, counts.success, counts.skip, run.time
    );

    if counts.fail == 0 {
        return out;
    }

    out.push_str("\n### Failing tests\n\n");
    let failing: Vec<_> = run
        .reports
        .iter()
        .flat_map(|r| r.testsuites.iter().map(move |s| (r, s)))
        .flat_map(|(r, s)| {
            s.tests
                .iter()
                .filter(|t| t.status == TestStatus::Fail)
                .map(move |t| (r, s, t))
        })
        .collect();

    for (report, suite, test) in failing.iter().take(MAX_LISTED_FAILURES) {
        let reason = test
            .failures
            .first()
            .map(|f| first_line(&f.text))
            .unwrap_or("");
        if reason.is_empty() {
            let _ = writeln!(out, "- `{}` / {} / {}", report.name, suite.name, test.name);
        } else {
            let _ = writeln!(
                out,
                "- `{}` / {} / {}: {}",
                report.name, suite.name, test.name, reason
            );
        }
    }
    if failing.len() > MAX_LISTED_FAILURES {
        let _ = writeln!(out, "- ... and {} more", failing.len() - MAX_LISTED_FAILURES);
    }
    out
}

/// Build the incident for a run. The dedup key is computed by the caller per its scope policy.
pub fn build_incident(
    service: &str,
    run: &Run,
    dedup_key: String,
    source_url: Option<String>,
    assignee: Option<String>,
) -> Incident {
    let counts = counts_for_run(run);
    Incident {
        dedup_key,
        title: title_for(service, &counts),
        description: describe_run(run),
        service: service.to_string(),
        source_url,
        assignee,
        counts,
    }
}

/// Incident for a free-text failure message; always counts as one failure.
pub fn incident_from_message(
    service: &str,
    message: &str,
    source_url: Option<String>,
    assignee: Option<String>,
) -> Incident {
    let summary = first_line(message);
    Incident {
        dedup_key: dedup_key_for_message(service, message),
        title: if summary.is_empty() {
            format!("{service}: failure reported")
        } else {
            format!("{service}: {summary}")
        },
        description: message.trim().to_string(),
        service: service.to_string(),
        source_url,
        assignee,
        counts: IncidentCounts {
            total: 1,
            fail: 1,
            success: 0,
            skip: 0,
        },
    }
}
