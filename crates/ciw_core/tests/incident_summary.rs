use std::path::Path;

use ciw_core::aggregate::{aggregate_run, build_report, build_suite};
use ciw_core::dedup::dedup_key_for_message;
use ciw_core::domain::{Failure, IncidentCounts, Test, TestStatus};
use ciw_core::incident::{
    build_incident, describe_run, incident_from_message, MAX_LISTED_FAILURES,
};
use ciw_core::ingest::parse_artifacts;

#[test]
fn incident_from_fixture_run_lists_failures() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures");
    let run = parse_artifacts(&[root.join("junit/api-results.xml")]).expect("parse");
    let incident = build_incident(
        "checkout",
        &run,
        "k".to_string(),
        Some("https://ci.example.com/1".to_string()),
        Some("payments-oncall".to_string()),
    );

    assert_eq!(incident.title, "checkout: 2 of 10 tests failed");
    assert_eq!(
        incident.counts,
        IncidentCounts {
            total: 10,
            fail: 2,
            success: 6,
            skip: 2
        }
    );
    assert!(incident
        .description
        .contains("- `api-results` / auth / login rejects bad password: expected 401, got 200"));
    assert!(incident
        .description
        .contains("/ orders delete: timeout after 30000ms"));
}

#[test]
fn passing_run_gets_a_success_title() {
    let run = aggregate_run(vec![build_report(
        "smoke",
        vec![build_suite(
            "s",
            vec![Test {
                name: "t".to_string(),
                status: TestStatus::Pass,
                time: 1.0,
                failures: Vec::new(),
            }],
        )],
    )]);
    let incident = build_incident("svc", &run, "k".to_string(), None, None);
    assert_eq!(incident.title, "svc: all 1 tests passed");
    assert!(!incident.description.contains("Failing tests"));
}

#[test]
fn long_failure_lists_are_capped() {
    let tests = (0..MAX_LISTED_FAILURES + 5)
        .map(|i| Test {
            name: format!("t{i}"),
            status: TestStatus::Fail,
            time: 0.0,
            failures: vec![Failure::new("x")],
        })
        .collect();
    let run = aggregate_run(vec![build_report("r", vec![build_suite("s", tests)])]);
    let text = describe_run(&run);
    assert!(text.contains("- ... and 5 more"), "{text}");
    assert_eq!(text.matches("\n- `r`").count(), MAX_LISTED_FAILURES);
}

#[test]
fn overflow_counts_failing_tests_not_the_declared_total() {
    let tests = (0..MAX_LISTED_FAILURES + 3)
        .map(|i| Test {
            name: format!("t{i}"),
            status: TestStatus::Fail,
            time: 0.0,
            failures: Vec::new(),
        })
        .collect();
    let mut run = aggregate_run(vec![build_report("r", vec![build_suite("s", tests)])]);
    run.failures = 2;

    let text = describe_run(&run);
    assert!(text.contains("- ... and 3 more"), "{text}");
    assert_eq!(text.matches("\n- `r`").count(), MAX_LISTED_FAILURES);
}

#[test]
fn message_incident_counts_as_one_failure() {
    let incident = incident_from_message("svc", "Deploy step crashed\nexit 137", None, None);
    assert_eq!(incident.title, "svc: Deploy step crashed");
    assert_eq!(incident.counts.fail, 1);
    assert_eq!(
        incident.dedup_key,
        dedup_key_for_message("svc", "Deploy step crashed exit 137")
    );
}
