use std::path::{Path, PathBuf};

use ciw_core::aggregate::verify_totals;
use ciw_core::domain::TestStatus;
use ciw_core::ingest::{
    decode_artifact, parse_artifacts, parse_junit_xml, parse_mocha_json, ArtifactDocument,
    JsonArtifact,
};
use pretty_assertions::assert_eq;

fn fixture(rel: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(rel)
}

#[test]
fn junit_fixture_normalizes_to_canonical_report() {
    let xml = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../fixtures/junit/api-results.xml"
    ));
    let report = parse_junit_xml(xml, Path::new("ci/out/api-results.xml")).expect("parse");

    // `name="null"` on the wrapper and on one suite falls back to the file stem.
    assert_eq!(report.name, "api-results");
    let names: Vec<&str> = report.testsuites.iter().map(|s| s.name.as_str()).collect();
    // The zero-count placeholder container is dropped.
    assert_eq!(names, vec!["auth", "api-results", "billing"]);

    assert_eq!(report.tests, 10);
    assert_eq!(report.failures, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.pending, 1);
    assert_eq!(report.time, 3.0);

    let auth = &report.testsuites[0];
    let statuses: Vec<TestStatus> = auth.tests.iter().map(|t| t.status).collect();
    assert_eq!(
        statuses,
        vec![
            TestStatus::Pass,
            TestStatus::Fail,
            TestStatus::Pass,
            TestStatus::Pass,
            TestStatus::Pending
        ]
    );
    assert_eq!(
        auth.tests[1].failures[0].text,
        "expected 401, got 200\nat auth.spec.js:42"
    );

    // Source declared failures=-1 with skipped=1; the suite still counts its real failure.
    let orders = &report.testsuites[1];
    assert_eq!(orders.failures, 1);
    assert_eq!(orders.skipped, 1);
    assert_eq!(orders.tests[2].failures[0].text, "timeout after 30000ms");
}

#[test]
fn negative_failure_count_with_only_skips_normalizes_to_zero() {
    let xml = r#"<testsuite name="quarantine" tests="2" failures="-2" skipped="2">
  <testcase name="a"><skipped/></testcase>
  <testcase name="b"><skipped/></testcase>
</testsuite>"#;
    let report = parse_junit_xml(xml, Path::new("q.xml")).expect("parse");
    assert_eq!(report.testsuites[0].failures, 0);
    assert_eq!(report.testsuites[0].skipped, 2);
    assert_eq!(report.failures, 0);
}

#[test]
fn any_unrecognized_child_counts_as_failure_evidence() {
    let xml = r#"<testsuite name="s" tests="1">
  <testcase name="noisy"><system-out>hello</system-out></testcase>
</testsuite>"#;
    let report = parse_junit_xml(xml, Path::new("s.xml")).expect("parse");
    assert_eq!(report.testsuites[0].tests[0].status, TestStatus::Fail);
    assert_eq!(report.testsuites[0].tests[0].failures[0].text, "hello");
}

#[test]
fn malformed_xml_is_a_parse_error_naming_the_file() {
    let err = parse_junit_xml(
        r#"<testsuite name="s" tests="1"><testcase name="a"></testsuite>"#,
        Path::new("broken/junit.xml"),
    )
    .unwrap_err();
    assert!(err.is_parse_error(), "{err}");
    assert!(err
        .details
        .as_deref()
        .unwrap_or_default()
        .contains("broken/junit.xml"));
}

#[test]
fn mocha_fixture_maps_one_file_to_one_report() {
    let content = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../fixtures/mocha/web-e2e.json"
    ));
    let run = parse_mocha_json(&[JsonArtifact {
        filepath: PathBuf::from("cypress/results/web-e2e.json"),
        content: content.to_string(),
    }])
    .expect("parse");

    assert_eq!(run.reports.len(), 1);
    let report = &run.reports[0];
    assert_eq!(report.name, "web-e2e");
    let names: Vec<&str> = report.testsuites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["cart", "cart checkout"]);
    assert_eq!(run.tests, 4);
    assert_eq!(run.failures, 1);
    assert_eq!(run.pending, 1);
    assert_eq!(run.time, 3.5);

    let removed = &report.testsuites[0].tests[1];
    assert_eq!(removed.status, TestStatus::Fail);
    assert!(removed.failures[0]
        .text
        .starts_with("AssertionError: expected 0 to equal 1"));
    verify_totals(&run).expect("invariant");
}

#[test]
fn mocha_files_without_stats_and_results_are_skipped() {
    let run = parse_mocha_json(&[JsonArtifact {
        filepath: PathBuf::from("coverage-summary.json"),
        content: r#"{"stats":{"lines":80}}"#.to_string(),
    }])
    .expect("parse");
    assert_eq!(run.reports.len(), 0);
    assert_eq!(run.tests, 0);
}

#[test]
fn malformed_json_is_a_parse_error() {
    let err = parse_mocha_json(&[JsonArtifact {
        filepath: PathBuf::from("cut.json"),
        content: r#"{"stats": {"tests": 1"#.to_string(),
    }])
    .unwrap_err();
    assert_eq!(err.code, "PARSE_JSON_FAILED");
}

#[test]
fn dispatch_merges_every_artifact_into_one_run() {
    let run = parse_artifacts(&[
        fixture("junit/api-results.xml"),
        fixture("junit/smoke-green.xml"),
        fixture("mocha/web-e2e.json"),
        fixture("mocha/coverage-summary.json"),
    ])
    .expect("parse");

    let names: Vec<&str> = run.reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["api-results", "smoke-green", "web-e2e"]);
    assert_eq!(run.tests, 16);
    assert_eq!(run.failures, 3);
    assert_eq!(run.skipped, 1);
    assert_eq!(run.pending, 2);
    verify_totals(&run).expect("invariant");
}

#[test]
fn dispatch_rejects_unknown_variants() {
    let err = decode_artifact(Path::new("notes.txt"), "hello").unwrap_err();
    assert_eq!(err.code, "PARSE_UNKNOWN_FORMAT");

    let err = decode_artifact(Path::new("data.json"), r#"{"foo":1}"#).unwrap_err();
    assert_eq!(err.code, "PARSE_UNKNOWN_FORMAT");

    let doc = decode_artifact(
        Path::new("analysis.json"),
        r#"[{"run":"r","transaction":"t","metric":"p95","comparator":"lte","runValue":1.0,"thresholdValue":2.0,"error":false}]"#,
    )
    .expect("decode");
    assert!(matches!(doc, Some(ArtifactDocument::PerfAnalysis(ref r)) if r.len() == 1));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = parse_artifacts(&[fixture("junit/does-not-exist.xml")]).unwrap_err();
    assert_eq!(err.code, "IO_READ_FAILED");
}
