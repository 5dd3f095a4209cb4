use std::path::Path;

use ciw_core::aggregate::verify_totals;
use ciw_core::domain::TestStatus;
use ciw_core::threshold::{
    analyze, analyze_to_run, compare_analyses, load_run_statistics, load_threshold_spec,
    read_analysis, write_analysis, AnalysisRecord, Comparator, RunStatistics, ThresholdSpec,
    TrendStatus,
};
use pretty_assertions::assert_eq;

fn fixtures() -> (RunStatistics, ThresholdSpec) {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/perf");
    let stats = load_run_statistics(&root.join("run_stats.json")).expect("stats");
    let spec = load_threshold_spec(&root.join("thresholds.json")).expect("spec");
    (stats, spec)
}

fn summary(records: &[AnalysisRecord]) -> Vec<(String, String, String, bool)> {
    records
        .iter()
        .map(|r| {
            (
                r.run.clone(),
                r.transaction.clone(),
                r.metric.clone(),
                r.error,
            )
        })
        .collect()
}

fn row(run: &str, tx: &str, metric: &str, error: bool) -> (String, String, String, bool) {
    (run.to_string(), tx.to_string(), metric.to_string(), error)
}

#[test]
fn fixture_analysis_uses_tiered_matching_and_skips_gaps() {
    let (stats, spec) = fixtures();
    let records = analyze(&stats, &spec);

    assert_eq!(
        summary(&records),
        vec![
            // exact run rule wins over the earlier "checkout" substring rule
            row("checkout-nightly", "Add To Cart", "errorRate", false),
            row("checkout-nightly", "Add To Cart", "p95", false),
            row("checkout-nightly", "Add To Cart", "throughput", false),
            // errorRate is null in the run and skipped
            row("checkout-nightly", "Pay", "p95", true),
            row("checkout-nightly", "Pay", "throughput", true),
            // "Browse Catalog" has no transaction threshold and is skipped
            // substring run match, wildcard transaction match, errorRate missing on both sides
            row("search-smoke", "Query", "p95", false),
            row("search-smoke", "Query", "throughput", true),
            // "legacy-soak" matches no run rule and contributes nothing
        ]
    );

    let pay_p95 = &records[3];
    assert_eq!(pay_p95.comparator, Comparator::Lte);
    assert_eq!(pay_p95.run_value, 1400.0);
    assert_eq!(pay_p95.threshold_value, 1200.0);
}

#[test]
fn verdicts_adapt_back_into_a_canonical_run() {
    let (stats, spec) = fixtures();
    let (_, run) = analyze_to_run(&stats, &spec);

    let names: Vec<&str> = run.reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["checkout-nightly", "search-smoke"]);
    assert_eq!(run.tests, 7);
    assert_eq!(run.failures, 3);
    verify_totals(&run).expect("invariant");

    let pay = &run.reports[0].testsuites[1];
    assert_eq!(pay.name, "Pay");
    assert_eq!(pay.tests[0].name, "p95");
    assert_eq!(pay.tests[0].status, TestStatus::Fail);
    assert_eq!(
        pay.tests[0].failures[0].text,
        "Pay p95 failed: run value 1400 is not <= threshold 1200"
    );
}

#[test]
fn analysis_file_round_trips_and_feeds_trend_comparison() {
    let (stats, spec) = fixtures();
    let current = analyze(&stats, &spec);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("analysis.json");

    // Previous run: Pay p95 was already failing, Query throughput was fine.
    let mut previous = current.clone();
    for r in previous.iter_mut() {
        if r.transaction == "Query" && r.metric == "throughput" {
            r.error = false;
            r.run_value = 55.0;
        }
        if r.transaction == "Pay" && r.metric == "throughput" {
            r.error = false;
        }
    }
    previous.retain(|r| !(r.transaction == "Add To Cart" && r.metric == "p95"));
    write_analysis(&path, &previous).expect("write");
    let loaded = read_analysis(&path).expect("read");
    assert_eq!(loaded, previous);

    let trend = compare_analyses(&loaded, &current);
    let by_key = |tx: &str, metric: &str| {
        trend
            .iter()
            .find(|t| t.transaction == tx && t.metric == metric)
            .expect("entry")
            .clone()
    };
    assert_eq!(by_key("Pay", "p95").status, TrendStatus::StillFailing);
    assert_eq!(by_key("Pay", "throughput").status, TrendStatus::NewFailure);
    let query = by_key("Query", "throughput");
    assert_eq!(query.status, TrendStatus::NewFailure);
    assert_eq!(query.delta, Some(-15.0));
    let added = by_key("Add To Cart", "p95");
    assert_eq!(added.status, TrendStatus::Unchanged);
    assert_eq!(added.previous_value, None);
}

#[test]
fn spec_without_comparators_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("thresholds.json");
    std::fs::write(&path, r#"{"comparators":{},"rules":[]}"#).expect("write");
    let err = load_threshold_spec(&path).unwrap_err();
    assert_eq!(err.code, "THRESHOLD_SPEC_INVALID");
}

#[test]
fn recovered_metric_is_reported() {
    let failing = AnalysisRecord {
        run: "r".to_string(),
        transaction: "t".to_string(),
        metric: "p95".to_string(),
        comparator: Comparator::Lte,
        run_value: 900.0,
        threshold_value: 800.0,
        error: true,
    };
    let fixed = AnalysisRecord {
        run_value: 700.0,
        error: false,
        ..failing.clone()
    };
    let trend = compare_analyses(&[failing], &[fixed]);
    assert_eq!(trend[0].status, TrendStatus::Recovered);
    assert_eq!(trend[0].delta, Some(-200.0));
}
