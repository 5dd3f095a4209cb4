//! Bottom-up reduction of classified tests into suites, reports and a run.
//!
//! Totals are never taken from source documents; every level sums its children so the
//! aggregation invariant holds by construction.

use crate::domain::{Report, Run, Suite, Test, TestStatus};
use crate::error::AppError;

fn count(tests: &[Test], status: TestStatus) -> u64 {
    tests.iter().filter(|t| t.status == status).count() as u64
}

pub fn build_suite(name: impl Into<String>, tests: Vec<Test>) -> Suite {
    Suite {
        name: name.into(),
        failures: count(&tests, TestStatus::Fail),
        skipped: count(&tests, TestStatus::Skip),
        pending: count(&tests, TestStatus::Pending),
        time: tests.iter().map(|t| t.time).sum(),
        tests,
    }
}

pub fn build_report(name: impl Into<String>, testsuites: Vec<Suite>) -> Report {
    Report {
        name: name.into(),
        tests: testsuites.iter().map(|s| s.tests.len() as u64).sum(),
        failures: testsuites.iter().map(|s| s.failures).sum(),
        skipped: testsuites.iter().map(|s| s.skipped).sum(),
        pending: testsuites.iter().map(|s| s.pending).sum(),
        time: testsuites.iter().map(|s| s.time).sum(),
        testsuites,
    }
}

pub fn aggregate_run(reports: Vec<Report>) -> Run {
    Run {
        tests: reports.iter().map(|r| r.tests).sum(),
        failures: reports.iter().map(|r| r.failures).sum(),
        skipped: reports.iter().map(|r| r.skipped).sum(),
        pending: reports.iter().map(|r| r.pending).sum(),
        time: reports.iter().map(|r| r.time).sum(),
        reports,
    }
}

/// Merge runs from several parsers into one, preserving report order.
pub fn merge_runs(runs: impl IntoIterator<Item = Run>) -> Run {
    aggregate_run(runs.into_iter().flat_map(|r| r.reports).collect())
}

fn mismatch(level: &str, field: &str, declared: String, summed: String) -> AppError {
    AppError::new(
        "AGGREGATE_TOTALS_MISMATCH",
        format!("{level} {field} does not equal the sum of its children"),
    )
    .with_details(format!("declared={declared}; summed={summed}"))
}

fn check_suite(suite: &Suite) -> Result<(), AppError> {
    let level = format!("suite '{}'", suite.name);
    for (field, declared, status) in [
        ("failures", suite.failures, TestStatus::Fail),
        ("skipped", suite.skipped, TestStatus::Skip),
        ("pending", suite.pending, TestStatus::Pending),
    ] {
        let summed = count(&suite.tests, status);
        if declared != summed {
            return Err(mismatch(&level, field, declared.to_string(), summed.to_string()));
        }
    }
    let time: f64 = suite.tests.iter().map(|t| t.time).sum();
    if time != suite.time {
        return Err(mismatch(&level, "time", suite.time.to_string(), time.to_string()));
    }
    Ok(())
}

fn check_report(report: &Report) -> Result<(), AppError> {
    for suite in &report.testsuites {
        check_suite(suite)?;
    }
    let summed = build_report(report.name.clone(), report.testsuites.clone());
    let level = format!("report '{}'", report.name);
    for (field, declared, summed) in [
        ("tests", report.tests, summed.tests),
        ("failures", report.failures, summed.failures),
        ("skipped", report.skipped, summed.skipped),
        ("pending", report.pending, summed.pending),
    ] {
        if declared != summed {
            return Err(mismatch(&level, field, declared.to_string(), summed.to_string()));
        }
    }
    if report.time != summed.time {
        return Err(mismatch(
            &level,
            "time",
            report.time.to_string(),
            summed.time.to_string(),
        ));
    }
    Ok(())
}

/// Verify the aggregation invariant recursively, run down to suites.
pub fn verify_totals(run: &Run) -> Result<(), AppError> {
    for report in &run.reports {
        check_report(report)?;
    }
    let summed = aggregate_run(run.reports.clone());
    for (field, declared, summed) in [
        ("tests", run.tests, summed.tests),
        ("failures", run.failures, summed.failures),
        ("skipped", run.skipped, summed.skipped),
        ("pending", run.pending, summed.pending),
    ] {
        if declared != summed {
            return Err(mismatch("run", field, declared.to_string(), summed.to_string()));
        }
    }
    if run.time != summed.time {
        return Err(mismatch(
            "run",
            "time",
            run.time.to_string(),
            summed.time.to_string(),
        ));
    }
    Ok(())
}
