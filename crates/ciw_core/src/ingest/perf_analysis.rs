use std::path::Path;

use crate::aggregate::{aggregate_run, build_report, build_suite};
use crate::classify::{classify, PerfCaseEvidence, PERF_STATUS_RULES};
use crate::domain::{Failure, Run, Test, TestStatus};
use crate::error::AppError;
use crate::threshold::AnalysisRecord;

/// Decode a persisted analysis-record file.
pub fn read_perf_analysis_document(
    content: &str,
    path: &Path,
) -> Result<Vec<AnalysisRecord>, AppError> {
    serde_json::from_str(content).map_err(|e| AppError::parse("PARSE_JSON_FAILED", path, e))
}

fn failure_message(record: &AnalysisRecord) -> String {
    format!(
        "{} {} failed: run value {} is not {} threshold {}",
        record.transaction,
        record.metric,
        record.run_value,
        record.comparator.symbol(),
        record.threshold_value
    )
}

fn metric_test(record: &AnalysisRecord) -> Test {
    let status = classify(
        &PerfCaseEvidence {
            error: record.error,
        },
        PERF_STATUS_RULES,
    );
    Test {
        name: record.metric.clone(),
        status,
        time: 0.0,
        failures: if status == TestStatus::Fail {
            vec![Failure::new(failure_message(record))]
        } else {
            Vec::new()
        },
    }
}

/// Group analysis records run → transaction → metric into the canonical run shape.
///
/// Grouping keeps first-seen order at every level so reports read like the analysis output.
pub fn perf_analysis_to_run(records: &[AnalysisRecord]) -> Run {
    let mut runs: Vec<(&str, Vec<(&str, Vec<Test>)>)> = Vec::new();
    for record in records {
        let run_idx = match runs.iter().position(|(name, _)| *name == record.run) {
            Some(i) => i,
            None => {
                runs.push((record.run.as_str(), Vec::new()));
                runs.len() - 1
            }
        };
        let transactions = &mut runs[run_idx].1;
        let tx_idx = match transactions
            .iter()
            .position(|(name, _)| *name == record.transaction)
        {
            Some(i) => i,
            None => {
                transactions.push((record.transaction.as_str(), Vec::new()));
                transactions.len() - 1
            }
        };
        transactions[tx_idx].1.push(metric_test(record));
    }

    aggregate_run(
        runs.into_iter()
            .map(|(run, transactions)| {
                build_report(
                    run,
                    transactions
                        .into_iter()
                        .map(|(tx, tests)| build_suite(tx, tests))
                        .collect(),
                )
            })
            .collect(),
    )
}
