//! Threshold analysis of performance-run statistics.
//!
//! Runs and transactions are matched to threshold rules with a three-tier policy (exact name,
//! then substring, then `"*"`). Anything without a match is logged and left out of the result;
//! it is never reported as a failure.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::Run;
use crate::error::{read_file, AppError};
use crate::ingest::perf_analysis_to_run;

mod trend;

pub use trend::{compare_analyses, TrendEntry, TrendStatus};

pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparator {
    /// Whether `run_value <op> threshold_value` holds.
    pub fn accepts(self, run_value: f64, threshold_value: f64) -> bool {
        match self {
            Comparator::Gt => run_value > threshold_value,
            Comparator::Gte => run_value >= threshold_value,
            Comparator::Lt => run_value < threshold_value,
            Comparator::Lte => run_value <= threshold_value,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
        }
    }
}

/// Raw statistics of one or more performance runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunStatistics {
    pub runs: Vec<RunStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunStats {
    pub name: String,
    #[serde(default)]
    pub transactions: Vec<TransactionStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransactionStats {
    pub name: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThresholdSpec {
    /// Metrics to evaluate and how each is compared.
    pub comparators: BTreeMap<String, Comparator>,
    pub rules: Vec<ThresholdRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdRule {
    #[serde(alias = "name")]
    pub run_name_pattern: String,
    #[serde(default)]
    pub transactions: Vec<TransactionThreshold>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionThreshold {
    #[serde(alias = "name")]
    pub name_pattern: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, Option<f64>>,
    /// Per-transaction overrides of the spec-level comparators.
    #[serde(default)]
    pub comparators: BTreeMap<String, Comparator>,
}

/// One evaluated metric. This is the persisted analysis format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub run: String,
    pub transaction: String,
    pub metric: String,
    pub comparator: Comparator,
    pub run_value: f64,
    pub threshold_value: f64,
    pub error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Contains,
    Wildcard,
}

fn same(a: &str, b: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

fn contains(haystack: &str, needle: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    } else {
        haystack.contains(needle)
    }
}

/// Resolve `name` against candidate patterns: exact, then first substring hit, then `"*"`.
pub fn resolve_match<'a, T>(
    name: &str,
    candidates: &'a [T],
    pattern: impl Fn(&T) -> &str,
    case_insensitive: bool,
) -> Option<(&'a T, MatchTier)> {
    if let Some(c) = candidates
        .iter()
        .find(|c| same(pattern(*c), name, case_insensitive))
    {
        return Some((c, MatchTier::Exact));
    }
    if let Some(c) = candidates.iter().find(|c| {
        let p = pattern(*c);
        !p.is_empty() && p != WILDCARD && contains(name, p, case_insensitive)
    }) {
        return Some((c, MatchTier::Contains));
    }
    candidates
        .iter()
        .find(|c| pattern(*c) == WILDCARD)
        .map(|c| (c, MatchTier::Wildcard))
}

fn evaluate_transaction(
    run: &RunStats,
    tx: &TransactionStats,
    threshold: &TransactionThreshold,
    spec: &ThresholdSpec,
    out: &mut Vec<AnalysisRecord>,
) {
    let mut comparators = spec.comparators.clone();
    comparators.extend(threshold.comparators.iter().map(|(k, v)| (k.clone(), *v)));

    for (metric, comparator) in comparators {
        let run_value = tx.metrics.get(&metric).copied().flatten();
        let threshold_value = threshold.metrics.get(&metric).copied().flatten();
        let (Some(run_value), Some(threshold_value)) = (run_value, threshold_value) else {
            info!(
                run = %run.name,
                transaction = %tx.name,
                metric = %metric,
                has_run_value = run_value.is_some(),
                has_threshold_value = threshold_value.is_some(),
                "skipping metric without a value on both sides"
            );
            continue;
        };
        let error = !comparator.accepts(run_value, threshold_value);
        debug!(
            run = %run.name,
            transaction = %tx.name,
            metric = %metric,
            run_value,
            threshold_value,
            error,
            "evaluated metric"
        );
        out.push(AnalysisRecord {
            run: run.name.clone(),
            transaction: tx.name.clone(),
            metric,
            comparator,
            run_value,
            threshold_value,
            error,
        });
    }
}

/// Compare every run's transaction metrics against the threshold spec.
pub fn analyze(stats: &RunStatistics, spec: &ThresholdSpec) -> Vec<AnalysisRecord> {
    let mut out = Vec::new();
    for run in &stats.runs {
        let run_rule = resolve_match(
            &run.name,
            &spec.rules,
            |r| r.run_name_pattern.as_str(),
            false,
        );
        let Some((rule, tier)) = run_rule else {
            info!(run = %run.name, "no threshold rule matches run; skipping");
            continue;
        };
        debug!(run = %run.name, pattern = %rule.run_name_pattern, ?tier, "resolved run threshold");

        for tx in &run.transactions {
            let Some((threshold, tier)) =
                resolve_match(&tx.name, &rule.transactions, |t| t.name_pattern.as_str(), true)
            else {
                info!(
                    run = %run.name,
                    transaction = %tx.name,
                    "no threshold matches transaction; skipping"
                );
                continue;
            };
            debug!(
                run = %run.name,
                transaction = %tx.name,
                pattern = %threshold.name_pattern,
                ?tier,
                "resolved transaction threshold"
            );
            evaluate_transaction(run, tx, threshold, spec, &mut out);
        }
    }
    out
}

/// Analyze and adapt the verdicts into the canonical run shape.
pub fn analyze_to_run(stats: &RunStatistics, spec: &ThresholdSpec) -> (Vec<AnalysisRecord>, Run) {
    let records = analyze(stats, spec);
    let run = perf_analysis_to_run(&records);
    (records, run)
}

pub fn load_run_statistics(path: &Path) -> Result<RunStatistics, AppError> {
    serde_json::from_str(&read_file(path)?)
        .map_err(|e| AppError::parse("PARSE_JSON_FAILED", path, e))
}

pub fn load_threshold_spec(path: &Path) -> Result<ThresholdSpec, AppError> {
    let spec: ThresholdSpec = serde_json::from_str(&read_file(path)?)
        .map_err(|e| AppError::parse("PARSE_JSON_FAILED", path, e))?;
    if spec.comparators.is_empty() {
        return Err(AppError::new(
            "THRESHOLD_SPEC_INVALID",
            "Threshold spec declares no comparators",
        )
        .with_details(format!("path={}", path.display())));
    }
    Ok(spec)
}

pub fn write_analysis(path: &Path, records: &[AnalysisRecord]) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(records).map_err(|e| {
        AppError::new("THRESHOLD_ENCODE_FAILED", "Failed to encode analysis records")
            .with_details(e.to_string())
    })?;
    std::fs::write(path, json).map_err(|e| {
        AppError::new("IO_WRITE_FAILED", "Failed to write analysis records")
            .with_details(format!("path={}; err={e}", path.display()))
    })
}

pub fn read_analysis(path: &Path) -> Result<Vec<AnalysisRecord>, AppError> {
    crate::ingest::perf_analysis::read_perf_analysis_document(&read_file(path)?, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str) -> ThresholdRule {
        ThresholdRule {
            run_name_pattern: pattern.to_string(),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn resolution_prefers_exact_then_contains_then_wildcard() {
        let rules = vec![rule("*"), rule("checkout"), rule("checkout-nightly")];
        let pick = |name: &str| {
            resolve_match(name, &rules, |r| r.run_name_pattern.as_str(), false)
                .map(|(r, tier)| (r.run_name_pattern.clone(), tier))
        };
        assert_eq!(
            pick("checkout-nightly"),
            Some(("checkout-nightly".to_string(), MatchTier::Exact))
        );
        assert_eq!(
            pick("checkout-weekly"),
            Some(("checkout".to_string(), MatchTier::Contains))
        );
        assert_eq!(pick("search"), Some(("*".to_string(), MatchTier::Wildcard)));

        let no_wildcard = vec![rule("checkout")];
        let miss = resolve_match(
            "search",
            &no_wildcard,
            |r| r.run_name_pattern.as_str(),
            false,
        );
        assert!(miss.is_none());
    }

    #[test]
    fn comparators_describe_the_acceptable_range() {
        assert!(Comparator::Lte.accepts(1000.0, 1000.0));
        assert!(!Comparator::Lt.accepts(1000.0, 1000.0));
        assert!(Comparator::Gte.accepts(0.99, 0.99));
        assert!(!Comparator::Gt.accepts(0.5, 0.99));
    }
}
