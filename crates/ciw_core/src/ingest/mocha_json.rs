use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{aggregate_run, build_report, build_suite};
use crate::classify::{classify, corrected_failures, MochaCaseEvidence, MOCHA_STATUS_RULES};
use crate::domain::{Failure, Report, Run, Suite, Test, TestStatus};
use crate::error::AppError;

use super::artifact_stem;

/// One JSON artifact already read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonArtifact {
    pub filepath: PathBuf,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MochaStats {
    #[serde(default)]
    pub tests: i64,
    #[serde(default)]
    pub failures: i64,
    #[serde(default)]
    pub skipped: i64,
    #[serde(default)]
    pub pending: i64,
    /// Milliseconds.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub start: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MochaErr {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub estack: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MochaTest {
    #[serde(default)]
    pub title: String,
    /// Milliseconds; absent for pending tests.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub fail: bool,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub err: Option<MochaErr>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MochaSuite {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tests: Vec<MochaTest>,
    #[serde(default)]
    pub suites: Vec<MochaSuite>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MochaResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tests: Vec<MochaTest>,
    #[serde(default)]
    pub suites: Vec<MochaSuite>,
}

/// Typed view of a Mocha (mochawesome-style) report before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MochaReportDocument {
    pub stats: MochaStats,
    pub results: Vec<MochaResult>,
}

/// Whether a decoded JSON value has the shape this parser processes.
pub fn is_mocha_shaped(value: &serde_json::Value) -> bool {
    let stats = value.get("stats").is_some_and(|s| s.is_object());
    let results = value
        .get("results")
        .is_some_and(|r| r.is_array() || r.is_object());
    stats && results
}

/// Decode a Mocha report. `Ok(None)` means the file lacks `stats`/`results` and is skipped.
pub fn read_mocha_document(
    content: &str,
    path: &Path,
) -> Result<Option<MochaReportDocument>, AppError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| AppError::parse("PARSE_JSON_FAILED", path, e))?;
    if !is_mocha_shaped(&value) {
        info!(path = %path.display(), "skipping JSON artifact without stats and results");
        return Ok(None);
    }
    mocha_document_from_value(value, path).map(Some)
}

pub(crate) fn mocha_document_from_value(
    mut value: serde_json::Value,
    path: &Path,
) -> Result<MochaReportDocument, AppError> {
    // Some reporters emit a single result object instead of a list.
    if let Some(results) = value.get_mut("results") {
        if results.is_object() {
            *results = serde_json::Value::Array(vec![results.take()]);
        }
    }
    serde_json::from_value(value).map_err(|e| AppError::parse("PARSE_JSON_SCHEMA_MISMATCH", path, e))
}

fn millis_to_seconds(ms: Option<f64>) -> f64 {
    match ms {
        Some(ms) if ms.is_finite() && ms > 0.0 => ms / 1000.0,
        _ => 0.0,
    }
}

fn normalize_test(test: &MochaTest) -> Test {
    let status = classify(
        &MochaCaseEvidence {
            fail: test.fail,
            pending: test.pending,
        },
        MOCHA_STATUS_RULES,
    );
    let failures = match (&test.err, status) {
        (Some(err), TestStatus::Fail) => {
            let text = [err.message.as_deref(), err.estack.as_deref()]
                .into_iter()
                .flatten()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            vec![Failure::new(if text.is_empty() {
                "test failed".to_string()
            } else {
                text
            })]
        }
        (None, TestStatus::Fail) => vec![Failure::new("test failed")],
        _ => Vec::new(),
    };
    Test {
        name: test.title.clone(),
        status,
        time: millis_to_seconds(test.duration),
        failures,
    }
}

fn flatten_suite(suite: &MochaSuite, prefix: Option<&str>, fallback: &str, out: &mut Vec<Suite>) {
    let title = suite.title.trim();
    let name = match (prefix, title.is_empty()) {
        (Some(p), false) => format!("{p} {title}"),
        (Some(p), true) => p.to_string(),
        (None, false) => title.to_string(),
        (None, true) => fallback.to_string(),
    };
    if !suite.tests.is_empty() || suite.suites.is_empty() {
        out.push(build_suite(
            name.clone(),
            suite.tests.iter().map(normalize_test).collect(),
        ));
    }
    for child in &suite.suites {
        flatten_suite(child, Some(&name), fallback, out);
    }
}

/// Normalize one Mocha document into one report named after the artifact.
pub fn mocha_document_to_report(doc: &MochaReportDocument, path: &Path) -> Report {
    let stem = artifact_stem(path);
    let mut suites = Vec::new();
    for result in &doc.results {
        if !result.tests.is_empty() {
            let title = result.title.trim();
            let name = if title.is_empty() { stem.as_str() } else { title };
            suites.push(build_suite(
                name,
                result.tests.iter().map(normalize_test).collect(),
            ));
        }
        for suite in &result.suites {
            flatten_suite(suite, None, &stem, &mut suites);
        }
    }

    let report = build_report(stem, suites);
    let reported = corrected_failures(doc.stats.failures, doc.stats.skipped);
    if reported != report.failures || doc.stats.tests.max(0) as u64 != report.tests {
        debug!(
            path = %path.display(),
            reported_tests = doc.stats.tests,
            reported_failures = reported,
            derived_tests = report.tests,
            derived_failures = report.failures,
            "mocha stats differ from classified tests"
        );
    }
    report
}

/// Parse Mocha JSON artifacts into a run; files without `stats`/`results` are skipped.
pub fn parse_mocha_json(artifacts: &[JsonArtifact]) -> Result<Run, AppError> {
    let mut reports = Vec::new();
    for artifact in artifacts {
        if let Some(doc) = read_mocha_document(&artifact.content, &artifact.filepath)? {
            reports.push(mocha_document_to_report(&doc, &artifact.filepath));
        }
    }
    Ok(aggregate_run(reports))
}
